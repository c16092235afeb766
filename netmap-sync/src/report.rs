//! Terminal-friendly rendering of plans and scan results.

use colored::Colorize;
use rule_diff_core::{format_summary, RulePlan};

/// Render a reconciliation plan for terminal output.
pub fn render_plan(family: &str, plan: &RulePlan, verbose: bool) -> String {
    let mut out = vec![format!(
        "{} {}",
        family.bold(),
        format_summary(plan).cyan()
    )];
    for rule in &plan.to_remove {
        out.push(format!("- {}", rule.raw).red().to_string());
    }
    for rule in &plan.to_add {
        out.push(format!("+ {}", rule.raw).green().to_string());
    }
    if verbose {
        for rule in &plan.satisfied {
            out.push(format!("= {}", rule.raw).dimmed().to_string());
        }
    }
    out.join("\n")
}

/// Render a numbered rule listing.
pub fn render_rule_listing(raws: &[&str]) -> String {
    if raws.is_empty() {
        return "none".to_string();
    }
    raws.iter()
        .enumerate()
        .map(|(i, raw)| format!("{}. {raw}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
