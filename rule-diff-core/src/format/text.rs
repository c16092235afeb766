use crate::diff::result::RulePlan;

/// Format a plan as plain text, one rule per line.
pub fn format_text(plan: &RulePlan) -> String {
    let mut lines = Vec::with_capacity(plan.to_add.len() + plan.to_remove.len());
    for rule in &plan.to_remove {
        lines.push(format!("- {}", rule.raw));
    }
    for rule in &plan.to_add {
        lines.push(format!("+ {}", rule.raw));
    }
    for rule in &plan.satisfied {
        lines.push(format!("= {}", rule.raw));
    }
    lines.join("\n")
}

/// Format plan counts on one line.
pub fn format_summary(plan: &RulePlan) -> String {
    format!(
        "to_add={} to_remove={} satisfied={}",
        plan.to_add.len(),
        plan.to_remove.len(),
        plan.satisfied.len()
    )
}
