//! Structural validation of a configuration document.

use rule_diff_core::addr;
use serde::Serialize;

use crate::config::Config;
use crate::link::{build_links, Link};

/// Findings from one validation pass. Errors block an apply; warnings
/// describe entries the compiler will skip.
#[derive(Debug, Default, Serialize)]
pub struct ValidateReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

fn valid_preference(value: &str) -> bool {
    matches!(value, "high" | "medium" | "low")
}

/// Check a parsed configuration for structural problems.
pub fn build_validate_report(config: &Config) -> ValidateReport {
    let mut report = ValidateReport::default();
    if config.network.links.is_empty() {
        report.warnings.push("no links configured".to_string());
    }
    for link in build_links(config) {
        check_link(&link, &mut report);
    }
    report
}

fn check_link(link: &Link, report: &mut ValidateReport) {
    for mapping in &link.mapping_sets {
        let label = format!("{}.{}", link.name, mapping.name);
        if mapping.enabled && mapping.pairs.is_empty() {
            report
                .warnings
                .push(format!("{label}: enabled mapping set has no pairs"));
        }
        for pair in &mapping.pairs {
            if pair.public.is_empty() || pair.private.is_empty() {
                report
                    .warnings
                    .push(format!("{label}: pair with a missing address is skipped"));
                continue;
            }
            let public = addr::expand(&pair.public, &mapping.pfx_pub);
            if !addr::is_structurally_valid(&public) {
                report
                    .warnings
                    .push(format!("{label}: expanded public address {public} is not usable"));
            }
            let private = addr::expand(&pair.private, &mapping.pfx_priv);
            if !addr::is_structurally_valid(&private) {
                report.warnings.push(format!(
                    "{label}: expanded private address {private} is not usable"
                ));
            }
            if let Some(annotation) = &pair.radv {
                if !valid_preference(&annotation.preference) {
                    report.errors.push(format!(
                        "{label}: invalid route preference '{}'",
                        annotation.preference
                    ));
                }
            }
        }
    }

    for (section, nat) in [("nat44", &link.nat44), ("nat66", &link.nat66)] {
        if let Some(nat) = nat {
            if nat.enabled && nat.mss_clamping && nat.mss <= 0 {
                report.errors.push(format!(
                    "{}.{section}: mss-clamping enabled with non-positive mss",
                    link.name
                ));
            }
        }
    }

    if let Some(radv) = &link.radv {
        if radv.enabled && radv.min_interval > radv.max_interval {
            report.errors.push(format!(
                "{}.radv: min interval {} exceeds max interval {}",
                link.name, radv.min_interval, radv.max_interval
            ));
        }
        for route in &radv.routes {
            if !valid_preference(&route.preference) {
                report.errors.push(format!(
                    "{}.radv: invalid route preference '{}'",
                    link.name, route.preference
                ));
            }
        }
    }
}

/// Render findings as text lines.
pub fn render_validate_text(report: &ValidateReport) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "errors={} warnings={}",
        report.errors.len(),
        report.warnings.len()
    ));
    for error in &report.errors {
        out.push(format!("error: {error}"));
    }
    for warning in &report.warnings {
        out.push(format!("warning: {warning}"));
    }
    out.join("\n")
}
