use crate::diff::result::RulePlan;

/// Format a plan as pretty-printed JSON.
pub fn format_json(plan: &RulePlan) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(plan)
}
