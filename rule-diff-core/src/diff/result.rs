use serde::Serialize;

use crate::rule::Rule;

/// Outcome of reconciling a desired rule set against an observed one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RulePlan {
    /// Desired rules with no observed counterpart.
    pub to_add: Vec<Rule>,
    /// Observed rules with no desired counterpart.
    pub to_remove: Vec<Rule>,
    /// Rules present on both sides. These are left untouched so the
    /// underlying tool keeps whatever counters or state it tracks for them.
    pub satisfied: Vec<Rule>,
}

impl RulePlan {
    /// True when the observed state already matches the desired state.
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}
