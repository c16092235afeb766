use std::collections::HashSet;

use crate::diff::result::RulePlan;
use crate::rule::RuleSet;

/// Compute the minimal add/remove plan between two rule sets.
///
/// Membership is decided purely by canonical key, so two textually different
/// listings of the same rule reconcile to a no-op. Plan entries keep the
/// original rules (desired rules in `to_add`, observed rules in `to_remove`)
/// so raw command text survives into execution.
pub fn reconcile(desired: &RuleSet, observed: &RuleSet) -> RulePlan {
    let desired_keys: HashSet<String> = desired.iter().map(|r| r.canonical_key()).collect();
    let observed_keys: HashSet<String> = observed.iter().map(|r| r.canonical_key()).collect();

    let mut plan = RulePlan::default();
    for rule in desired.iter() {
        if observed_keys.contains(&rule.canonical_key()) {
            plan.satisfied.push(rule.clone());
        } else {
            plan.to_add.push(rule.clone());
        }
    }
    for rule in observed.iter() {
        if !desired_keys.contains(&rule.canonical_key()) {
            plan.to_remove.push(rule.clone());
        }
    }
    plan
}
