//! Core rule-set reconciliation.

pub mod engine;
pub mod result;

pub use engine::reconcile;
pub use result::RulePlan;
