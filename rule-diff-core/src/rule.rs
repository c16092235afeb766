use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// Traffic direction a rule is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Matches traffic entering through an interface (`-i`).
    Inbound,
    /// Matches traffic leaving through an interface (`-o`).
    Outbound,
    /// Names no interface.
    Unspecified,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Inbound => "in",
            Direction::Outbound => "out",
            Direction::Unspecified => "any",
        };
        f.write_str(s)
    }
}

/// A single rule-table entry.
///
/// Structural fields drive comparison; `raw` keeps the exact command text
/// because the underlying tool is picky about argument formatting when a
/// rule is re-applied or deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub chain: String,
    pub direction: Direction,
    pub interface: Option<String>,
    pub protocol: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub target: String,
    pub target_arg: Option<String>,
    /// Exact command text that (re)applies this rule.
    pub raw: String,
}

impl Rule {
    /// The address the rule is matched by: destination for inbound rules
    /// (matched on the translated destination), source otherwise.
    pub fn relevant_address(&self) -> Option<&str> {
        match self.direction {
            Direction::Inbound => self.destination.as_deref(),
            Direction::Outbound | Direction::Unspecified => self.source.as_deref(),
        }
    }

    /// Order-independent, formatting-insensitive identity.
    ///
    /// Two rules are the same rule iff their keys match, regardless of how
    /// either was listed. This is the sole basis for set membership when
    /// reconciling.
    pub fn canonical_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.chain.to_lowercase(),
            self.direction,
            self.interface.as_deref().unwrap_or(""),
            self.relevant_address().unwrap_or(""),
            self.target.to_lowercase(),
            self.target_arg.as_deref().unwrap_or("")
        )
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// An ordered collection of rules from one table scan or one compilation.
///
/// Diffing never mutates a set in place; plans carry their own rule copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn extend(&mut self, other: RuleSet) {
        self.rules.extend(other.rules);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    /// Keep only rules whose target matches one of `targets`
    /// (case-insensitive).
    pub fn retain_targets(&mut self, targets: &[&str]) {
        self.rules
            .retain(|rule| targets.iter().any(|t| rule.target.eq_ignore_ascii_case(t)));
    }
}
