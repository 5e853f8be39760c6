//! # Validation Findings
//!
//! A finding records one reason a row failed a validation tier. Findings are
//! plain data: they are collected, attached to quarantined rows, and
//! serialized for audit, but never raised.

use serde::{Deserialize, Serialize};

/// The validation tier that produced a finding.
///
/// Tiers run in declaration order. `Ord` follows that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Per-column type, pattern, whitelist, and precision conformance.
    Structural,
    /// Cross-field semantic rules, plausibility bounds, duplicate keys.
    Content,
    /// Existence checks against externally supplied reference sets.
    Referential,
}

impl Tier {
    /// All tiers in evaluation order.
    pub const ALL: [Tier; 3] = [Tier::Structural, Tier::Content, Tier::Referential];

    /// Returns the tier identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Content => "content",
            Self::Referential => "referential",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reason a row failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFinding {
    /// Tier that produced the finding.
    pub tier: Tier,
    /// Stable rule identifier, e.g. `structural.pattern`.
    pub rule_id: String,
    /// Human-readable description.
    pub message: String,
    /// 1-based data row number in the source file.
    pub row_num: usize,
    /// Column the finding refers to, when it refers to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl ValidationFinding {
    /// Create a row-level finding.
    pub fn new(tier: Tier, rule_id: impl Into<String>, message: impl Into<String>, row_num: usize) -> Self {
        Self {
            tier,
            rule_id: rule_id.into(),
            message: message.into(),
            row_num,
            column: None,
        }
    }

    /// Shorthand for a structural finding.
    pub fn structural(rule_id: impl Into<String>, message: impl Into<String>, row_num: usize) -> Self {
        Self::new(Tier::Structural, rule_id, message, row_num)
    }

    /// Shorthand for a content finding.
    pub fn content(rule_id: impl Into<String>, message: impl Into<String>, row_num: usize) -> Self {
        Self::new(Tier::Content, rule_id, message, row_num)
    }

    /// Shorthand for a referential finding.
    pub fn referential(rule_id: impl Into<String>, message: impl Into<String>, row_num: usize) -> Self {
        Self::new(Tier::Referential, rule_id, message, row_num)
    }

    /// Attach the column this finding refers to.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl std::fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {} [{}:{}]", self.row_num, self.tier, self.rule_id)?;
        if let Some(ref column) = self.column {
            write!(f, " {column}")?;
        }
        write!(f, ": {}", self.message)
    }
}
