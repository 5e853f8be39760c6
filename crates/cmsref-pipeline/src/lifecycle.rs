//! # Row Lifecycle State Machine
//!
//! Every source row moves through a fixed sequence of states. A failing
//! validation tier sends the row straight to `Quarantined`; later tiers do
//! not run.
//!
//! ## States
//!
//! ```text
//! Decoded ──▶ Normalized ──▶ StructurallyValid ──▶ ContentValid ──▶ ReferentiallyChecked ──▶ Accepted
//!                 │                  │                   │                   │
//!                 └──────────────────┴───────────────────┴───────────────────┴──▶ Quarantined
//! ```
//!
//! `Accepted` and `Quarantined` are terminal. The state machine is an enum
//! with validated transitions; an illegal transition is a pipeline bug and
//! surfaces as [`LifecycleError`].

use cmsref_core::Tier;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a row is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowState {
    /// Raw fields extracted.
    Decoded,
    /// Typed values built.
    Normalized,
    /// Structural tier passed.
    StructurallyValid,
    /// Content tier passed.
    ContentValid,
    /// Referential tier passed (or skipped for want of reference sets).
    ReferentiallyChecked,
    /// Hashed and ready to publish.
    Accepted,
    /// Rejected by a validation tier.
    Quarantined,
}

impl RowState {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Quarantined)
    }

    /// State reached when `tier` passes.
    pub fn after_tier(tier: Tier) -> Self {
        match tier {
            Tier::Structural => Self::StructurallyValid,
            Tier::Content => Self::ContentValid,
            Tier::Referential => Self::ReferentiallyChecked,
        }
    }

    /// The single forward successor, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Decoded => Some(Self::Normalized),
            Self::Normalized => Some(Self::StructurallyValid),
            Self::StructurallyValid => Some(Self::ContentValid),
            Self::ContentValid => Some(Self::ReferentiallyChecked),
            Self::ReferentiallyChecked => Some(Self::Accepted),
            Self::Accepted | Self::Quarantined => None,
        }
    }

    /// Whether a row in this state may move to `to`.
    pub fn can_transition_to(&self, to: Self) -> bool {
        match to {
            // only while a tier is pending
            Self::Quarantined => matches!(
                self,
                Self::Normalized | Self::StructurallyValid | Self::ContentValid
            ),
            _ => self.next() == Some(to),
        }
    }
}

impl std::fmt::Display for RowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Decoded => "DECODED",
            Self::Normalized => "NORMALIZED",
            Self::StructurallyValid => "STRUCTURALLY_VALID",
            Self::ContentValid => "CONTENT_VALID",
            Self::ReferentiallyChecked => "REFERENTIALLY_CHECKED",
            Self::Accepted => "ACCEPTED",
            Self::Quarantined => "QUARANTINED",
        };
        f.write_str(s)
    }
}

/// Illegal row transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The transition is not an edge of the state machine.
    #[error("row {row_num}: invalid transition {from} -> {to}")]
    InvalidTransition {
        /// Row number.
        row_num: usize,
        /// Current state.
        from: RowState,
        /// Attempted target.
        to: RowState,
    },

    /// The row already reached a terminal state.
    #[error("row {row_num} is {state} and cannot transition")]
    Terminal {
        /// Row number.
        row_num: usize,
        /// Terminal state.
        state: RowState,
    },
}

/// The state of one row plus the path it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLifecycle {
    row_num: usize,
    state: RowState,
    history: Vec<RowState>,
}

impl RowLifecycle {
    /// A freshly decoded row.
    pub fn new(row_num: usize) -> Self {
        Self {
            row_num,
            state: RowState::Decoded,
            history: vec![RowState::Decoded],
        }
    }

    /// Current state.
    pub fn state(&self) -> RowState {
        self.state
    }

    /// Every state visited, in order, including the current one.
    pub fn history(&self) -> &[RowState] {
        &self.history
    }

    /// Move to `to`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Terminal`] from `Accepted`/`Quarantined`, otherwise
    /// [`LifecycleError::InvalidTransition`] for any non-edge.
    pub fn transition(&mut self, to: RowState) -> Result<(), LifecycleError> {
        if self.state.is_terminal() {
            return Err(LifecycleError::Terminal {
                row_num: self.row_num,
                state: self.state,
            });
        }
        if !self.state.can_transition_to(to) {
            return Err(LifecycleError::InvalidTransition {
                row_num: self.row_num,
                from: self.state,
                to,
            });
        }
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Record the outcome of `tier`.
    ///
    /// # Errors
    ///
    /// As [`Self::transition`].
    pub fn complete_tier(&mut self, tier: Tier, passed: bool) -> Result<(), LifecycleError> {
        if passed {
            self.transition(RowState::after_tier(tier))
        } else {
            self.transition(RowState::Quarantined)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_accepted() {
        let mut row = RowLifecycle::new(1);
        row.transition(RowState::Normalized).unwrap();
        for tier in Tier::ALL {
            row.complete_tier(tier, true).unwrap();
        }
        row.transition(RowState::Accepted).unwrap();
        assert_eq!(row.state(), RowState::Accepted);
        assert_eq!(row.history().len(), 6);
    }

    #[test]
    fn tier_failure_quarantines() {
        let mut row = RowLifecycle::new(2);
        row.transition(RowState::Normalized).unwrap();
        row.complete_tier(Tier::Structural, true).unwrap();
        row.complete_tier(Tier::Content, false).unwrap();
        assert_eq!(row.state(), RowState::Quarantined);
        assert_eq!(
            row.history(),
            [
                RowState::Decoded,
                RowState::Normalized,
                RowState::StructurallyValid,
                RowState::Quarantined
            ]
        );
    }

    #[test]
    fn tiers_cannot_be_skipped() {
        let mut row = RowLifecycle::new(3);
        row.transition(RowState::Normalized).unwrap();
        let err = row.complete_tier(Tier::Content, true).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                from: RowState::Normalized,
                to: RowState::ContentValid,
                ..
            }
        ));
    }

    #[test]
    fn terminal_states_are_final() {
        let mut row = RowLifecycle::new(4);
        row.transition(RowState::Normalized).unwrap();
        row.transition(RowState::Quarantined).unwrap();
        assert!(matches!(
            row.transition(RowState::StructurallyValid),
            Err(LifecycleError::Terminal { .. })
        ));
    }

    #[test]
    fn referentially_checked_rows_cannot_be_quarantined() {
        assert!(!RowState::ReferentiallyChecked.can_transition_to(RowState::Quarantined));
        assert!(!RowState::Decoded.can_transition_to(RowState::Quarantined));
    }

    #[test]
    fn display_is_screaming_snake() {
        assert_eq!(RowState::StructurallyValid.to_string(), "STRUCTURALLY_VALID");
    }
}
