//! Domain error kinds
//!
//! Error taxonomy shared across the crate: scenario validation accumulates
//! every violation it finds, solver failures carry their cause, and playback
//! distinguishes strict-mode violations from lenient-mode reporting.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a single validation failure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ViolationRule {
    /// A foreign id does not resolve to a declared entity
    InvalidReference,
    /// A lock cannot be satisfied given availability, capacity, or windows
    LockConflict,
    /// A numeric field is outside its valid range
    OutOfRange,
    /// A required field is missing or blank
    MissingField,
    /// An id appears more than once where uniqueness is required
    Duplicate,
    /// A harvest-system job graph contains a cycle
    NotADag,
    /// A shift id is not declared in the timeline
    UnknownShift,
    /// Two fields contradict each other
    Inconsistent,
}

impl fmt::Display for ViolationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationRule::InvalidReference => "invalid_reference",
            ViolationRule::LockConflict => "lock_conflict",
            ViolationRule::OutOfRange => "out_of_range",
            ViolationRule::MissingField => "missing_field",
            ViolationRule::Duplicate => "duplicate",
            ViolationRule::NotADag => "not_a_dag",
            ViolationRule::UnknownShift => "unknown_shift",
            ViolationRule::Inconsistent => "inconsistent",
        };
        write!(f, "{}", name)
    }
}

/// One validation failure, addressable back to its source row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Source table (or inline section) the failure was found in
    pub table: String,
    /// Zero-based row index within the table, when row-addressable
    pub row: Option<usize>,
    /// Field the failure concerns
    pub field: String,
    /// Rule that was violated
    pub rule: ViolationRule,
    /// Human-readable description
    pub message: String,
}

impl Violation {
    pub fn new(
        table: impl Into<String>,
        row: Option<usize>,
        field: impl Into<String>,
        rule: ViolationRule,
        message: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            row,
            field: field.into(),
            rule,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(
                f,
                "[{}:{}] {} ({}): {}",
                self.table, row, self.field, self.rule, self.message
            ),
            None => write!(
                f,
                "[{}] {} ({}): {}",
                self.table, self.field, self.rule, self.message
            ),
        }
    }
}

/// Scenario validation failure carrying every violation found
///
/// The validator is strict and total: it never stops at the first problem,
/// so callers can surface a complete report in one pass.
#[derive(Debug, Clone, Error)]
#[error("scenario validation failed with {} violation(s)", violations.len())]
pub struct ScenarioError {
    pub violations: Vec<Violation>,
}

impl ScenarioError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Whether any violation is a lock conflict
    pub fn has_lock_conflict(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.rule == ViolationRule::LockConflict)
    }
}

/// Solver-level failures surfaced to callers
#[derive(Debug, Clone, Error)]
pub enum SolverError {
    /// The backend proved the model infeasible
    #[error("MIP infeasible ({category})")]
    Infeasible { category: String },
    /// The wall-clock deadline expired before any feasible solution was found
    #[error("solver time limit reached with no feasible solution")]
    TimeLimit,
    /// Opaque backend failure
    #[error("MIP backend error: {0}")]
    Backend(String),
}

/// Strict-mode playback failure
///
/// Lenient playback reports the same conditions through the KPI bundle
/// instead of raising.
#[derive(Debug, Clone, Error)]
#[error("playback violation at row {row}: {message}")]
pub struct PlaybackError {
    pub row: usize,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_display() {
        let v = Violation::new(
            "blocks",
            Some(3),
            "landing_id",
            ViolationRule::InvalidReference,
            "landing 'L9' is not declared",
        );
        let text = v.to_string();
        assert!(text.contains("blocks:3"));
        assert!(text.contains("invalid_reference"));
    }

    #[test]
    fn test_scenario_error_lock_conflict() {
        let err = ScenarioError::new(vec![Violation::new(
            "locked_assignments",
            Some(0),
            "day",
            ViolationRule::LockConflict,
            "machine M1 unavailable on day 3",
        )]);
        assert!(err.has_lock_conflict());
        assert!(err.to_string().contains("1 violation"));
    }
}
