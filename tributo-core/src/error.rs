//! Error type shared by every calculator in the engine.

use thiserror::Error;

/// Errors that can occur while running a tax calculation.
///
/// Floors defined by the tax rules (negative effective rate, credits larger
/// than debits) are never reported here; calculators clamp those and expose
/// the excess in their result instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CalculationError {
    /// An input value is outside the range the calculation accepts.
    #[error("invalid input for {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// The credit ledger received no positive expense.
    #[error("no expenses provided; at least one positive expense is required")]
    NoExpensesProvided,

    /// A transition year outside the configured schedule was requested.
    #[error("transition year {year} is outside the schedule ({first}-{last})")]
    ScheduleGap { year: i32, first: i32, last: i32 },

    /// A bracket table failed validation or is missing from the policy.
    #[error("invalid bracket table: {0}")]
    InvalidBracketTable(String),

    /// The transition schedule failed validation.
    #[error("invalid transition schedule: {0}")]
    InvalidSchedule(String),
}

impl CalculationError {
    pub(crate) fn invalid(
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}
