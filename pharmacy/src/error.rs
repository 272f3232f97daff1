//! Error types for the pharmacy workflows.

use crate::types::OrderStatus;
use rx_dispatch_core::machine::MachineError;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name → messages, as reported in a `VALIDATION_ERROR`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Persistence-layer failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The database rejected or failed a statement.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A stored value could not be mapped back into the domain.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A write targeted a row that does not exist.
    #[error("Missing row: {0}")]
    MissingRow(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

/// Why a workflow operation was refused.
///
/// Every variant except [`WorkflowError::Store`] is raised before any write,
/// so a refused request never leaves partial state behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Referenced entity absent.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// No resolvable actor.
    #[error("{0}")]
    Unauthorized(String),

    /// Actor resolved but lacks the required role or ownership.
    #[error("{0}")]
    Forbidden(String),

    /// Malformed or rule-breaking input.
    #[error("{0}")]
    BadRequest(String),

    /// Entity not in a state this operation can act on.
    #[error("{0}")]
    InvalidState(String),

    /// Requested status change not in the transition table.
    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },

    /// Schema-level input failure.
    #[error("Invalid request data")]
    Validation(FieldErrors),

    /// Storage failed while loading or committing.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// Stable error code for clients and metrics.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Store(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }
}

impl From<MachineError<OrderStatus>> for WorkflowError {
    fn from(err: MachineError<OrderStatus>) -> Self {
        match err {
            MachineError::InvalidTransition { from, to, .. } => Self::InvalidTransition { from, to },
            forbidden @ MachineError::Forbidden { .. } => Self::Forbidden(forbidden.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_message_names_pair() {
        let err = WorkflowError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped,
        };
        assert_eq!(err.to_string(), "Cannot transition from pending to shipped");
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[test]
    fn store_errors_are_internal() {
        let err = WorkflowError::from(StoreError::DatabaseError("pool timed out".into()));
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
