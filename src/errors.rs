//! Unified error types for the store, the authentication gate and the engine.
//!
//! Every fallible operation in the crate returns [`Result`]. The variants map
//! onto the failure classes a presentation layer has to tell apart: the user
//! must sign in again, the target row is not theirs, the backend failed, or
//! the input was rejected before anything was sent.

use thiserror::Error;

/// Errors surfaced by the record store, the auth gate and the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// No session, or the session and the verified user disagree.
    #[error("Not authenticated: {reason}")]
    Unauthenticated {
        /// Which identity check failed
        reason: String,
    },

    /// The row does not exist or belongs to another owner.
    #[error("{resource} {id} not found or not owned by the current user")]
    NotFoundOrForbidden {
        /// Resource collection name (`expenses`, `income`, ...)
        resource: &'static str,
        /// Requested row id
        id: i64,
    },

    /// Backend or network failure.
    #[error("Remote store error: {detail}")]
    Remote {
        /// Backend-provided detail
        detail: String,
    },

    /// A store call did not settle before its deadline.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        /// Operation label used in logs
        operation: String,
        /// Deadline in milliseconds
        after_ms: u64,
    },

    /// User input rejected at the mutation boundary.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Offending form field
        field: &'static str,
        /// Human-readable reason
        message: String,
    },

    /// A stored amount is negative or not finite.
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::Unauthenticated`].
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self::Unauthenticated {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::Validation`].
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns `true` for errors that a fresh sign-in would resolve.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(value: sea_orm::DbErr) -> Self {
        Self::Remote {
            detail: value.to_string(),
        }
    }
}

/// Convenience `Result` type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
