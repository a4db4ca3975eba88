//! Error types for the Turnstile crate.

use thiserror::Error;

/// Main error type for Turnstile operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnstileError {
    /// Constraint construction failed validation
    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    /// The admission wait was aborted by the caller-supplied cancellation
    #[error("Admission wait canceled before a permit was granted")]
    Canceled,
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
