//! Errors raised while classifying and scoring contributions.

use crate::class::ContributionClass;
use crate::types::UserId;

/// Error types for contribution scoring.
#[derive(Debug, thiserror::Error)]
pub enum ContributionError {
    /// A participant landed in two mutually exclusive classes
    #[error("User {user_id} classified as both {first} and {second}")]
    InvariantViolation {
        user_id: UserId,
        first: ContributionClass,
        second: ContributionClass,
    },

    /// Scoring policy contains an unusable value
    #[error("Invalid scoring policy: {0}")]
    InvalidPolicy(String),

    /// A text pattern failed to compile
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, ContributionError>;
