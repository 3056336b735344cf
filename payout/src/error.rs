//! Payout errors.

use contribution::ContributionError;
use permit::PermitError;
use relevance_agent::RelevanceError;

/// Settings that cannot drive a run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// YAML did not parse
    #[error("Failed to parse settings: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A field is present but unusable
    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failures that abort a whole run.
///
/// Per-contributor problems never show up here; they land in the audit trail.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A scoring invariant broke; the run cannot be trusted
    #[error(transparent)]
    Contribution(#[from] ContributionError),

    #[error(transparent)]
    Relevance(#[from] RelevanceError),

    #[error(transparent)]
    Permit(#[from] PermitError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
