//! Relevance sampling errors.

/// Error types for relevance sampling.
///
/// Individual malformed or failed samples are not errors; they are discarded
/// and retried inside the sampler.
#[derive(Debug, thiserror::Error)]
pub enum RelevanceError {
    /// The issue has no specification to compare comments against
    #[error("Issue specification is missing")]
    MissingSpecification,

    /// No configured model accepts a prompt this large
    #[error("Prompt of {tokens} tokens exceeds every configured model")]
    ContextTooLarge { tokens: usize },

    /// Tokenizer failed to load
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Sampler configuration is unusable
    #[error("Invalid sampler configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RelevanceError>;
