//! Token counting and model-tier selection.

use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;
use tracing::warn;

use crate::error::{RelevanceError, Result};

/// Counts tokens the way the target model family does.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// `cl100k_base` counter, the gpt-3.5-turbo / gpt-4 encoding.
pub struct Cl100kCounter {
    bpe: CoreBPE,
}

impl Cl100kCounter {
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| RelevanceError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for Cl100kCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// A model and the largest prompt it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTier {
    pub model: String,
    /// Context limit in tokens; `None` marks the unbounded fallback
    #[serde(default)]
    pub max_tokens: Option<usize>,
}

impl ModelTier {
    pub fn bounded(model: impl Into<String>, max_tokens: usize) -> Self {
        Self {
            model: model.into(),
            max_tokens: Some(max_tokens),
        }
    }

    pub fn fallback(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: None,
        }
    }

    fn fits(&self, tokens: usize) -> bool {
        self.max_tokens.map_or(true, |max| tokens <= max)
    }
}

/// gpt-3.5-turbo, then the 16k variant, then gpt-4 as the last resort.
pub fn default_tiers() -> Vec<ModelTier> {
    vec![
        ModelTier::bounded("gpt-3.5-turbo", 4097),
        ModelTier::bounded("gpt-3.5-turbo-16k", 16385),
        ModelTier::fallback("gpt-4"),
    ]
}

/// Pick the first tier whose limit accommodates `tokens`.
pub fn select_tier(tiers: &[ModelTier], tokens: usize) -> Result<&ModelTier> {
    let tier = tiers
        .iter()
        .find(|tier| tier.fits(tokens))
        .ok_or(RelevanceError::ContextTooLarge { tokens })?;

    if tier.max_tokens.is_none() {
        warn!(model = %tier.model, tokens, "Using fallback model due to large context");
    }
    Ok(tier)
}
