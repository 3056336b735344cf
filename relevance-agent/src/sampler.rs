//! RelevanceSampler - repeated LLM sampling of comment relevance.
//!
//! The same prompt is sent `batch_size` times concurrently. A batch counts
//! only when every sample is well-formed: one number per comment, each in
//! `[0, 1]`. A complete batch is averaged per column at 10 decimal places; the
//! result is then averaged across accepted batches at 4 decimal places.
//! Incomplete batches are retried up to `max_attempts` times.

use futures::future::join_all;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backend::{CompletionRequest, LlmBackend};
use crate::error::{RelevanceError, Result};
use crate::prompt::build_prompt;
use crate::tokens::{default_tiers, select_tier, ModelTier, TokenCounter};
use contribution::{Comment, RelevanceMap};

/// Precision of the per-batch mean.
pub const BATCH_PRECISION: u32 = 10;
/// Precision of the mean across batches.
pub const FINAL_PRECISION: u32 = 4;

/// Sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Concurrent samples per attempt
    pub batch_size: usize,
    /// Attempts before giving up
    pub max_attempts: usize,
    /// Sampling temperature
    pub temperature: f32,
    /// Lower bound of the output-token budget
    pub min_output_tokens: u32,
    /// Output tokens reserved per comment
    pub output_tokens_per_comment: u32,
    /// Model tiers, smallest first
    pub tiers: Vec<ModelTier>,
    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_attempts: 10,
            temperature: 1.0,
            min_output_tokens: 128,
            output_tokens_per_comment: 8,
            tiers: default_tiers(),
            request_timeout_secs: 60,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(RelevanceError::InvalidConfig("batch_size must be positive".into()));
        }
        if self.max_attempts == 0 {
            return Err(RelevanceError::InvalidConfig("max_attempts must be positive".into()));
        }
        if self.tiers.is_empty() {
            return Err(RelevanceError::InvalidConfig("at least one model tier is required".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(RelevanceError::InvalidConfig("request_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn output_budget(&self, comments: usize) -> u32 {
        let per_comment = self
            .output_tokens_per_comment
            .saturating_mul(u32::try_from(comments).unwrap_or(u32::MAX));
        self.min_output_tokens.max(per_comment)
    }
}

/// How a sampling run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStatus {
    /// At least one complete batch was averaged
    Sampled,
    /// Every attempt produced an incomplete batch
    Exhausted,
    /// Nothing to sample
    NoComments,
}

/// Result of sampling one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceOutcome {
    /// One score per comment, in input order; empty unless `Sampled`
    pub scores: Vec<Decimal>,
    /// Prompt size in tokens
    pub tokens: usize,
    /// Model the prompt was routed to
    pub model: String,
    /// Attempts made
    pub attempts: usize,
    pub status: SamplingStatus,
}

impl RelevanceOutcome {
    /// Whether scores are usable.
    pub fn is_sampled(&self) -> bool {
        self.status == SamplingStatus::Sampled
    }

    /// Key scores by the id of the comment they belong to.
    pub fn by_comment(&self, comments: &[Comment]) -> RelevanceMap {
        comments
            .iter()
            .zip(&self.scores)
            .map(|(comment, score)| (comment.id, *score))
            .collect()
    }
}

/// Samples relevance scores from an LLM backend.
pub struct RelevanceSampler {
    backend: Arc<dyn LlmBackend>,
    counter: Arc<dyn TokenCounter>,
    config: SamplerConfig,
}

impl RelevanceSampler {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        counter: Arc<dyn TokenCounter>,
        config: SamplerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            counter,
            config,
        })
    }

    /// Sample relevance for `comments` against the issue specification.
    ///
    /// Exhausting every attempt is not an error: the outcome carries
    /// [`SamplingStatus::Exhausted`] and no scores.
    pub async fn sample(
        &self,
        specification: Option<&str>,
        comments: &[Comment],
    ) -> Result<RelevanceOutcome> {
        let specification = specification
            .filter(|s| !s.trim().is_empty())
            .ok_or(RelevanceError::MissingSpecification)?;

        let prompt = build_prompt(specification, comments);
        let tokens = self.counter.count(&prompt);
        let model = select_tier(&self.config.tiers, tokens)?.model.clone();

        if comments.is_empty() {
            return Ok(RelevanceOutcome {
                scores: Vec::new(),
                tokens,
                model,
                attempts: 0,
                status: SamplingStatus::NoComments,
            });
        }

        let expected = comments.len();
        let request = CompletionRequest::system(prompt)
            .with_model(model.clone())
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.output_budget(expected));

        info!(
            backend = self.backend.id(),
            model = %model,
            tokens,
            comments = expected,
            "Sampling relevance"
        );

        let mut accepted: Vec<Vec<Decimal>> = Vec::new();
        let mut attempts = 0;

        for attempt in 1..=self.config.max_attempts {
            attempts = attempt;
            let batch = self.fetch_batch(&request, expected).await;

            if batch.len() >= self.config.batch_size {
                accepted.push(average_samples(&batch, BATCH_PRECISION));
                debug!(attempt, "Accepted relevance batch");
                break;
            }

            warn!(
                attempt,
                valid = batch.len(),
                required = self.config.batch_size,
                "Incomplete relevance batch"
            );
        }

        if accepted.is_empty() {
            warn!(model = %model, attempts, "Relevance sampling exhausted");
            return Ok(RelevanceOutcome {
                scores: Vec::new(),
                tokens,
                model,
                attempts,
                status: SamplingStatus::Exhausted,
            });
        }

        Ok(RelevanceOutcome {
            scores: average_samples(&accepted, FINAL_PRECISION),
            tokens,
            model,
            attempts,
            status: SamplingStatus::Sampled,
        })
    }

    /// Issue one batch of concurrent requests and keep the valid samples.
    async fn fetch_batch(&self, request: &CompletionRequest, expected: usize) -> Vec<Vec<Decimal>> {
        let calls = (0..self.config.batch_size).map(|_| self.backend.complete(request.clone()));

        join_all(calls)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(response) => {
                    let sample = parse_sample(&response.content, expected);
                    if sample.is_none() {
                        debug!(content = %response.content, "Discarding malformed sample");
                    }
                    sample
                }
                Err(e) => {
                    warn!(error = %e, "Relevance request failed");
                    None
                }
            })
            .collect()
    }
}

/// Parse a reply into exactly `expected` scores in `[0, 1]`.
///
/// The reply must be a JSON array of numbers. Each number is read from its
/// literal text so no precision is lost on the way to `Decimal`.
pub fn parse_sample(content: &str, expected: usize) -> Option<Vec<Decimal>> {
    let trimmed = strip_code_fence(content.trim());
    let numbers: Vec<serde_json::Number> = serde_json::from_str(trimmed).ok()?;

    if numbers.len() != expected {
        return None;
    }

    let inner = trimmed.strip_prefix('[')?.strip_suffix(']')?;
    inner
        .split(',')
        .map(|literal| {
            let literal = literal.trim();
            let score = Decimal::from_str(literal)
                .or_else(|_| Decimal::from_scientific(literal))
                .ok()?;
            (Decimal::ZERO..=Decimal::ONE).contains(&score).then_some(score)
        })
        .collect()
}

fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Column-wise mean of equally long samples, rounded half-up.
pub fn average_samples(samples: &[Vec<Decimal>], precision: u32) -> Vec<Decimal> {
    let Some(width) = samples.first().map(Vec::len) else {
        return Vec::new();
    };
    let count = Decimal::from(samples.len());

    (0..width)
        .map(|column| {
            let sum: Decimal = samples.iter().map(|row| row[column]).sum();
            (sum / count).round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero)
        })
        .collect()
}
