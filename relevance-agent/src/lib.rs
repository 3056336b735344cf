//! Relevance Agent - LLM-sampled relevance of issue comments
//!
//! Estimates how much each comment in a conversation helps define the issue
//! it belongs to:
//! - Trait-based LLM backends (OpenAI-compatible, scripted mock)
//! - Prompt assembly and `cl100k_base` token counting
//! - Model-tier selection by prompt size
//! - Repeated concurrent sampling with validation and two-level averaging
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          RelevanceSampler               │
//! │  (prompt → tier → batches → average)    │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌─────────────┐       ┌─────────────┐
//! │ LlmBackend  │       │ TokenCounter│
//! │ (OpenAI/    │       │ (cl100k)    │
//! │  Mock)      │       │             │
//! └─────────────┘       └─────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod prompt;
pub mod sampler;
pub mod tokens;

pub use backend::traits::{CompletionRequest, CompletionResponse, LlmBackend, LlmError};
pub use backend::{MockBackend, MockReply, OpenAiBackend};
pub use error::{RelevanceError, Result};
pub use prompt::build_prompt;
pub use sampler::{average_samples, parse_sample, RelevanceOutcome, RelevanceSampler, SamplerConfig, SamplingStatus};
pub use tokens::{default_tiers, select_tier, Cl100kCounter, ModelTier, TokenCounter};
