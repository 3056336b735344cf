//! Payout - rewards for the work that closed an issue
//!
//! Wires the scoring crates together into one run per closed issue:
//! - Participant and comment classification
//! - Relevance sampling per surface
//! - Rubric, task and specification scoring, aggregation per contributor
//! - Concurrent per-contributor settlement into signed permits
//! - A markdown summary with claim links
//!
//! # Architecture
//!
//! ```text
//! PayoutInput ──► classify ──► RelevanceSampler ──► score ──► aggregate
//!                                                                │
//!        PayoutReport ◄── summary ◄── Settlement (join_all) ◄────┘
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod settlement;
pub mod summary;

pub use config::{NftSettings, PaymentSettings, PayoutSettings};
pub use error::{ConfigError, PipelineError, Result};
pub use pipeline::{PayoutInput, PayoutPipeline, PayoutReport};
pub use settlement::{nft_metadata, ContributorAuthorization, NftSettlement, SettledContributor, Settlement};
pub use summary::{claim_url, render_summary};
