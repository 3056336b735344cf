//! Contribution - classification and scoring of closed-issue work
//!
//! Turns the participants and comments of a closed issue into per-contributor
//! scores:
//! - Role partitioning (issuer, assignees, collaborators, contributors)
//! - A closed taxonomy of contribution classes
//! - A deterministic formatting/word rubric for comments
//! - Task and specification scorers
//! - Per-user aggregation with an audit trail of unpaid contributions
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌───────────────┐
//! │ Issue +      │──▶│ classify         │──▶│ comments      │──┐
//! │ comments     │   │ (roles, classes) │   │ (rubric ×     │  │
//! └──────────────┘   └──────────────────┘   │  relevance)   │  │
//!                                            └───────────────┘  │
//!                    ┌──────────────────┐                       ▼
//!                    │ task             │──────────────▶ ┌────────────┐
//!                    │ (price split,    │                │ aggregate  │
//!                    │  specification)  │                └────────────┘
//!                    └──────────────────┘
//! ```
//!
//! Relevance estimates are produced elsewhere and passed in as a
//! [`RelevanceMap`]; nothing in this crate performs I/O.

pub mod aggregate;
pub mod class;
pub mod classify;
pub mod comments;
pub mod error;
pub mod policy;
pub mod rubric;
pub mod score;
pub mod task;
pub mod types;

pub use aggregate::{aggregate, Aggregation, ContributorTotal};
pub use class::ContributionClass;
pub use classify::{classify_comments, classify_participants, ClassifiedComments, ClassifiedParticipants};
pub use comments::{score_comments, RelevanceMap};
pub use error::{ContributionError, Result};
pub use policy::{RubricMultipliers, ScoreCombination, ScoringPolicy};
pub use rubric::{ElementKind, RubricEngine, RubricScore, RubricTotal};
pub use score::{
    CommentScore, ScoreSource, ScoringBreakdown, ScoringOutcome, SkipReason, SkippedContribution,
    UserScoreDetail,
};
pub use task::{lowest_price, score_specification, score_task};
pub use types::*;
