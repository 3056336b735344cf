//! Score records shared by the scorers and the aggregator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::class::ContributionClass;
use crate::rubric::RubricScore;
use crate::types::{ContributionKind, Participant, Role, Surface};

/// One comment's contribution to a user's score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentScore {
    /// Rubric result for the comment
    pub rubric: RubricScore,
    /// Sampled relevance; `None` when sampling gave no estimate
    pub relevance: Option<Decimal>,
    /// Final score after combining rubric and relevance
    pub total: Decimal,
}

/// How a score was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoringBreakdown {
    /// Scored comments on one surface
    Comments { comments: Vec<CommentScore> },
    /// The issue body scored as a synthetic comment
    Specification { comment: CommentScore },
    /// Share of the issue price
    Task {
        price: Decimal,
        assignees: usize,
        multiplier: Decimal,
    },
}

/// Where a score came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSource {
    /// Issue id
    pub issue_id: u64,
    /// User the score is attributed to
    pub user: Participant,
}

/// A score for one (user, contribution class) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserScoreDetail {
    pub score: Decimal,
    pub class: ContributionClass,
    pub view: Surface,
    pub role: Role,
    pub contribution: ContributionKind,
    pub scoring: ScoringBreakdown,
    pub source: ScoreSource,
}

impl UserScoreDetail {
    pub fn user(&self) -> &Participant {
        &self.source.user
    }
}

/// Why a contribution produced no payable score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// No `Price: <n>` label on the issue
    NoPriceLabel,
    /// Price present but nobody was assigned
    NoAssignees,
    /// The issue has no specification body
    MissingSpecification,
    /// Relevance sampling never produced a valid estimate
    RelevanceUnavailable,
    /// The contribution scored zero
    ZeroScore,
    /// The contributor has no registered wallet
    NoWallet,
    /// The reward truncates to zero base units of the payment token
    BelowTokenPrecision,
    /// Signing the payment authorization failed
    AuthorizationFailed(String),
    /// Signing the reward NFT failed
    NftFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoPriceLabel => f.write_str("no price label"),
            SkipReason::NoAssignees => f.write_str("no assignees"),
            SkipReason::MissingSpecification => f.write_str("issue specification is missing"),
            SkipReason::RelevanceUnavailable => f.write_str("relevance could not be sampled"),
            SkipReason::ZeroScore => f.write_str("zero score"),
            SkipReason::NoWallet => f.write_str("no registered wallet"),
            SkipReason::BelowTokenPrecision => f.write_str("below the token's smallest unit"),
            SkipReason::AuthorizationFailed(e) => write!(f, "authorization failed: {e}"),
            SkipReason::NftFailed(e) => write!(f, "reward NFT failed: {e}"),
        }
    }
}

/// Audit record for a contribution that was classified but not paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedContribution {
    /// Affected user, when the skip concerns a single person
    pub user: Option<Participant>,
    /// Affected class, when known
    pub class: Option<ContributionClass>,
    pub reason: SkipReason,
}

impl SkippedContribution {
    pub fn new(
        user: Option<Participant>,
        class: Option<ContributionClass>,
        reason: SkipReason,
    ) -> Self {
        Self {
            user,
            class,
            reason,
        }
    }
}

/// Output of a scorer: details that produced a score plus audit entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringOutcome {
    pub details: Vec<UserScoreDetail>,
    pub skipped: Vec<SkippedContribution>,
}

impl ScoringOutcome {
    pub fn skipped(entry: SkippedContribution) -> Self {
        Self {
            details: Vec::new(),
            skipped: vec![entry],
        }
    }

    /// Append another outcome.
    pub fn merge(mut self, other: ScoringOutcome) -> Self {
        self.details.extend(other.details);
        self.skipped.extend(other.skipped);
        self
    }
}
