//! Task and specification scorers.
//!
//! These two contribution kinds are scored outside the comment rubric flow:
//! assignees split the issue price, and the issuer is rewarded for the issue
//! body itself.

use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::class::ContributionClass;
use crate::error::Result;
use crate::policy::ScoringPolicy;
use crate::rubric::RubricEngine;
use crate::score::{
    CommentScore, ScoreSource, ScoringBreakdown, ScoringOutcome, SkipReason, SkippedContribution,
    UserScoreDetail,
};
use crate::types::{Comment, ContributionKind, Issue, Label};

/// Prefix of labels carrying the issue price.
pub const PRICE_LABEL_PREFIX: &str = "Price: ";

/// Smallest price among the issue's `Price: <n>` labels.
pub fn lowest_price(labels: &[Label]) -> Result<Option<Decimal>> {
    let number = Regex::new(r"\d+(\.\d+)?")?;

    let lowest = labels
        .iter()
        .filter(|label| label.name.starts_with(PRICE_LABEL_PREFIX))
        .filter_map(|label| number.find(&label.name))
        .filter_map(|m| Decimal::from_str(m.as_str()).ok())
        .min();

    Ok(lowest)
}

/// Split the issue price across assignees.
///
/// Each assignee receives `price / assignees × multiplier`. A missing price
/// label or an unassigned issue yields an audit entry instead of a score.
pub fn score_task(issue: &Issue, policy: &ScoringPolicy) -> Result<ScoringOutcome> {
    let class = ContributionClass::IssueAssigneeTask;

    let Some(price) = lowest_price(&issue.labels)? else {
        warn!(issue_id = issue.id, "No price label on issue; skipping task rewards");
        return Ok(ScoringOutcome::skipped(SkippedContribution::new(
            None,
            Some(class),
            SkipReason::NoPriceLabel,
        )));
    };

    let assignees = issue.assignee_list();
    if assignees.is_empty() {
        warn!(issue_id = issue.id, %price, "Priced issue has no assignees");
        return Ok(ScoringOutcome::skipped(SkippedContribution::new(
            None,
            Some(class),
            SkipReason::NoAssignees,
        )));
    }

    let count = assignees.len();
    let multiplier = policy.assignee_multiplier;
    let share = price / Decimal::from(count) * multiplier;

    debug!(issue_id = issue.id, %price, assignees = count, %share, "Scored task");

    let details = assignees
        .into_iter()
        .map(|assignee| UserScoreDetail {
            score: share,
            class,
            view: class.surface(),
            role: class.role(),
            contribution: ContributionKind::Task,
            scoring: ScoringBreakdown::Task {
                price,
                assignees: count,
                multiplier,
            },
            source: ScoreSource {
                issue_id: issue.id,
                user: assignee,
            },
        })
        .collect();

    Ok(ScoringOutcome {
        details,
        skipped: Vec::new(),
    })
}

/// Score the issue body as a synthetic comment by the issuer.
///
/// The body is self-evidently relevant to itself, so relevance is fixed at 1.
pub fn score_specification(
    issue: &Issue,
    engine: &RubricEngine,
    policy: &ScoringPolicy,
) -> ScoringOutcome {
    let class = ContributionClass::IssueIssuerSpecification;

    let Some(comment) = Comment::from_specification(issue) else {
        warn!(issue_id = issue.id, "Issue has no specification body");
        return ScoringOutcome::skipped(SkippedContribution::new(
            Some(issue.user.clone()),
            Some(class),
            SkipReason::MissingSpecification,
        ));
    };

    let rubric = engine.score_comment(&comment, &policy.multipliers(class));
    let relevance = Decimal::ONE;
    let total = policy.combination.combine(rubric.total(), relevance);

    debug!(issue_id = issue.id, %total, "Scored specification");

    ScoringOutcome {
        details: vec![UserScoreDetail {
            score: total,
            class,
            view: class.surface(),
            role: class.role(),
            contribution: ContributionKind::Specification,
            scoring: ScoringBreakdown::Specification {
                comment: CommentScore {
                    rubric,
                    relevance: Some(relevance),
                    total,
                },
            },
            source: ScoreSource {
                issue_id: issue.id,
                user: issue.user.clone(),
            },
        }],
        skipped: Vec::new(),
    }
}
