//! Comment scoring for one surface.
//!
//! Each classified comment gets a rubric score which is then combined with the
//! sampled relevance of that comment. Scores are summed per (user, class).

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::classify::{ClassifiedComments, ClassifiedParticipants};
use crate::policy::ScoringPolicy;
use crate::rubric::RubricEngine;
use crate::score::{
    CommentScore, ScoreSource, ScoringBreakdown, ScoringOutcome, SkipReason, SkippedContribution,
    UserScoreDetail,
};
use crate::types::ContributionKind;

/// Relevance estimates keyed by comment id.
pub type RelevanceMap = HashMap<u64, Decimal>;

/// Score every comment class of a surface.
///
/// A comment without a relevance estimate is scored with the policy's
/// `relevance_fallback`, and the affected (user, class) pair is recorded as
/// [`SkipReason::RelevanceUnavailable`] so the gap stays auditable.
pub fn score_comments(
    issue_id: u64,
    participants: &ClassifiedParticipants,
    comments: &ClassifiedComments,
    relevance: &RelevanceMap,
    engine: &RubricEngine,
    policy: &ScoringPolicy,
) -> ScoringOutcome {
    let mut outcome = ScoringOutcome::default();

    for (class, bucket) in comments.iter() {
        if bucket.is_empty() {
            continue;
        }
        let multipliers = policy.multipliers(class);

        for member in participants.members(class) {
            let rubric = engine.score_participant(member, bucket, &multipliers);
            if rubric.comments.is_empty() {
                continue;
            }

            let mut missing_relevance = false;
            let scored: Vec<CommentScore> = rubric
                .comments
                .into_iter()
                .map(|rubric| {
                    let sampled = relevance.get(&rubric.comment_id).copied();
                    missing_relevance |= sampled.is_none();
                    let value = sampled.unwrap_or(policy.relevance_fallback);
                    let total = policy.combination.combine(rubric.total(), value);
                    CommentScore {
                        rubric,
                        relevance: sampled,
                        total,
                    }
                })
                .collect();

            if missing_relevance {
                outcome.skipped.push(SkippedContribution::new(
                    Some(member.clone()),
                    Some(class),
                    SkipReason::RelevanceUnavailable,
                ));
            }

            let score: Decimal = scored.iter().map(|c| c.total).sum();
            debug!(
                user = %member.login,
                class = %class,
                comments = scored.len(),
                %score,
                "Scored comments"
            );

            outcome.details.push(UserScoreDetail {
                score,
                class,
                view: class.surface(),
                role: class.role(),
                contribution: ContributionKind::Comment,
                scoring: ScoringBreakdown::Comments { comments: scored },
                source: ScoreSource {
                    issue_id,
                    user: member.clone(),
                },
            });
        }
    }

    outcome
}
