//! Per-contributor totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::score::{ScoringOutcome, SkipReason, SkippedContribution, UserScoreDetail};
use crate::types::{Participant, UserId};

/// Everything one contributor earned on an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorTotal {
    pub user: Participant,
    /// Sum of `details[*].score`
    pub total: Decimal,
    pub details: Vec<UserScoreDetail>,
}

/// Ranked totals plus the audit trail of everything that was not paid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Contributors with a positive total, highest first
    pub totals: Vec<ContributorTotal>,
    pub skipped: Vec<SkippedContribution>,
}

/// Sum details per user id and rank the result.
///
/// Zero-score details are moved to the audit trail. Ties are broken by user id
/// so the ranking is deterministic.
pub fn aggregate(outcome: ScoringOutcome) -> Aggregation {
    let ScoringOutcome {
        details,
        mut skipped,
    } = outcome;

    let mut by_user: BTreeMap<UserId, ContributorTotal> = BTreeMap::new();

    for detail in details {
        if detail.score.is_zero() {
            skipped.push(SkippedContribution::new(
                Some(detail.user().clone()),
                Some(detail.class),
                SkipReason::ZeroScore,
            ));
            continue;
        }

        let entry = by_user
            .entry(detail.user().id)
            .or_insert_with(|| ContributorTotal {
                user: detail.user().clone(),
                total: Decimal::ZERO,
                details: Vec::new(),
            });
        entry.total += detail.score;
        entry.details.push(detail);
    }

    let mut totals: Vec<ContributorTotal> = by_user.into_values().collect();
    totals.sort_by(|a, b| b.total.cmp(&a.total).then(a.user.id.cmp(&b.user.id)));

    Aggregation { totals, skipped }
}
