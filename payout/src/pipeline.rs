//! The closed-issue payout pipeline.
//!
//! classify → relevance (issue and review surfaces concurrently) → score →
//! aggregate → settle → summarize. The pipeline always returns a report,
//! possibly partial; only a broken scoring invariant aborts the run.

use chrono::{DateTime, Utc};
use contribution::{
    aggregate, classify_comments, classify_participants, is_scorable_comment, score_comments,
    score_specification, score_task, Comment, ContributorTotal, Issue, Participant,
    RelevanceMap, Role, RubricEngine, SkipReason, SkippedContribution, Surface, UserId,
};
use permit::{NftMintAuthorization, PaymentAuthorization};
use rust_decimal::Decimal;
use relevance_agent::{LlmBackend, RelevanceOutcome, RelevanceSampler, TokenCounter};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PayoutSettings;
use crate::error::{ConfigError, Result};
use crate::settlement::{ContributorAuthorization, Settlement};
use crate::summary::render_summary;

/// Everything the host adapter hands over for one closed issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutInput {
    pub issue: Issue,
    /// Comments on the issue thread, in posting order
    #[serde(default)]
    pub issue_comments: Vec<Comment>,
    /// Comments on linked pull requests, in posting order
    #[serde(default)]
    pub review_comments: Vec<Comment>,
    /// Repository collaborators
    #[serde(default)]
    pub collaborators: Vec<Participant>,
    /// Registered wallet per user id
    #[serde(default)]
    pub wallets: HashMap<UserId, String>,
}

/// Result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct PayoutReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub issue_id: u64,
    /// Ranked contributor totals
    pub totals: Vec<ContributorTotal>,
    /// Payment authorizations, in ranking order
    pub authorizations: Vec<ContributorAuthorization>,
    pub nft_authorizations: Vec<NftMintAuthorization>,
    /// Everything classified or scored that was not paid, with a reason
    pub skipped: Vec<SkippedContribution>,
    /// Sampling result per surface that had comments to sample
    pub relevance: BTreeMap<Surface, RelevanceOutcome>,
    /// Markdown comment body for the issue thread
    pub summary: String,
}

impl PayoutReport {
    pub fn authorization_for(&self, user_id: UserId) -> Option<&PaymentAuthorization> {
        self.authorizations
            .iter()
            .find(|a| a.user.id == user_id)
            .map(|a| &a.authorization)
    }

    pub fn total_for(&self, user_id: UserId) -> Option<Decimal> {
        self.totals
            .iter()
            .find(|t| t.user.id == user_id)
            .map(|t| t.total)
    }
}

/// Runs the pipeline for closed issues.
pub struct PayoutPipeline {
    settings: PayoutSettings,
    engine: RubricEngine,
    sampler: RelevanceSampler,
    settlement: Settlement,
}

impl PayoutPipeline {
    pub fn new(
        settings: PayoutSettings,
        backend: Arc<dyn LlmBackend>,
        counter: Arc<dyn TokenCounter>,
        settlement: Settlement,
    ) -> Result<Self> {
        settings.validate()?;
        let engine = RubricEngine::new(settings.scoring.element_values.clone())
            .map_err(|e| ConfigError::invalid("scoring.element_values", e))?;
        let sampler = RelevanceSampler::new(backend, counter, settings.relevance.clone())?;

        Ok(Self {
            settings,
            engine,
            sampler,
            settlement,
        })
    }

    /// Score and settle one closed issue.
    pub async fn run(&self, input: &PayoutInput) -> Result<PayoutReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let issue = &input.issue;
        let policy = &self.settings.scoring;

        info!(%run_id, issue_id = issue.id, "Starting payout run");

        let issue_comments = scorable(&input.issue_comments);
        let review_comments = scorable(&input.review_comments);

        let all_comments: Vec<Comment> = issue_comments
            .iter()
            .chain(review_comments.iter())
            .cloned()
            .collect();
        let participants = classify_participants(issue, &all_comments, &input.collaborators);
        participants.ensure_disjoint(Surface::Issue)?;
        participants.ensure_disjoint(Surface::Review)?;

        let issue_classified = classify_comments(&participants, &issue_comments, Surface::Issue);
        let review_classified = classify_comments(&participants, &review_comments, Surface::Review);

        let (issue_relevance, review_relevance) = tokio::join!(
            self.relevance(issue, Surface::Issue, &issue_comments),
            self.relevance(issue, Surface::Review, &review_comments),
        );

        let mut relevance = BTreeMap::new();
        let mut scores_for = |surface: Surface, sampled: Option<RelevanceOutcome>, comments: &[Comment]| {
            let map = sampled
                .as_ref()
                .filter(|outcome| outcome.is_sampled())
                .map(|outcome| outcome.by_comment(comments))
                .unwrap_or_default();
            if let Some(outcome) = sampled {
                relevance.insert(surface, outcome);
            }
            map
        };
        let issue_scores: RelevanceMap = scores_for(Surface::Issue, issue_relevance, &issue_comments);
        let review_scores: RelevanceMap = scores_for(Surface::Review, review_relevance, &review_comments);

        let outcome = score_specification(issue, &self.engine, policy)
            .merge(score_task(issue, policy)?)
            .merge(score_comments(
                issue.id,
                &participants,
                &issue_classified,
                &issue_scores,
                &self.engine,
                policy,
            ))
            .merge(score_comments(
                issue.id,
                &participants,
                &review_classified,
                &review_scores,
                &self.engine,
                policy,
            ));

        let aggregation = aggregate(outcome);
        let mut skipped = aggregation.skipped;

        let settled = self
            .settlement
            .settle_all(issue, &aggregation.totals, &input.wallets)
            .await;

        let mut authorizations = Vec::new();
        let mut nft_authorizations = Vec::new();
        for (total, contributor) in aggregation.totals.iter().zip(settled) {
            if let Some(authorization) = contributor.authorization {
                authorizations.push(ContributorAuthorization {
                    user: total.user.clone(),
                    authorization,
                });
            }
            nft_authorizations.extend(contributor.nft);
            skipped.extend(contributor.skipped);
        }

        audit_unscored(&participants_list(&participants), &aggregation.totals, &mut skipped);

        let summary = render_summary(
            &self.settings.claim_base_url,
            &aggregation.totals,
            &authorizations,
            &skipped,
        );

        info!(
            %run_id,
            issue_id = issue.id,
            contributors = aggregation.totals.len(),
            authorizations = authorizations.len(),
            skipped = skipped.len(),
            "Payout run complete"
        );

        Ok(PayoutReport {
            run_id,
            started_at,
            issue_id: issue.id,
            totals: aggregation.totals,
            authorizations,
            nft_authorizations,
            skipped,
            relevance,
            summary,
        })
    }

    /// Sample one surface. Any failure degrades to "no relevance".
    async fn relevance(
        &self,
        issue: &Issue,
        surface: Surface,
        comments: &[Comment],
    ) -> Option<RelevanceOutcome> {
        if comments.is_empty() {
            return None;
        }

        match self.sampler.sample(issue.specification(), comments).await {
            Ok(outcome) => {
                if !outcome.is_sampled() {
                    warn!(issue_id = issue.id, %surface, attempts = outcome.attempts, "Relevance sampling exhausted");
                }
                Some(outcome)
            }
            Err(e) => {
                warn!(issue_id = issue.id, %surface, error = %e, "Relevance unavailable");
                None
            }
        }
    }
}

fn scorable(comments: &[Comment]) -> Vec<Comment> {
    comments
        .iter()
        .filter(|comment| is_scorable_comment(comment))
        .cloned()
        .collect()
}

fn participants_list(participants: &contribution::ClassifiedParticipants) -> Vec<Participant> {
    [Role::Issuer, Role::Assignee, Role::Collaborator, Role::Contributor]
        .into_iter()
        .flat_map(|role| participants.with_role(role).iter().cloned())
        .collect()
}

/// Classified participants who earned nothing and have no audit entry yet.
fn audit_unscored(
    participants: &[Participant],
    totals: &[ContributorTotal],
    skipped: &mut Vec<SkippedContribution>,
) {
    let mut seen: HashSet<UserId> = totals.iter().map(|t| t.user.id).collect();
    seen.extend(skipped.iter().filter_map(|s| s.user.as_ref().map(|u| u.id)));

    for participant in participants {
        if seen.insert(participant.id) {
            skipped.push(SkippedContribution::new(
                Some(participant.clone()),
                None,
                SkipReason::ZeroScore,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_and_bots_are_filtered() {
        let alice = Participant::human(1, "alice");
        let comments = vec![
            Comment::new(1, "/start", alice.clone()),
            Comment::new(2, "Looks right", alice),
            Comment::new(3, "Deployed", Participant::bot(9, "ci")),
        ];
        let kept = scorable(&comments);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 2);
    }

    #[test]
    fn test_unscored_participants_are_audited_once() {
        let dave = Participant::human(4, "dave");
        let erin = Participant::human(5, "erin");
        let mut skipped = vec![SkippedContribution::new(
            Some(erin.clone()),
            None,
            SkipReason::NoWallet,
        )];

        audit_unscored(&[dave.clone(), erin, dave], &[], &mut skipped);
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[1].user.as_ref().unwrap().id, 4);
        assert_eq!(skipped[1].reason, SkipReason::ZeroScore);
    }
}
