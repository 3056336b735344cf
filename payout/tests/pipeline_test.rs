//! End-to-end runs with a scripted LLM, a static chain and a fixed test key.

use contribution::{
    Comment, ContributionClass, Issue, Label, Participant, RepositoryRef, SkipReason, Surface,
};
use payout::{PayoutInput, PayoutPipeline, PayoutReport, PayoutSettings, Settlement};
use permit::{
    encrypt_signing_key, parse_private_key, KdfParams, KeyVault, RetryPolicy,
    StaticProviderFactory,
};
use relevance_agent::{LlmBackend, MockBackend, MockReply, TokenCounter};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;

const TEST_KDF: KdfParams = KdfParams {
    memory_kib: 256,
    iterations: 1,
    parallelism: 1,
};

const PAYER: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

/// Whitespace token counter; keeps every prompt in the smallest tier.
struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

fn settings() -> PayoutSettings {
    let key = parse_private_key(
        "0x0000000000000000000000000000000000000000000000000000000000000001",
    )
    .unwrap();

    let mut settings = PayoutSettings::default();
    settings.payments.signing_key = Some(encrypt_signing_key(&key, b"pw", TEST_KDF).unwrap());
    settings.retry = RetryPolicy::immediate(2);
    settings.claim_base_url = "https://pay.example".to_string();
    settings
}

fn pipeline(settings: PayoutSettings, backend: Arc<MockBackend>) -> PayoutPipeline {
    let vault = settings
        .payments
        .signing_key
        .clone()
        .map(|material| KeyVault::new(material, b"pw".to_vec()));
    let settlement = Settlement::new(
        &settings,
        vault,
        Arc::new(StaticProviderFactory::new(settings.payments.network_id)),
    )
    .unwrap();

    let backend: Arc<dyn LlmBackend> = backend;
    PayoutPipeline::new(settings, backend, Arc::new(WordCounter), settlement).unwrap()
}

/// Issuer A, assignees B and C, collaborator D, contributor E with two comments.
fn scenario() -> PayoutInput {
    let a = Participant::human(1, "alice");
    let b = Participant::human(2, "bob");
    let c = Participant::human(3, "carol");
    let d = Participant::human(4, "dave");
    let e = Participant::human(5, "erin");

    PayoutInput {
        issue: Issue {
            id: 1001,
            number: 17,
            body: Some("Add retry support to the uploader".to_string()),
            labels: vec![Label::new("Price: 50"), Label::new("Priority: 1")],
            assignees: vec![Some(b.clone()), None, Some(c.clone())],
            user: a,
            repository: Some(RepositoryRef {
                owner: "acme".into(),
                name: "widgets".into(),
            }),
        },
        issue_comments: vec![
            Comment::new(11, "alpha beta gamma", e.clone()),
            Comment::new(12, "/start", b.clone()),
            Comment::new(13, "delta epsilon", e),
            Comment::new(14, "Deployed preview", Participant::bot(99, "ci-bot")),
        ],
        review_comments: vec![],
        collaborators: vec![d],
        wallets: HashMap::from([
            (2, "0x4007ce2083c7f3e18097aeb3a39bb8ec149a341d".to_string()),
            (3, "0x2b5ad5c4795c026514f8317c7a215e218dccd6cf".to_string()),
            (5, "0x6813eb9362372eef6200f3b1dbc3f819671cba69".to_string()),
        ]),
    }
}

fn skip_reasons(report: &PayoutReport, user_id: u64) -> Vec<SkipReason> {
    report
        .skipped
        .iter()
        .filter(|s| s.user.as_ref().map(|u| u.id) == Some(user_id))
        .map(|s| s.reason.clone())
        .collect()
}

#[tokio::test]
async fn test_closed_issue_scenario() {
    let backend = Arc::new(MockBackend::new("mock").with_response("[0.5, 1]"));
    let report = pipeline(settings(), backend.clone())
        .run(&scenario())
        .await
        .unwrap();

    // Task split and specification
    assert_eq!(report.total_for(2), Some(dec!(25)));
    assert_eq!(report.total_for(3), Some(dec!(25)));
    assert_eq!(report.total_for(1), Some(dec!(0.8)));
    // 3 words × 0.1 × 0.5 + 2 words × 0.1 × 1
    assert_eq!(report.total_for(5), Some(dec!(0.35)));
    assert_eq!(report.total_for(4), None);

    let ranked: Vec<u64> = report.totals.iter().map(|t| t.user.id).collect();
    assert_eq!(ranked, vec![2, 3, 1, 5]);

    // One batch of ten samples on the issue surface; no review comments
    assert_eq!(backend.call_count(), 10);
    assert!(report.relevance[&Surface::Issue].is_sampled());
    assert!(!report.relevance.contains_key(&Surface::Review));

    // Alice has no wallet; Dave never contributed
    assert_eq!(report.authorizations.len(), 3);
    assert_eq!(skip_reasons(&report, 1), vec![SkipReason::NoWallet]);
    assert_eq!(skip_reasons(&report, 4), vec![SkipReason::ZeroScore]);

    let bob = report.authorization_for(2).unwrap();
    assert_eq!(bob.owner.to_checksum(), PAYER);
    assert_eq!(bob.transaction_data().permit.permitted.amount, "25000000000000000000");

    assert!(report.summary.contains("CLAIM 25"));
    assert!(report.summary.contains("| dave | - | zero score |"));
}

#[tokio::test]
async fn test_review_thread_comments_are_scored_per_class() {
    let mut input = scenario();
    input.review_comments = vec![
        Comment::new(21, "fixed flaky backoff test", Participant::human(2, "bob")),
        Comment::new(22, "needs docs", Participant::human(4, "dave")),
        Comment::new(23, "/approve", Participant::human(4, "dave")),
    ];

    let backend = Arc::new(MockBackend::new("mock").with_response("[0.5, 1]"));
    let report = pipeline(settings(), backend.clone())
        .run(&input)
        .await
        .unwrap();

    // One batch per surface
    assert_eq!(backend.call_count(), 20);
    assert!(report.relevance[&Surface::Issue].is_sampled());
    assert!(report.relevance[&Surface::Review].is_sampled());

    // 4 words × 0.1 × 0.5 on top of the task share; 2 words × 0.1 × 1
    assert_eq!(report.total_for(2), Some(dec!(25.2)));
    assert_eq!(report.total_for(4), Some(dec!(0.2)));
    assert_eq!(report.total_for(5), Some(dec!(0.35)));

    let ranked: Vec<u64> = report.totals.iter().map(|t| t.user.id).collect();
    assert_eq!(ranked, vec![2, 3, 1, 5, 4]);

    let bob = report.totals.iter().find(|t| t.user.id == 2).unwrap();
    let bob_classes: Vec<ContributionClass> = bob.details.iter().map(|d| d.class).collect();
    assert!(bob_classes.contains(&ContributionClass::IssueAssigneeTask));
    assert!(bob_classes.contains(&ContributionClass::ReviewAssigneeComment));
    let review = bob
        .details
        .iter()
        .find(|d| d.class == ContributionClass::ReviewAssigneeComment)
        .unwrap();
    assert_eq!(review.view, Surface::Review);
    assert_eq!(review.score, dec!(0.2));

    let dave = report.totals.iter().find(|t| t.user.id == 4).unwrap();
    assert_eq!(dave.details.len(), 1);
    assert_eq!(dave.details[0].class, ContributionClass::ReviewCollaboratorComment);

    // Dave earned something now but has no wallet
    assert_eq!(skip_reasons(&report, 4), vec![SkipReason::NoWallet]);
    assert_eq!(
        report.authorization_for(2).unwrap().base_amount,
        "25200000000000000000"
    );
    assert!(report.summary.contains("| Review | Comment | 1 | 0.2 |"));
}

#[tokio::test]
async fn test_nonces_stable_across_runs() {
    let first = pipeline(settings(), Arc::new(MockBackend::new("mock").with_response("[0.5, 1]")))
        .run(&scenario())
        .await
        .unwrap();
    let second = pipeline(settings(), Arc::new(MockBackend::new("mock").with_response("[0.5, 1]")))
        .run(&scenario())
        .await
        .unwrap();

    assert_ne!(first.run_id, second.run_id);
    for user_id in [2, 3, 5] {
        let a = first.authorization_for(user_id).unwrap();
        let b = second.authorization_for(user_id).unwrap();
        assert_eq!(a.nonce, b.nonce);
        assert_eq!(a.signature, b.signature);
    }
}

#[tokio::test]
async fn test_malformed_samples_retry_whole_batch() {
    let mut script: Vec<MockReply> = (0..7).map(|_| MockReply::Content("[0.5, 1]".into())).collect();
    script.extend((0..3).map(|_| MockReply::Content("[0.5]".into())));
    let backend = Arc::new(
        MockBackend::new("mock")
            .with_script(script)
            .with_response("[0.5, 1]"),
    );

    let report = pipeline(settings(), backend.clone())
        .run(&scenario())
        .await
        .unwrap();

    assert_eq!(backend.call_count(), 20);
    assert_eq!(report.relevance[&Surface::Issue].attempts, 2);
    assert_eq!(report.total_for(5), Some(dec!(0.35)));
}

#[tokio::test]
async fn test_unavailable_relevance_does_not_block_payouts() {
    let mut settings = settings();
    settings.relevance.max_attempts = 2;
    let backend = Arc::new(
        MockBackend::new("mock")
            .with_script((0..20).map(|_| MockReply::Fail("upstream down".into()))),
    );

    let report = pipeline(settings, backend).run(&scenario()).await.unwrap();

    assert!(!report.relevance[&Surface::Issue].is_sampled());
    assert_eq!(report.total_for(5), None);
    assert_eq!(
        skip_reasons(&report, 5),
        vec![SkipReason::RelevanceUnavailable, SkipReason::ZeroScore]
    );
    assert!(report.authorization_for(2).is_some());
    assert!(report.authorization_for(3).is_some());
}

#[tokio::test]
async fn test_wrong_network_fails_every_authorization_but_completes() {
    let settings = settings();
    let vault = settings
        .payments
        .signing_key
        .clone()
        .map(|material| KeyVault::new(material, b"pw".to_vec()));
    let settlement = Settlement::new(&settings, vault, Arc::new(StaticProviderFactory::new(1))).unwrap();
    let backend: Arc<dyn LlmBackend> = Arc::new(MockBackend::new("mock").with_response("[0.5, 1]"));
    let pipeline = PayoutPipeline::new(settings, backend, Arc::new(WordCounter), settlement).unwrap();

    let report = pipeline.run(&scenario()).await.unwrap();

    assert!(report.authorizations.is_empty());
    assert_eq!(report.totals.len(), 4);
    assert!(matches!(
        skip_reasons(&report, 2).as_slice(),
        [SkipReason::AuthorizationFailed(_)]
    ));
    assert!(report.summary.contains("bob: 25 (unclaimed)"));
}
