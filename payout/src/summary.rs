//! Markdown summary posted back to the issue thread.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use contribution::{ContributorTotal, ScoringBreakdown, SkippedContribution, Surface};
use permit::PaymentAuthorization;

use crate::settlement::ContributorAuthorization;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Link that opens the claim page with one authorization preloaded.
pub fn claim_url(base_url: &str, authorization: &PaymentAuthorization) -> serde_json::Result<String> {
    let payload = serde_json::to_vec(&[authorization.transaction_data()])?;
    Ok(format!(
        "{}?claim={}",
        base_url.trim_end_matches('/'),
        BASE64.encode(payload)
    ))
}

/// One row of a contributor's overview table.
#[derive(Debug, Default)]
struct Row {
    count: usize,
    reward: Decimal,
}

fn overview(total: &ContributorTotal) -> BTreeMap<(Surface, String), Row> {
    let mut rows: BTreeMap<(Surface, String), Row> = BTreeMap::new();
    for detail in &total.details {
        let row = rows
            .entry((detail.view, detail.contribution.to_string()))
            .or_default();
        row.count += match &detail.scoring {
            ScoringBreakdown::Comments { comments } => comments.len(),
            _ => 1,
        };
        row.reward += detail.score;
    }
    rows
}

/// Render the run summary.
///
/// `authorizations` is matched to `totals` by beneficiary user; a contributor
/// without one shows the reward unclaimed.
pub fn render_summary(
    claim_base_url: &str,
    totals: &[ContributorTotal],
    authorizations: &[ContributorAuthorization],
    skipped: &[SkippedContribution],
) -> String {
    let mut out = String::new();

    for total in totals {
        let reward = total.total.normalize();
        let link = authorizations
            .iter()
            .find(|a| a.user.id == total.user.id)
            .and_then(|a| claim_url(claim_base_url, &a.authorization).ok());

        match link {
            Some(url) => {
                let _ = writeln!(out, "### [ **{}: [ CLAIM {} ]** ]({})", total.user.login, reward, url);
            }
            None => {
                let _ = writeln!(out, "### **{}: {} (unclaimed)**", total.user.login, reward);
            }
        }

        out.push_str("<details>\n<summary>Contributions Overview</summary>\n\n");
        out.push_str("| View | Contribution | Count | Reward |\n");
        out.push_str("| --- | --- | --- | --- |\n");
        for ((view, contribution), row) in overview(total) {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                view,
                contribution,
                row.count,
                row.reward.normalize()
            );
        }
        out.push_str("\n</details>\n\n");
    }

    if !skipped.is_empty() {
        out.push_str("<details>\n<summary>Not rewarded</summary>\n\n");
        out.push_str("| Contributor | Class | Reason |\n");
        out.push_str("| --- | --- | --- |\n");
        for entry in skipped {
            let user = entry.user.as_ref().map(|u| u.login.as_str()).unwrap_or("-");
            let class = entry
                .class
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(out, "| {} | {} | {} |", user, class, entry.reason);
        }
        out.push_str("\n</details>\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use contribution::{
        ContributionClass, ContributionKind, Participant, Role, ScoreSource, SkipReason,
        UserScoreDetail,
    };
    use permit::{Erc20Permit, EthSigner, PERMIT2_ADDRESS};
    use rust_decimal_macros::dec;

    fn bob_total() -> ContributorTotal {
        let bob = Participant::human(2, "bob");
        ContributorTotal {
            user: bob.clone(),
            total: dec!(25.00),
            details: vec![UserScoreDetail {
                score: dec!(25.00),
                class: ContributionClass::IssueAssigneeTask,
                view: Surface::Issue,
                role: Role::Assignee,
                contribution: ContributionKind::Task,
                scoring: ScoringBreakdown::Task {
                    price: dec!(50),
                    assignees: 2,
                    multiplier: dec!(1),
                },
                source: ScoreSource {
                    issue_id: 1,
                    user: bob,
                },
            }],
        }
    }

    fn authorization() -> ContributorAuthorization {
        let mut key = [0u8; 32];
        key[31] = 1;
        let signer = EthSigner::from_bytes(&key).unwrap();
        Erc20Permit::new(
            100,
            "0xe91D153E0b41518A2Ce8Dd3D7944Fa863463a97d".parse().unwrap(),
            PERMIT2_ADDRESS.parse().unwrap(),
            18,
        )
        .sign(&signer, signer.address(), dec!(25), 2, 1)
        .map(|authorization| ContributorAuthorization {
            user: Participant::human(2, "bob"),
            authorization,
        })
        .unwrap()
    }

    #[test]
    fn test_claim_url_decodes_to_transaction_data() {
        let auth = authorization().authorization;
        let url = claim_url("https://pay.example/", &auth).unwrap();
        let encoded = url.strip_prefix("https://pay.example?claim=").unwrap();

        let decoded: serde_json::Value =
            serde_json::from_slice(&BASE64.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded[0]["transferDetails"]["requestedAmount"], "25000000000000000000");
    }

    #[test]
    fn test_summary_lists_contributor_rows() {
        let summary = render_summary(
            "https://pay.example",
            &[bob_total()],
            &[authorization()],
            &[],
        );

        assert!(summary.contains("CLAIM 25"));
        assert!(summary.contains("| Issue | Task | 1 | 25 |"));
        assert!(!summary.contains("Not rewarded"));
    }

    #[test]
    fn test_summary_reports_skips() {
        let skipped = vec![SkippedContribution::new(
            Some(Participant::human(4, "dave")),
            None,
            SkipReason::NoWallet,
        )];
        let summary = render_summary("https://pay.example", &[bob_total()], &[], &skipped);

        assert!(summary.contains("bob: 25 (unclaimed)"));
        assert!(summary.contains("| dave | - | no registered wallet |"));
    }
}
