//! Settlement: one signed authorization per paid contributor.
//!
//! Contributors are settled concurrently and independently. A missing wallet,
//! an unreachable network or a signing failure only affects the contributor
//! it happened to; everyone else is still paid. Only transient RPC failures are
//! retried.

use contribution::{
    ContributorTotal, Issue, Participant, SkipReason, SkippedContribution, UserId,
};
use futures::future::join_all;
use serde::Serialize;
use permit::{
    Address, Erc20Permit, Erc721Permit, KeyVault, NftMetadata, NftMintAuthorization,
    PaymentAuthorization, PermitError, ProviderFactory, RetryPolicy,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PayoutSettings;
use crate::error::ConfigError;

/// ERC-721 half of settlement, present only when badges are enabled.
pub struct NftSettlement {
    permit: Erc721Permit,
    key: KeyVault,
    providers: Arc<dyn ProviderFactory>,
}

impl NftSettlement {
    pub fn new(permit: Erc721Permit, key: KeyVault, providers: Arc<dyn ProviderFactory>) -> Self {
        Self {
            permit,
            key,
            providers,
        }
    }
}

/// A payment authorization and the contributor it pays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributorAuthorization {
    pub user: Participant,
    pub authorization: PaymentAuthorization,
}

/// What settling one contributor produced.
#[derive(Debug, Default)]
pub struct SettledContributor {
    pub authorization: Option<PaymentAuthorization>,
    pub nft: Option<NftMintAuthorization>,
    pub skipped: Vec<SkippedContribution>,
}

/// Signs payouts for a run.
pub struct Settlement {
    erc20: Erc20Permit,
    payment_key: Option<KeyVault>,
    providers: Arc<dyn ProviderFactory>,
    nft: Option<NftSettlement>,
    retry: RetryPolicy,
}

impl Settlement {
    /// Build from settings. Keys are handed in already paired with their
    /// passphrases; `payment_key` may be absent, in which case every
    /// contributor is reported as unpaid.
    pub fn new(
        settings: &PayoutSettings,
        payment_key: Option<KeyVault>,
        providers: Arc<dyn ProviderFactory>,
    ) -> Result<Self, ConfigError> {
        let payments = &settings.payments;
        let erc20 = Erc20Permit::new(
            payments.network_id,
            payments.token_address()?,
            payments.permit2_address()?,
            payments.token_decimals,
        );

        Ok(Self {
            erc20,
            payment_key,
            providers,
            nft: None,
            retry: settings.retry,
        })
    }

    pub fn with_nft(mut self, nft: NftSettlement) -> Self {
        self.nft = Some(nft);
        self
    }

    /// Settle every contributor, preserving input order.
    pub async fn settle_all(
        &self,
        issue: &Issue,
        totals: &[ContributorTotal],
        wallets: &HashMap<UserId, String>,
    ) -> Vec<SettledContributor> {
        join_all(
            totals
                .iter()
                .map(|total| self.settle(issue, total, wallets.get(&total.user.id))),
        )
        .await
    }

    /// Settle one contributor.
    pub async fn settle(
        &self,
        issue: &Issue,
        total: &ContributorTotal,
        wallet: Option<&String>,
    ) -> SettledContributor {
        let mut settled = SettledContributor::default();
        let skip = |reason: SkipReason| SkippedContribution::new(Some(total.user.clone()), None, reason);

        let Some(wallet) = wallet else {
            warn!(user_id = total.user.id, login = %total.user.login, "No wallet registered");
            settled.skipped.push(skip(SkipReason::NoWallet));
            return settled;
        };

        let beneficiary: Address = match wallet.parse() {
            Ok(address) => address,
            Err(e) => {
                warn!(user_id = total.user.id, error = %e, "Registered wallet is malformed");
                settled
                    .skipped
                    .push(skip(SkipReason::AuthorizationFailed(e.to_string())));
                return settled;
            }
        };

        match self.erc20.base_units(total.total) {
            Ok(0) => {
                warn!(user_id = total.user.id, total = %total.total, "Reward is below the token's smallest unit");
                settled.skipped.push(skip(SkipReason::BelowTokenPrecision));
                return settled;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(user_id = total.user.id, error = %e, "Reward cannot be paid in the payment token");
                settled
                    .skipped
                    .push(skip(SkipReason::AuthorizationFailed(e.to_string())));
                return settled;
            }
        }

        match self.sign_payment(issue, total, beneficiary).await {
            Ok(authorization) => settled.authorization = Some(authorization),
            Err(e) => {
                warn!(user_id = total.user.id, issue_id = issue.id, error = %e, "Payment authorization failed");
                settled
                    .skipped
                    .push(skip(SkipReason::AuthorizationFailed(e.to_string())));
            }
        }

        if let Some(nft) = &self.nft {
            match self.sign_nft(nft, issue, total, beneficiary).await {
                Ok(authorization) => settled.nft = Some(authorization),
                Err(e) => {
                    warn!(user_id = total.user.id, issue_id = issue.id, error = %e, "Reward NFT authorization failed");
                    settled.skipped.push(skip(SkipReason::NftFailed(e.to_string())));
                }
            }
        }

        settled
    }

    async fn sign_payment(
        &self,
        issue: &Issue,
        total: &ContributorTotal,
        beneficiary: Address,
    ) -> Result<PaymentAuthorization, PermitError> {
        let key = self
            .payment_key
            .as_ref()
            .ok_or_else(|| PermitError::InvalidKey("no payment signing key configured".into()))?;

        let (erc20, providers) = (&self.erc20, &self.providers);
        let (amount, user_id, issue_id) = (total.total, total.user.id, issue.id);
        self.retry
            .run(
                "sign payment",
                move || async move {
                    providers.connect(erc20.network_id()).await?;
                    key.with_key(|signer| erc20.sign(signer, beneficiary, amount, user_id, issue_id))
                },
                PermitError::is_transient,
            )
            .await
    }

    async fn sign_nft(
        &self,
        nft: &NftSettlement,
        issue: &Issue,
        total: &ContributorTotal,
        beneficiary: Address,
    ) -> Result<NftMintAuthorization, PermitError> {
        let metadata = nft_metadata(issue, total);
        let (metadata, permit, key, providers) = (&metadata, &nft.permit, &nft.key, &nft.providers);
        let (user_id, issue_id) = (total.user.id, issue.id);
        let authorization = self
            .retry
            .run(
                "sign reward nft",
                move || async move {
                    providers.connect(permit.network_id()).await?;
                    key.with_key(|signer| permit.sign(signer, beneficiary, metadata, user_id, issue_id))
                },
                PermitError::is_transient,
            )
            .await?;

        info!(user_id, issue_id, "Reward NFT authorized");
        Ok(authorization)
    }
}

/// Badge metadata for a contributor's work on an issue.
///
/// The contribution type lists each distinct kind of work, in kind order.
pub fn nft_metadata(issue: &Issue, total: &ContributorTotal) -> NftMetadata {
    let kinds: BTreeSet<_> = total.details.iter().map(|d| d.contribution).collect();
    let contribution_type = kinds
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(",");

    let (organization, repository) = issue
        .repository
        .as_ref()
        .map(|r| (r.owner.clone(), r.name.clone()))
        .unwrap_or_default();

    NftMetadata {
        organization,
        repository,
        issue_number: issue.number,
        username: total.user.login.clone(),
        contribution_type,
    }
}
