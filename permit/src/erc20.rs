//! ERC-20 payment authorizations over Permit2 `PermitTransferFrom`.
//!
//! The signature lets the beneficiary pull `amount` of the payment token from
//! the payer through the Permit2 contract. Nonce and deadline are fixed
//! functions of the inputs, so re-signing yields the same permit and a second
//! redemption is rejected on chain.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::eip712::{
    keccak256, typed_data_digest, u128_word, word_to_decimal, Address, Eip712Domain,
    StructEncoder, Word, MAX_WORD,
};
use crate::error::{PermitError, Result};
use crate::signer::{EthSigner, Signature};

/// Canonical Permit2 deployment, identical on every chain.
pub const PERMIT2_ADDRESS: &str = "0x000000000022D473030F116dDEE9F6B43aC78BA3";

const TOKEN_PERMISSIONS_TYPE: &str = "TokenPermissions(address token,uint256 amount)";
const PERMIT_TRANSFER_FROM_TYPE: &str = "PermitTransferFrom(TokenPermissions permitted,address spender,uint256 nonce,uint256 deadline)TokenPermissions(address token,uint256 amount)";

/// `keccak256(utf8("<userId>-<issueId>"))`.
pub fn permit_nonce(user_id: u64, issue_id: u64) -> Word {
    keccak256(format!("{user_id}-{issue_id}"))
}

/// Convert a human amount into base units, truncating excess precision.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<u128> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PermitError::InvalidAmount(format!("{amount} is negative")));
    }

    let truncated = amount.round_dp_with_strategy(decimals, RoundingStrategy::ToZero);
    let mantissa = u128::try_from(truncated.mantissa())
        .map_err(|_| PermitError::InvalidAmount(amount.to_string()))?;
    let shift = decimals - truncated.scale();

    10u128
        .checked_pow(shift)
        .and_then(|factor| mantissa.checked_mul(factor))
        .ok_or_else(|| PermitError::InvalidAmount(format!("{amount} overflows uint256")))
}

/// A signed Permit2 payment for one contributor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAuthorization {
    pub beneficiary: Address,
    /// Amount in token units
    pub amount: Decimal,
    pub token: Address,
    /// Amount in base units, decimal string
    pub base_amount: String,
    /// Decimal string of the nonce word
    pub nonce: String,
    /// Decimal string of the deadline word
    pub deadline: String,
    pub signature: Signature,
    pub network_id: u64,
    /// Payer address (the signing key's account)
    pub owner: Address,
}

impl PaymentAuthorization {
    /// The shape consumed by the claim page and `permitTransferFrom`.
    pub fn transaction_data(&self) -> PermitTransactionData {
        PermitTransactionData {
            permit: PermitData {
                permitted: TokenPermissions {
                    token: self.token,
                    amount: self.base_amount.clone(),
                },
                nonce: self.nonce.clone(),
                deadline: self.deadline.clone(),
            },
            transfer_details: TransferDetails {
                to: self.beneficiary,
                requested_amount: self.base_amount.clone(),
            },
            owner: self.owner,
            signature: self.signature.to_string(),
            network_id: self.network_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitTransactionData {
    pub permit: PermitData,
    pub transfer_details: TransferDetails,
    pub owner: Address,
    pub signature: String,
    pub network_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitData {
    pub permitted: TokenPermissions,
    pub nonce: String,
    pub deadline: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPermissions {
    pub token: Address,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDetails {
    pub to: Address,
    pub requested_amount: String,
}

/// Signs Permit2 transfers of one token on one network.
#[derive(Debug, Clone)]
pub struct Erc20Permit {
    domain: Eip712Domain,
    token: Address,
    decimals: u32,
}

impl Erc20Permit {
    pub fn new(network_id: u64, token: Address, permit2: Address, decimals: u32) -> Self {
        Self {
            domain: Eip712Domain {
                name: "Permit2".to_string(),
                version: None,
                chain_id: network_id,
                verifying_contract: permit2,
            },
            token,
            decimals,
        }
    }

    pub fn network_id(&self) -> u64 {
        self.domain.chain_id
    }

    /// `amount` in this token's base units.
    pub fn base_units(&self, amount: Decimal) -> Result<u128> {
        to_base_units(amount, self.decimals)
    }

    /// EIP-712 digest of a `PermitTransferFrom`.
    pub fn digest(&self, spender: &Address, amount: u128, nonce: &Word, deadline: &Word) -> Word {
        let permitted = StructEncoder::new(TOKEN_PERMISSIONS_TYPE)
            .address(&self.token)
            .word(u128_word(amount))
            .finish();

        let permit = StructEncoder::new(PERMIT_TRANSFER_FROM_TYPE)
            .word(permitted)
            .address(spender)
            .word(*nonce)
            .word(*deadline)
            .finish();

        typed_data_digest(&self.domain, &permit)
    }

    /// Sign a payment of `amount` token units to `beneficiary`.
    pub fn sign(
        &self,
        signer: &EthSigner,
        beneficiary: Address,
        amount: Decimal,
        user_id: u64,
        issue_id: u64,
    ) -> Result<PaymentAuthorization> {
        let base_amount = self.base_units(amount)?;
        if base_amount == 0 {
            return Err(PermitError::InvalidAmount(format!(
                "{amount} is below the token's smallest unit"
            )));
        }
        let nonce = permit_nonce(user_id, issue_id);
        let deadline = MAX_WORD;

        let digest = self.digest(&beneficiary, base_amount, &nonce, &deadline);
        let signature = signer.sign_digest(&digest)?;

        info!(
            user_id,
            issue_id,
            beneficiary = %beneficiary,
            %amount,
            network_id = self.domain.chain_id,
            "Generated Permit2 payment authorization"
        );

        Ok(PaymentAuthorization {
            beneficiary,
            amount,
            token: self.token,
            base_amount: base_amount.to_string(),
            nonce: word_to_decimal(&nonce),
            deadline: word_to_decimal(&deadline),
            signature,
            network_id: self.domain.chain_id,
            owner: signer.address(),
        })
    }
}
