//! ERC-721 reward mint requests.
//!
//! A `MintRequest` lets the beneficiary mint a contribution badge whose
//! on-chain metadata is the key/value pairs below.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::eip712::{
    keccak256, typed_data_digest, word_to_decimal, word_to_hex, Address, Eip712Domain,
    StructEncoder, Word, MAX_WORD,
};
use crate::erc20::permit_nonce;
use crate::error::Result;
use crate::signer::{EthSigner, Signature};

pub const SIGNING_DOMAIN_NAME: &str = "NftReward-Domain";
pub const SIGNING_DOMAIN_VERSION: &str = "1";

const MINT_REQUEST_TYPE: &str =
    "MintRequest(address beneficiary,uint256 deadline,bytes32[] keys,uint256 nonce,string[] values)";

/// Metadata keys, in the order the contract stores them.
pub const METADATA_KEYS: [&str; 5] = [
    "GITHUB_ORGANIZATION_NAME",
    "GITHUB_REPOSITORY_NAME",
    "GITHUB_ISSUE_ID",
    "GITHUB_USERNAME",
    "GITHUB_CONTRIBUTION_TYPE",
];

/// What a badge records about one contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftMetadata {
    pub organization: String,
    pub repository: String,
    pub issue_number: u64,
    pub username: String,
    /// Comma-separated contribution kinds
    pub contribution_type: String,
}

impl NftMetadata {
    /// Values aligned with [`METADATA_KEYS`].
    pub fn values(&self) -> [String; 5] {
        [
            self.organization.clone(),
            self.repository.clone(),
            self.issue_number.to_string(),
            self.username.clone(),
            self.contribution_type.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintRequest {
    pub beneficiary: Address,
    pub deadline: String,
    /// `0x`-hex keccak of each metadata key
    pub keys: Vec<String>,
    pub nonce: String,
    pub values: Vec<String>,
}

/// A signed mint request for one contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NftMintAuthorization {
    pub request: MintRequest,
    pub nft_metadata: BTreeMap<String, String>,
    pub nft_address: Address,
    pub network_id: u64,
    pub signature: Signature,
}

/// Signs mint requests for one reward contract.
#[derive(Debug, Clone)]
pub struct Erc721Permit {
    domain: Eip712Domain,
}

impl Erc721Permit {
    pub fn new(network_id: u64, contract: Address) -> Self {
        Self {
            domain: Eip712Domain {
                name: SIGNING_DOMAIN_NAME.to_string(),
                version: Some(SIGNING_DOMAIN_VERSION.to_string()),
                chain_id: network_id,
                verifying_contract: contract,
            },
        }
    }

    pub fn network_id(&self) -> u64 {
        self.domain.chain_id
    }

    fn key_hashes() -> Vec<Word> {
        METADATA_KEYS.iter().map(|key| keccak256(key)).collect()
    }

    pub fn digest(
        &self,
        beneficiary: &Address,
        deadline: &Word,
        nonce: &Word,
        values: &[String],
    ) -> Word {
        let request = StructEncoder::new(MINT_REQUEST_TYPE)
            .address(beneficiary)
            .word(*deadline)
            .words(&Self::key_hashes())
            .word(*nonce)
            .strings(values)
            .finish();

        typed_data_digest(&self.domain, &request)
    }

    pub fn sign(
        &self,
        signer: &EthSigner,
        beneficiary: Address,
        metadata: &NftMetadata,
        user_id: u64,
        issue_id: u64,
    ) -> Result<NftMintAuthorization> {
        let values = metadata.values();
        let nonce = permit_nonce(user_id, issue_id);
        let deadline = MAX_WORD;

        let digest = self.digest(&beneficiary, &deadline, &nonce, &values);
        let signature = signer.sign_digest(&digest)?;

        let nft_metadata = METADATA_KEYS
            .iter()
            .zip(values.iter())
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();

        info!(
            user_id,
            issue_id,
            beneficiary = %beneficiary,
            contribution_type = %metadata.contribution_type,
            "Generated ERC-721 mint authorization"
        );

        Ok(NftMintAuthorization {
            request: MintRequest {
                beneficiary,
                deadline: word_to_decimal(&deadline),
                keys: Self::key_hashes().iter().map(word_to_hex).collect(),
                nonce: word_to_decimal(&nonce),
                values: values.to_vec(),
            },
            nft_metadata,
            nft_address: self.domain.verifying_contract,
            network_id: self.domain.chain_id,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "0x6a87f05a74AB2EC25D1Eea0a3Cd24C3A2eCfF3E0";

    fn signer() -> EthSigner {
        let mut key = [0u8; 32];
        key[31] = 2;
        EthSigner::from_bytes(&key).unwrap()
    }

    fn metadata() -> NftMetadata {
        NftMetadata {
            organization: "acme".into(),
            repository: "widgets".into(),
            issue_number: 17,
            username: "alice".into(),
            contribution_type: "assignee,comment".into(),
        }
    }

    #[test]
    fn test_mint_request_recovers_to_minter() {
        let permit = Erc721Permit::new(100, CONTRACT.parse().unwrap());
        let beneficiary = signer().address();
        let auth = permit
            .sign(&signer(), beneficiary, &metadata(), 3, 900)
            .unwrap();

        let digest = permit.digest(
            &beneficiary,
            &MAX_WORD,
            &permit_nonce(3, 900),
            &metadata().values(),
        );
        assert_eq!(auth.signature.recover(&digest).unwrap(), signer().address());
        assert_eq!(auth.network_id, 100);
    }

    #[test]
    fn test_metadata_map_matches_values() {
        let permit = Erc721Permit::new(100, CONTRACT.parse().unwrap());
        let auth = permit
            .sign(&signer(), signer().address(), &metadata(), 3, 900)
            .unwrap();

        assert_eq!(auth.nft_metadata["GITHUB_ISSUE_ID"], "17");
        assert_eq!(auth.nft_metadata["GITHUB_USERNAME"], "alice");
        assert_eq!(auth.request.keys.len(), 5);
        assert_eq!(auth.request.keys[0], word_to_hex(&keccak256("GITHUB_ORGANIZATION_NAME")));
    }

    #[test]
    fn test_serialized_shape() {
        let permit = Erc721Permit::new(100, CONTRACT.parse().unwrap());
        let auth = permit
            .sign(&signer(), signer().address(), &metadata(), 3, 900)
            .unwrap();
        let json = serde_json::to_value(&auth).unwrap();

        assert!(json["nftMetadata"].is_object());
        assert!(json["nftAddress"].is_string());
        assert_eq!(json["request"]["values"][1], "widgets");
        assert!(json["signature"].as_str().unwrap().starts_with("0x"));
    }

    #[test]
    fn test_different_contributions_have_different_nonces() {
        let permit = Erc721Permit::new(100, CONTRACT.parse().unwrap());
        let a = permit.sign(&signer(), signer().address(), &metadata(), 3, 900).unwrap();
        let b = permit.sign(&signer(), signer().address(), &metadata(), 4, 900).unwrap();
        assert_ne!(a.request.nonce, b.request.nonce);
    }
}
