//! Settings for a payout run.
//!
//! One explicitly constructed object carries everything the pipeline needs.
//! Secrets are not part of it: the LLM API key and the key passphrases are
//! supplied separately by the caller.

use permit::{Address, EncryptedKeyMaterial, RetryPolicy, PERMIT2_ADDRESS};
use relevance_agent::SamplerConfig;
use contribution::ScoringPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Complete payout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoutSettings {
    /// ERC-20 payments
    pub payments: PaymentSettings,
    /// ERC-721 reward badges
    pub nft: NftSettings,
    /// Relevance sampling
    pub relevance: SamplerConfig,
    /// Rubric and combination policy
    pub scoring: ScoringPolicy,
    /// Retry for chain access and signing
    pub retry: RetryPolicy,
    /// Per-request JSON-RPC timeout (seconds)
    pub rpc_timeout_secs: u64,
    /// Claim page the summary links to
    pub claim_base_url: String,
}

impl Default for PayoutSettings {
    fn default() -> Self {
        Self {
            payments: PaymentSettings::default(),
            nft: NftSettings::default(),
            relevance: SamplerConfig::default(),
            scoring: ScoringPolicy::default(),
            retry: RetryPolicy::default(),
            rpc_timeout_secs: 10,
            claim_base_url: String::new(),
        }
    }
}

impl PayoutSettings {
    /// Load settings from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    /// Reject settings that could only produce wrong payouts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring
            .validate()
            .map_err(|e| ConfigError::invalid("scoring", e))?;
        self.relevance
            .validate()
            .map_err(|e| ConfigError::invalid("relevance", e))?;

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be positive"));
        }
        if self.rpc_timeout_secs == 0 {
            return Err(ConfigError::invalid("rpc_timeout_secs", "must be positive"));
        }

        self.payments.token_address()?;
        self.payments.permit2_address()?;
        if self.payments.token_decimals > 38 {
            return Err(ConfigError::invalid(
                "payments.token_decimals",
                "amounts above 38 decimals cannot be represented",
            ));
        }

        if self.nft.enabled {
            self.nft.contract_address()?;
        }
        Ok(())
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address, ConfigError> {
    value.parse().map_err(|e| ConfigError::invalid(field, e))
}

/// Where and in what the contributors get paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSettings {
    /// EVM chain id
    pub network_id: u64,
    /// ERC-20 payment token
    pub token: String,
    /// Permit2 deployment
    pub permit2: String,
    /// Token decimals
    pub token_decimals: u32,
    /// JSON-RPC endpoints, tried in order
    pub rpc_urls: Vec<String>,
    /// Encrypted payer key; no payments are signed without it
    pub signing_key: Option<EncryptedKeyMaterial>,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            network_id: 100,
            // WXDAI on Gnosis
            token: "0xe91D153E0b41518A2Ce8Dd3D7944Fa863463a97d".to_string(),
            permit2: PERMIT2_ADDRESS.to_string(),
            token_decimals: 18,
            rpc_urls: vec!["https://rpc.gnosischain.com".to_string()],
            signing_key: None,
        }
    }
}

impl PaymentSettings {
    pub fn token_address(&self) -> Result<Address, ConfigError> {
        parse_address("payments.token", &self.token)
    }

    pub fn permit2_address(&self) -> Result<Address, ConfigError> {
        parse_address("payments.permit2", &self.permit2)
    }
}

/// Reward badge minting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NftSettings {
    pub enabled: bool,
    /// Reward contract
    pub contract: String,
    pub network_id: u64,
    pub rpc_urls: Vec<String>,
    /// Encrypted minter key
    pub minter_key: Option<EncryptedKeyMaterial>,
}

impl Default for NftSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            contract: "0x6a87f05a74AB2EC25D1Eea0a3Cd24C3A2eCfF3E0".to_string(),
            network_id: 100,
            rpc_urls: vec!["https://rpc.gnosischain.com".to_string()],
            minter_key: None,
        }
    }
}

impl NftSettings {
    pub fn contract_address(&self) -> Result<Address, ConfigError> {
        parse_address("nft.contract", &self.contract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contribution::ScoreCombination;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_are_valid() {
        let settings = PayoutSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.payments.network_id, 100);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.relevance.batch_size, 10);
        assert_eq!(settings.rpc_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
payments:
  network_id: 1
  rpc_urls: ["https://eth.example"]
scoring:
  combination:
    kind: weighted_sum
    rubric_weight: 0.5
    relevance_weight: 0.5
claim_base_url: https://pay.example
"#;
        let settings = PayoutSettings::from_yaml(yaml).unwrap();

        assert_eq!(settings.payments.network_id, 1);
        assert_eq!(settings.payments.token_decimals, 18);
        assert_eq!(
            settings.scoring.combination,
            ScoreCombination::WeightedSum {
                rubric_weight: dec!(0.5),
                relevance_weight: dec!(0.5)
            }
        );
        assert_eq!(settings.relevance.max_attempts, 10);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let settings = PayoutSettings::default();
        let yaml = settings.to_yaml().unwrap();
        let back = PayoutSettings::from_yaml(&yaml).unwrap();
        assert_eq!(back.payments.token, settings.payments.token);
        assert_eq!(back.relevance, settings.relevance);
    }

    #[test]
    fn test_malformed_token_rejected() {
        let mut settings = PayoutSettings::default();
        settings.payments.token = "0xnot-an-address".into();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "payments.token"
        ));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut settings = PayoutSettings::default();
        settings.relevance.batch_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_unbounded_timeouts_rejected() {
        let mut settings = PayoutSettings::default();
        settings.rpc_timeout_secs = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "rpc_timeout_secs"
        ));

        let mut settings = PayoutSettings::default();
        settings.relevance.request_timeout_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_negative_rubric_value_rejected() {
        let mut settings = PayoutSettings::default();
        settings.scoring.default_multipliers.word_value = dec!(-0.1);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_nft_contract_checked_only_when_enabled() {
        let mut settings = PayoutSettings::default();
        settings.nft.contract = "nope".into();
        assert!(settings.validate().is_ok());

        settings.nft.enabled = true;
        assert!(settings.validate().is_err());
    }
}
