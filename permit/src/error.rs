//! Permit signing errors.

/// Error types for key handling, hashing, signing and chain access.
#[derive(Debug, thiserror::Error)]
pub enum PermitError {
    /// Malformed hex address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Amount cannot be represented on chain
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Key material is malformed or the key is not a valid secp256k1 scalar
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Passphrase-based key derivation failed
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Ciphertext did not authenticate
    #[error("Failed to decrypt signing key (wrong passphrase?)")]
    Decryption,

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// ECDSA signing or recovery failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// JSON-RPC transport or protocol error
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Endpoint did not answer within the request timeout
    #[error("RPC request to {0} timed out")]
    RpcTimeout(String),

    /// Endpoint reports a different chain than configured
    #[error("Network mismatch: expected chain {expected}, endpoint reports {actual}")]
    NetworkMismatch { expected: u64, actual: u64 },

    /// No configured endpoint answered for the network
    #[error("No working RPC endpoint for network {0}")]
    NoEndpoint(u64),
}

impl PermitError {
    /// Whether trying again could succeed. Key, amount and signing failures
    /// repeat identically.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PermitError::Rpc(_) | PermitError::RpcTimeout(_) | PermitError::NoEndpoint(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PermitError>;
