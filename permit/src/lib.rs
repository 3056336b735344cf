//! Permit - signed payout authorizations
//!
//! Turns a contributor's reward into something they can redeem on chain:
//! - Encrypted signing keys (Argon2id + ChaCha20-Poly1305), unlocked per call
//! - EIP-712 hashing and secp256k1 signing
//! - ERC-20 payments through Permit2 `PermitTransferFrom`
//! - ERC-721 reward mint requests
//! - JSON-RPC endpoint selection with bounded retry
//!
//! Nonces are derived from `(user id, issue id)`, so signing the same reward
//! twice produces the same permit and only one can ever be redeemed.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐
//! │ Erc20Permit  │    │ Erc721Permit │
//! └──────┬───────┘    └──────┬───────┘
//!        └─────────┬─────────┘
//!                  ▼
//!        ┌──────────────────┐     ┌─────────────────┐
//!        │ eip712 + signer  │◄────│ KeyVault        │
//!        └──────────────────┘     │ (encrypted key) │
//!                                 └─────────────────┘
//! ```

pub mod eip712;
pub mod erc20;
pub mod erc721;
pub mod error;
pub mod provider;
pub mod retry;
pub mod signer;
pub mod vault;

pub use eip712::{keccak256, Address, Eip712Domain, Word, MAX_WORD};
pub use erc20::{
    permit_nonce, to_base_units, Erc20Permit, PaymentAuthorization, PermitTransactionData,
    PERMIT2_ADDRESS,
};
pub use erc721::{Erc721Permit, NftMetadata, NftMintAuthorization, METADATA_KEYS};
pub use error::{PermitError, Result};
pub use provider::{
    ChainProvider, JsonRpcProvider, ProviderFactory, RpcEndpoints, StaticProvider,
    StaticProviderFactory,
};
pub use retry::RetryPolicy;
pub use signer::{EthSigner, Signature};
pub use vault::{encrypt_signing_key, parse_private_key, EncryptedKeyMaterial, KdfParams, KeyVault};
