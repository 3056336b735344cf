//! secp256k1 signing of EIP-712 digests.

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::eip712::{Address, Word};
use crate::error::{PermitError, Result};

/// Signs digests with a secp256k1 key.
///
/// The wrapped key is zeroized on drop.
pub struct EthSigner {
    key: SigningKey,
}

impl EthSigner {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let key = SigningKey::from_slice(bytes)
            .map_err(|_| PermitError::InvalidKey("not a valid secp256k1 scalar".into()))?;
        Ok(Self { key })
    }

    /// Account address of the key.
    pub fn address(&self) -> Address {
        address_of(self.key.verifying_key())
    }

    /// Sign a 32-byte digest, returning `r ‖ s ‖ v` with `v ∈ {27, 28}`.
    pub fn sign_digest(&self, digest: &Word) -> Result<Signature> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest)
            .map_err(|e| PermitError::Signing(e.to_string()))?;

        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = 27 + recovery_id.to_byte();
        Ok(Signature(bytes))
    }
}

fn address_of(key: &VerifyingKey) -> Address {
    let point = ToEncodedPoint::to_encoded_point(key.as_affine(), false);
    Address::from_public_key(&point.as_bytes()[1..])
}

/// A 65-byte recoverable signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 65]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    pub fn v(&self) -> u8 {
        self.0[64]
    }

    /// Recover the signing address for `digest`.
    pub fn recover(&self, digest: &Word) -> Result<Address> {
        let signature = EcdsaSignature::from_slice(&self.0[..64])
            .map_err(|e| PermitError::Signing(e.to_string()))?;
        let recovery_id = self
            .v()
            .checked_sub(27)
            .and_then(RecoveryId::from_byte)
            .ok_or_else(|| PermitError::Signing(format!("invalid recovery byte {}", self.v())))?;

        let key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
            .map_err(|e| PermitError::Signing(e.to_string()))?;
        Ok(address_of(&key))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
