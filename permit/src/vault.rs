//! Encrypted signing-key storage.
//!
//! # Algorithms
//!
//! - **Key Derivation**: Argon2id over the operator passphrase
//! - **Encryption**: ChaCha20-Poly1305 (authenticated encryption)
//!
//! The KDF parameters travel with the ciphertext so material produced with
//! different settings stays decryptable. Decrypted keys exist only inside
//! [`KeyVault::with_key`] and are zeroized when it returns.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{PermitError, Result};
use crate::signer::EthSigner;

// =============================================================================
// Constants
// =============================================================================

/// Salt length for key derivation (16 bytes)
pub const SALT_LEN: usize = 16;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// secp256k1 private key length (32 bytes)
pub const PRIVATE_KEY_LEN: usize = 32;

// =============================================================================
// Key material
// =============================================================================

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// 64 MB, 3 iterations, 4 lanes.
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// A signing key encrypted under a passphrase, base64 fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKeyMaterial {
    pub ciphertext: String,
    pub nonce: String,
    pub salt: String,
    #[serde(default)]
    pub kdf: KdfParams,
}

/// Parse a hex private key (with or without `0x`).
pub fn parse_private_key(hex_key: &str) -> Result<Zeroizing<[u8; PRIVATE_KEY_LEN]>> {
    let digits = hex_key.trim().trim_start_matches("0x");
    let mut key = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
    hex::decode_to_slice(digits, &mut key[..])
        .map_err(|_| PermitError::InvalidKey("expected 32 hex-encoded bytes".into()))?;
    Ok(key)
}

/// Encrypt a private key for storage in configuration.
pub fn encrypt_signing_key(
    private_key: &[u8; PRIVATE_KEY_LEN],
    passphrase: &[u8],
    kdf: KdfParams,
) -> Result<EncryptedKeyMaterial> {
    // Refuse to store something that can never sign.
    EthSigner::from_bytes(private_key)?;

    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce);

    let kek = derive_key_encryption_key(passphrase, &salt, &kdf)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&kek[..]));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), private_key.as_slice())
        .map_err(|e| PermitError::Encryption(e.to_string()))?;

    Ok(EncryptedKeyMaterial {
        ciphertext: BASE64.encode(ciphertext),
        nonce: BASE64.encode(nonce),
        salt: BASE64.encode(salt),
        kdf,
    })
}

fn derive_key_encryption_key(
    passphrase: &[u8],
    salt: &[u8],
    kdf: &KdfParams,
) -> Result<Zeroizing<[u8; 32]>> {
    let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(32))
        .map_err(|e| PermitError::KeyDerivation(format!("invalid Argon2 params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(passphrase, salt, &mut key[..])
        .map_err(|e| PermitError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| PermitError::InvalidKey(format!("{name}: {e}")))
}

// =============================================================================
// Vault
// =============================================================================

/// Holds encrypted key material and the passphrase that unlocks it.
pub struct KeyVault {
    material: EncryptedKeyMaterial,
    passphrase: Zeroizing<Vec<u8>>,
}

impl KeyVault {
    pub fn new(material: EncryptedKeyMaterial, passphrase: impl Into<Vec<u8>>) -> Self {
        Self {
            material,
            passphrase: Zeroizing::new(passphrase.into()),
        }
    }

    /// Decrypt the key, hand a signer to `f`, then wipe the plaintext.
    pub fn with_key<T>(&self, f: impl FnOnce(&EthSigner) -> Result<T>) -> Result<T> {
        let salt = decode_field("salt", &self.material.salt)?;
        let nonce = decode_field("nonce", &self.material.nonce)?;
        let ciphertext = decode_field("ciphertext", &self.material.ciphertext)?;
        if nonce.len() != NONCE_LEN {
            return Err(PermitError::InvalidKey(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                nonce.len()
            )));
        }

        let kek = derive_key_encryption_key(&self.passphrase, &salt, &self.material.kdf)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&kek[..]));
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
                .map_err(|_| PermitError::Decryption)?,
        );

        if plaintext.len() != PRIVATE_KEY_LEN {
            return Err(PermitError::InvalidKey(format!(
                "expected {PRIVATE_KEY_LEN} bytes, got {}",
                plaintext.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        key.copy_from_slice(&plaintext);

        let signer = EthSigner::from_bytes(&key)?;
        f(&signer)
    }

    /// Address of the stored key.
    pub fn address(&self) -> Result<crate::eip712::Address> {
        self.with_key(|signer| Ok(signer.address()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Cheap parameters so tests stay fast.
    const TEST_KDF: KdfParams = KdfParams {
        memory_kib: 256,
        iterations: 1,
        parallelism: 1,
    };

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_roundtrip_unlocks_same_address() {
        let key = parse_private_key(KEY_ONE).unwrap();
        let material = encrypt_signing_key(&key, b"correct horse", TEST_KDF).unwrap();

        let vault = KeyVault::new(material, b"correct horse".to_vec());
        assert_eq!(
            vault.address().unwrap().to_checksum(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let key = parse_private_key(KEY_ONE).unwrap();
        let material = encrypt_signing_key(&key, b"correct horse", TEST_KDF).unwrap();

        let vault = KeyVault::new(material, b"battery staple".to_vec());
        assert!(matches!(vault.address(), Err(PermitError::Decryption)));
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_encryption() {
        let key = parse_private_key(KEY_ONE).unwrap();
        let a = encrypt_signing_key(&key, b"pw", TEST_KDF).unwrap();
        let b = encrypt_signing_key(&key, b"pw", TEST_KDF).unwrap();

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_invalid_hex_key_rejected() {
        assert!(parse_private_key("0x1234").is_err());
        assert!(encrypt_signing_key(&[0u8; 32], b"pw", TEST_KDF).is_err());
    }

    #[test]
    fn test_material_yaml_shape() {
        let key = parse_private_key(KEY_ONE).unwrap();
        let material = encrypt_signing_key(&key, b"pw", TEST_KDF).unwrap();
        let json = serde_json::to_value(&material).unwrap();

        assert!(json["ciphertext"].is_string());
        assert_eq!(json["kdf"]["memory_kib"], 256);
    }
}
