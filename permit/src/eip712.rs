//! EIP-712 typed-data hashing.
//!
//! Only the pieces the permit types need: 32-byte words, checksummed
//! addresses, domain separators and a struct encoder over static fields,
//! strings and dynamic arrays.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

use crate::error::{PermitError, Result};

/// A 256-bit big-endian word.
pub type Word = [u8; 32];

/// `2^256 - 1`.
pub const MAX_WORD: Word = [0xff; 32];

/// Keccak-256 of `data`.
pub fn keccak256(data: impl AsRef<[u8]>) -> Word {
    let mut word = [0u8; 32];
    word.copy_from_slice(&Keccak256::digest(data.as_ref()));
    word
}

pub fn u64_word(value: u64) -> Word {
    u128_word(u128::from(value))
}

pub fn u128_word(value: u128) -> Word {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Decimal representation of an unsigned word.
pub fn word_to_decimal(word: &Word) -> String {
    let mut n = *word;
    let mut digits = Vec::new();

    while n.iter().any(|b| *b != 0) {
        let mut rem = 0u32;
        for byte in n.iter_mut() {
            let acc = (rem << 8) | u32::from(*byte);
            *byte = (acc / 10) as u8;
            rem = acc % 10;
        }
        digits.push(b'0' + rem as u8);
    }

    if digits.is_empty() {
        return "0".to_string();
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// `0x`-prefixed lowercase hex of a word.
pub fn word_to_hex(word: &Word) -> String {
    format!("0x{}", hex::encode(word))
}

/// A 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Address of an uncompressed public key given without its `0x04` prefix.
    pub fn from_public_key(xy: &[u8]) -> Self {
        let hash = keccak256(xy);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash[12..]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Left-padded ABI word.
    pub fn as_word(&self) -> Word {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    /// EIP-55 mixed-case checksum encoding.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = PermitError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.len() != 40 {
            return Err(PermitError::InvalidAddress(s.to_string()));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| PermitError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The EIP-712 domain. `version` is omitted from the type when `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Domain {
    pub name: String,
    pub version: Option<String>,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    fn type_string(&self) -> &'static str {
        if self.version.is_some() {
            "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)"
        } else {
            "EIP712Domain(string name,uint256 chainId,address verifyingContract)"
        }
    }

    pub fn separator(&self) -> Word {
        let mut encoder = StructEncoder::new(self.type_string()).string(&self.name);
        if let Some(version) = &self.version {
            encoder = encoder.string(version);
        }
        encoder
            .word(u64_word(self.chain_id))
            .address(&self.verifying_contract)
            .finish()
    }
}

/// The digest that gets signed: `keccak256(0x1901 ‖ domainSeparator ‖ structHash)`.
pub fn typed_data_digest(domain: &Eip712Domain, struct_hash: &Word) -> Word {
    let mut data = Vec::with_capacity(66);
    data.extend_from_slice(&[0x19, 0x01]);
    data.extend_from_slice(&domain.separator());
    data.extend_from_slice(struct_hash);
    keccak256(data)
}

/// Builds `hashStruct(s) = keccak256(typeHash ‖ encodeData(s))`.
pub struct StructEncoder {
    buf: Vec<u8>,
}

impl StructEncoder {
    /// Start encoding a struct whose full type string (including referenced
    /// types, sorted) is `type_string`.
    pub fn new(type_string: &str) -> Self {
        let mut buf = Vec::with_capacity(32 * 6);
        buf.extend_from_slice(&keccak256(type_string));
        Self { buf }
    }

    pub fn word(mut self, word: Word) -> Self {
        self.buf.extend_from_slice(&word);
        self
    }

    pub fn address(self, address: &Address) -> Self {
        self.word(address.as_word())
    }

    pub fn string(self, value: &str) -> Self {
        self.word(keccak256(value))
    }

    /// `bytes32[]`: hash of the concatenated elements.
    pub fn words(self, values: &[Word]) -> Self {
        self.word(keccak256(values.concat()))
    }

    /// `string[]`: hash of the concatenated element hashes.
    pub fn strings<S: AsRef<str>>(self, values: &[S]) -> Self {
        let hashes: Vec<Word> = values.iter().map(|v| keccak256(v.as_ref())).collect();
        self.word(keccak256(hashes.concat()))
    }

    pub fn finish(self) -> Word {
        keccak256(self.buf)
    }
}
