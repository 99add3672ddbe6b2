//! The mirrored secret document and the key records stored inside it.
//!
//! The payload is stored byte-for-byte identically on every backend:
//! `{"keys": [...], "timestamp": <unix seconds>}`. Key records serialize
//! with the exact wire names consumers already depend on (`publicKey`,
//! `privateKey`, `cipherType`); every field is always present, with empty
//! strings for the fields that do not apply to a given key type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::BrokerError;

/// Supported AES key lengths in bits.
pub const AES_KEY_BITS: [u32; 3] = [128, 192, 256];

/// Supported RSA modulus lengths in bits.
pub const RSA_KEY_BITS: [u32; 4] = [1024, 2048, 3072, 4096];

/// RSA modulus length used when the caller does not specify one.
pub const DEFAULT_RSA_BITS: u32 = 2048;

/// Current wall-clock time as unix seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Kind of key material a [`KeyRecord`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Diffie-Hellman key pair over Curve25519.
    Ecdh,
    /// Edwards-curve signature key pair over Curve25519.
    Ecdsa,
    /// RSA key pair, PEM-encoded.
    Rsa,
    /// Symmetric AES key.
    Aes,
}

impl FromStr for KeyType {
    type Err = BrokerError;

    /// Case-insensitive: the wire carries both `"ecdh"` and `"RSA"` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ecdh" => Ok(KeyType::Ecdh),
            "ecdsa" => Ok(KeyType::Ecdsa),
            "rsa" => Ok(KeyType::Rsa),
            "aes" => Ok(KeyType::Aes),
            _ => Err(BrokerError::UnsupportedKeyType { requested: s.to_string() }),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Ecdh => write!(f, "ecdh"),
            KeyType::Ecdsa => write!(f, "ecdsa"),
            KeyType::Rsa => write!(f, "rsa"),
            KeyType::Aes => write!(f, "aes"),
        }
    }
}

/// Block cipher mode recorded on AES keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CipherMode {
    Gcm,
    Ecb,
    Cbc,
    Cfb,
    Ofb,
    Ctr,
}

impl FromStr for CipherMode {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GCM" => Ok(CipherMode::Gcm),
            "ECB" => Ok(CipherMode::Ecb),
            "CBC" => Ok(CipherMode::Cbc),
            "CFB" => Ok(CipherMode::Cfb),
            "OFB" => Ok(CipherMode::Ofb),
            "CTR" => Ok(CipherMode::Ctr),
            _ => Err(BrokerError::InvalidCipherMode { mode: s.to_string() }),
        }
    }
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherMode::Gcm => write!(f, "GCM"),
            CipherMode::Ecb => write!(f, "ECB"),
            CipherMode::Cbc => write!(f, "CBC"),
            CipherMode::Cfb => write!(f, "CFB"),
            CipherMode::Ofb => write!(f, "OFB"),
            CipherMode::Ctr => write!(f, "CTR"),
        }
    }
}

/// One generated cryptographic key (pair or symmetric) with its metadata.
///
/// Created by the key generator, appended into a [`SecretPayload`] by the
/// credential manager; its lifetime is bound to the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Caller-chosen name, unique within the payload.
    pub id: String,

    #[serde(rename = "type")]
    pub key_type: KeyType,

    /// Base64 raw bytes for curve keys, PEM for RSA, empty for AES.
    #[serde(rename = "publicKey")]
    pub public_key: String,

    /// Base64 raw bytes for curve/AES keys, PEM for RSA.
    #[serde(rename = "privateKey")]
    pub private_key: String,

    /// Key size in bits.
    pub length: u32,

    /// `"Curve25519"` for ecdh/ecdsa keys, empty otherwise.
    pub curve: String,

    /// Cipher mode name for AES keys, empty otherwise.
    #[serde(rename = "cipherType")]
    pub cipher_type: String,
}

/// The logical document mirrored across all backends under one token.
///
/// `timestamp` records when the payload (and therefore its token) was last
/// rotated or created, and drives the staleness decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretPayload {
    pub keys: Vec<KeyRecord>,
    pub timestamp: i64,
}

impl SecretPayload {
    /// Fresh payload with no keys, stamped at `now`.
    pub fn empty(now: i64) -> Self {
        Self { keys: Vec::new(), timestamp: now }
    }
}
