//! Secret-payload schema validation.
//!
//! The schema check is case-insensitive over field names: producers have
//! historically emitted both `publicKey` and `publickey` spellings, so the
//! validator walks a recursively lower-cased copy of the candidate tree.
//! The copy exists for validation only; the payload that gets persisted is
//! the caller's original, byte for byte.
//!
//! Validation is fail-fast: the first violation found is returned and no
//! error aggregation is attempted.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::str::FromStr;

use crate::domain::{CipherMode, KeyType, AES_KEY_BITS, RSA_KEY_BITS};
use crate::errors::{BrokerError, Result};

/// Freshness window for payload timestamps, symmetric past/future. A
/// timestamp exactly at the boundary is accepted.
pub const FRESHNESS_WINDOW_SECS: i64 = 300;

/// Ceiling on the encoded size of one RSA key field. Anything larger than a
/// real 4096-bit PEM is abuse, not key material.
pub const MAX_RSA_MATERIAL_BYTES: usize = 16 * 1024;

/// Recursively lowercase every object key in a JSON tree.
///
/// Returns a new tree; the input is never mutated. Arrays are walked so
/// objects nested inside them are normalized too. Values (including string
/// values) are left untouched.
pub fn normalize_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut normalized = Map::with_capacity(map.len());
            for (key, inner) in map {
                normalized.insert(key.to_lowercase(), normalize_keys(inner));
            }
            Value::Object(normalized)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_keys).collect()),
        other => other.clone(),
    }
}

/// Validate a candidate secret payload against the schema.
///
/// `now` is the current unix time; the payload's `timestamp` must lie
/// within [`FRESHNESS_WINDOW_SECS`] of it in either direction.
pub fn validate(candidate: &Value, now: i64) -> Result<()> {
    if candidate.is_null() {
        return Err(BrokerError::validation("payload is required"));
    }

    let normalized = normalize_keys(candidate);
    let document = normalized
        .as_object()
        .ok_or_else(|| BrokerError::validation("payload must be a JSON object"))?;

    let keys = document
        .get("keys")
        .ok_or_else(|| BrokerError::validation("payload is missing the 'keys' field"))?
        .as_array()
        .ok_or_else(|| BrokerError::validation("'keys' must be an array"))?;

    let timestamp = document
        .get("timestamp")
        .ok_or_else(|| BrokerError::validation("payload is missing the 'timestamp' field"))?;
    let timestamp = timestamp
        .as_i64()
        .or_else(|| timestamp.as_f64().map(|f| f as i64))
        .ok_or_else(|| BrokerError::validation("'timestamp' must be numeric"))?;

    if (now - timestamp).abs() > FRESHNESS_WINDOW_SECS {
        return Err(BrokerError::validation(format!(
            "timestamp {} is outside the {}s freshness window",
            timestamp, FRESHNESS_WINDOW_SECS
        )));
    }

    let mut seen_ids: HashSet<&str> = HashSet::with_capacity(keys.len());
    for entry in keys {
        validate_key_entry(entry, &mut seen_ids)?;
    }

    Ok(())
}

fn validate_key_entry<'a>(entry: &'a Value, seen_ids: &mut HashSet<&'a str>) -> Result<()> {
    let key = entry
        .as_object()
        .ok_or_else(|| BrokerError::validation("each key entry must be an object"))?;

    let id = key
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BrokerError::validation("each key entry requires a non-empty 'id'"))?;

    if !seen_ids.insert(id) {
        return Err(BrokerError::duplicate_key_id(id));
    }

    let type_name = key
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            BrokerError::validation(format!("key '{}' requires a non-empty 'type'", id))
        })?;

    match KeyType::from_str(type_name)? {
        KeyType::Ecdh | KeyType::Ecdsa => {
            let has_curve =
                key.get("curve").and_then(Value::as_str).is_some_and(|c| !c.is_empty());
            if !has_curve {
                return Err(BrokerError::validation(format!(
                    "key '{}' of type {} requires a non-empty 'curve'",
                    id, type_name
                )));
            }
        }
        KeyType::Rsa => {
            let bits = required_length(key, id)?;
            if !RSA_KEY_BITS.contains(&bits) {
                return Err(BrokerError::InvalidKeyLength { key_type: "rsa".to_string(), bits });
            }
            for field in ["publickey", "privatekey"] {
                if let Some(material) = key.get(field).and_then(Value::as_str) {
                    if material.len() > MAX_RSA_MATERIAL_BYTES {
                        return Err(BrokerError::validation(format!(
                            "key '{}' has oversized {} material ({} bytes)",
                            id,
                            field,
                            material.len()
                        )));
                    }
                }
            }
        }
        KeyType::Aes => {
            let bits = required_length(key, id)?;
            if !AES_KEY_BITS.contains(&bits) {
                return Err(BrokerError::InvalidKeyLength { key_type: "aes".to_string(), bits });
            }
            let mode = key.get("ciphertype").and_then(Value::as_str).ok_or_else(|| {
                BrokerError::validation(format!("aes key '{}' requires a 'cipherType'", id))
            })?;
            CipherMode::from_str(mode)?;
        }
    }

    Ok(())
}

fn required_length(key: &Map<String, Value>, id: &str) -> Result<u32> {
    key.get("length")
        .and_then(Value::as_u64)
        .map(|bits| bits as u32)
        .ok_or_else(|| BrokerError::validation(format!("key '{}' requires a numeric 'length'", id)))
}
