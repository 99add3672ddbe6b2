//! Core data model for the broker: the mirrored secret document, the key
//! records stored inside it, and the redacting wrapper for backend root
//! credentials.

pub mod payload;
pub mod secret;

pub use payload::{
    unix_now, CipherMode, KeyRecord, KeyType, SecretPayload, AES_KEY_BITS, DEFAULT_RSA_BITS,
    RSA_KEY_BITS,
};
pub use secret::RootCredential;
