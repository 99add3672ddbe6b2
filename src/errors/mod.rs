//! # Error Handling
//!
//! Error types for the vaultmesh broker using `thiserror`.
//!
//! Validation and uniqueness failures are raised before any backend is
//! touched; backend failures during a multi-backend fan-out propagate
//! without retry or rollback (see DESIGN.md for the durability gap this
//! leaves open).

/// Custom result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Main error type for the vaultmesh broker.
#[derive(thiserror::Error, Debug)]
pub enum BrokerError {
    /// The presented bearer token failed the all-backends validity check.
    #[error("Unknown credential: token was rejected by at least one backend")]
    UnknownCredential,

    /// A consistent read found disagreeing payloads across backends.
    #[error("Inconsistent replicas: backend '{backend}' disagrees with the baseline payload")]
    InconsistentReplicas { backend: String },

    /// A backend call failed at the transport level.
    #[error("Backend unavailable: {backend}")]
    BackendUnavailable {
        backend: String,
        #[source]
        source: reqwest::Error,
    },

    /// A backend answered with an unexpected HTTP status or body.
    #[error("Backend rejected request: {backend} returned {status}: {context}")]
    BackendRejected { backend: String, status: u16, context: String },

    /// A secret payload failed schema/rule checks.
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// Key generation was requested for a type outside {ecdh, ecdsa, rsa, aes}.
    #[error("Unsupported key type: '{requested}'")]
    UnsupportedKeyType { requested: String },

    /// Key generation was requested with a bit length outside the supported set.
    #[error("Invalid key length: {bits} bits is not supported for {key_type} keys")]
    InvalidKeyLength { key_type: String, bits: u32 },

    /// AES key generation was requested with an unknown cipher mode.
    #[error("Invalid cipher mode: '{mode}'")]
    InvalidCipherMode { mode: String },

    /// Key insertion collided with an id already present in the payload.
    #[error("Duplicate key id: '{id}' already exists in the payload")]
    DuplicateKeyId { id: String },

    /// Configuration errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BrokerError {
    /// Create a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation { reason: reason.into() }
    }

    /// Create an inconsistent-replicas error naming the disagreeing backend.
    pub fn inconsistent(backend: impl Into<String>) -> Self {
        Self::InconsistentReplicas { backend: backend.into() }
    }

    /// Create a backend-unavailable error from a transport failure.
    pub fn unavailable(backend: impl Into<String>, source: reqwest::Error) -> Self {
        Self::BackendUnavailable { backend: backend.into(), source }
    }

    /// Create a backend-rejected error.
    pub fn rejected(backend: impl Into<String>, status: u16, context: impl Into<String>) -> Self {
        Self::BackendRejected { backend: backend.into(), status, context: context.into() }
    }

    /// Create a duplicate-key-id error.
    pub fn duplicate_key_id(id: impl Into<String>) -> Self {
        Self::DuplicateKeyId { id: id.into() }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// HTTP status code a transport layer should map this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            BrokerError::UnknownCredential => 401,
            BrokerError::InconsistentReplicas { .. } => 500,
            BrokerError::BackendUnavailable { .. } => 502,
            BrokerError::BackendRejected { .. } => 502,
            BrokerError::Validation { .. } => 400,
            BrokerError::UnsupportedKeyType { .. } => 400,
            BrokerError::InvalidKeyLength { .. } => 400,
            BrokerError::InvalidCipherMode { .. } => 400,
            BrokerError::DuplicateKeyId { .. } => 409,
            BrokerError::Config { .. } => 500,
            BrokerError::Serialization(_) => 400,
            BrokerError::Io(_) => 500,
            BrokerError::Internal { .. } => 500,
        }
    }
}

impl From<validator::ValidationErrors> for BrokerError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let reasons: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, reasons.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::config(format!("Configuration validation failed: {}", message))
    }
}
