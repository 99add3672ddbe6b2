//! # vaultmesh
//!
//! vaultmesh is a broker that sits in front of N independently-operated
//! secret-store backends and presents callers with a single logical secret
//! store addressed by one opaque bearer credential. Every write is mirrored
//! to all backends, reads only ever return a value that is identical across
//! all of them, and the caller-visible credential is transparently rotated
//! on a time basis while the underlying payload is preserved and the old
//! credential atomically retired.
//!
//! ## Architecture
//!
//! ```text
//! caller ──▶ CredentialManager ──▶ ConsistencyCoordinator ──▶ Backend 1..N
//!              validate / rotate       fan-out, join,
//!              credential              read-equality check
//! ```
//!
//! The HTTP server fronting the broker, TLS provisioning and process
//! wiring are external collaborators; this crate is the broker itself.
//! The broker owns no persistent state: everything lives in the backend
//! replicas, and every request re-fetches from all of them.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use vaultmesh::{AppConfig, CredentialManager};
//!
//! # async fn run() -> vaultmesh::Result<()> {
//! let config = AppConfig::from_env()?;
//! vaultmesh::observability::init_logging(&config.observability)?;
//!
//! let broker = CredentialManager::connect(&config).await?;
//! let issued = broker.issue_token().await?;
//! let secrets = broker.get_secret(&issued.new_token).await?;
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod validation;

// Re-export commonly used types
pub use broker::{
    Coordinator, CredentialManager, FanoutStatus, Operation, SecretStoreBackend, VaultBackend,
};
pub use config::AppConfig;
pub use crypto::KeyRequest;
pub use domain::{KeyRecord, KeyType, SecretPayload};
pub use errors::{BrokerError, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
