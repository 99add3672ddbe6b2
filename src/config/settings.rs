//! # Configuration Settings
//!
//! Defines the configuration structure for the vaultmesh broker.
//!
//! The on-disk shape matches the deployed config file format:
//!
//! ```json
//! {
//!   "vaults": [
//!     {"address": "http://127.0.0.1:8200", "token": "<root credential>"},
//!     {"address": "http://127.0.0.1:8202", "token": "<root credential>"}
//!   ],
//!   "token_refresh": 3600
//! }
//! ```
//!
//! Addresses lose any trailing slash at load time so URL construction can
//! always join with `/`. Initialization failures (unreadable file, bad
//! JSON, invalid values) are surfaced synchronously from the loader.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::Validate;

use crate::domain::RootCredential;
use crate::errors::{BrokerError, Result};

/// Environment variable naming the config file path.
pub const CONFIG_PATH_ENV: &str = "VAULTMESH_CONFIG_PATH";

/// Default config file path when the environment does not override it.
pub const DEFAULT_CONFIG_PATH: &str = "vaultmesh.json";

fn default_request_timeout_secs() -> u64 {
    10
}

/// One backend replica: base address plus the root credential that
/// authorizes policy and token administration on it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BackendSettings {
    /// Base URL of the backend (e.g. "http://127.0.0.1:8200").
    #[validate(length(min = 1, message = "Backend address cannot be empty"))]
    pub address: String,

    /// Root credential for this backend.
    pub token: RootCredential,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Log level filter (e.g. "info", "vaultmesh=debug").
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Emit JSON-formatted log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Service name reported in startup logs.
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            service_name: "vaultmesh".to_string(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// Backend replica set, order-paired addresses and root credentials.
    #[serde(rename = "vaults")]
    #[validate(length(min = 1, message = "At least one backend is required"), nested)]
    pub backends: Vec<BackendSettings>,

    /// Credential refresh interval in seconds: a bearer token older than
    /// this is rotated by the next operation that touches it.
    #[serde(rename = "token_refresh")]
    #[validate(range(min = 1, message = "token_refresh must be at least 1 second"))]
    pub token_refresh_secs: u64,

    /// Per-backend-call timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(
        min = 1,
        max = 300,
        message = "request timeout must be between 1 and 300 seconds"
    ))]
    pub request_timeout_secs: u64,

    /// Logging configuration.
    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            token_refresh_secs: 3600,
            request_timeout_secs: default_request_timeout_secs(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load, normalize and validate configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BrokerError::config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let mut config: AppConfig = serde_json::from_str(&raw).map_err(|e| {
            BrokerError::config(format!("Invalid config file '{}': {}", path.display(), e))
        })?;

        config.normalize();
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from the path named by `VAULTMESH_CONFIG_PATH`,
    /// falling back to `vaultmesh.json` in the working directory.
    pub fn from_env() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(path)
    }

    /// Strip trailing slashes from backend addresses.
    pub fn normalize(&mut self) {
        for backend in &mut self.backends {
            while backend.address.ends_with('/') {
                backend.address.pop();
            }
        }
    }

    /// Validate the entire configuration.
    pub fn validate_all(&self) -> Result<()> {
        Validate::validate(self).map_err(BrokerError::from)?;
        self.validate_custom()
    }

    /// Custom validation logic beyond what the validator derive covers.
    fn validate_custom(&self) -> Result<()> {
        for backend in &self.backends {
            let parsed = url::Url::parse(&backend.address).map_err(|e| {
                BrokerError::config(format!("Invalid backend address '{}': {}", backend.address, e))
            })?;

            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(BrokerError::config(format!(
                    "Backend address '{}' must use http or https",
                    backend.address
                )));
            }

            if backend.token.is_empty() {
                return Err(BrokerError::config(format!(
                    "Backend '{}' has an empty root credential",
                    backend.address
                )));
            }
        }

        Ok(())
    }

    /// Credential refresh interval as a Duration.
    pub fn token_refresh(&self) -> Duration {
        Duration::from_secs(self.token_refresh_secs)
    }

    /// Per-backend-call timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
