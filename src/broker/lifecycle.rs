//! Credential lifecycle management.
//!
//! Owns the bearer-token state machine
//! (`Unissued → Active → Rotating → Active' → Revoked(old)`) and is the
//! single entry point for every caller-facing operation: each one validates
//! the presented credential against every backend, rotates it when stale,
//! then delegates the data operation to the consistency coordinator.
//!
//! Rotation preserves the stored payload: the document is read back,
//! restamped, written under the new token, and only then is the old token
//! revoked. Any failure before revocation aborts the protocol and leaves
//! the old token valid: partial failure never destroys working access.
//!
//! No lock is held across the rotate-write-revoke sequence. Two concurrent
//! rotations of the same token race by design; the loser's revoke of the
//! already-retired token fails harmlessly (see the rotation tests).

use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use super::backend::{SecretStoreBackend, VaultBackend};
use super::coordinator::Coordinator;
use super::policy::{CRUD_CAPABILITIES, DEFAULT_POLICY_NAME};
use super::token::generate_token;
use crate::config::AppConfig;
use crate::crypto::keygen::{self, KeyRequest};
use crate::domain::{unix_now, SecretPayload};
use crate::errors::{BrokerError, Result};
use crate::op_span;
use crate::validation;

/// Result of one caller-facing operation.
///
/// `new_token` is the credential all subsequent calls must use; it differs
/// from the presented one whenever the operation rotated. `status_code` is
/// the last backend's raw status for mutating operations; callers interpret
/// 2xx as success.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub new_token: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Broker entry point: credential issuance, validation, rotation and the
/// data operations gated behind them.
pub struct CredentialManager<B> {
    coordinator: Coordinator<B>,
    refresh_interval: Duration,
    policy_name: String,
}

impl CredentialManager<VaultBackend> {
    /// Build the backend registry from configuration and install the
    /// default policy on every backend.
    ///
    /// Initialization failures surface synchronously from here; a manager
    /// that constructs successfully has a fully prepared replica set.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let backends = VaultBackend::from_settings(&config.backends, config.request_timeout())?;

        let installs = backends
            .iter()
            .map(|backend| backend.create_policy(DEFAULT_POLICY_NAME, CRUD_CAPABILITIES));
        join_all(installs).await.into_iter().collect::<Result<Vec<()>>>()?;

        tracing::info!(
            backend_count = backends.len(),
            refresh_interval_secs = config.token_refresh_secs,
            "Backend registry initialized"
        );

        Ok(Self::new(Arc::new(backends), config.token_refresh()))
    }
}

impl<B: SecretStoreBackend> CredentialManager<B> {
    /// Wrap an already-prepared backend set. Used directly by tests; the
    /// production path goes through [`CredentialManager::connect`].
    pub fn new(backends: Arc<Vec<B>>, refresh_interval: Duration) -> Self {
        Self {
            coordinator: Coordinator::new(backends),
            refresh_interval,
            policy_name: DEFAULT_POLICY_NAME.to_string(),
        }
    }

    /// The fan-out coordinator over this manager's backend set.
    pub fn coordinator(&self) -> &Coordinator<B> {
        &self.coordinator
    }

    /// Issue a fresh bearer token and seed its empty payload everywhere.
    ///
    /// The candidate loop is explicit: a candidate already known to any
    /// backend is discarded and regenerated, so an issued token is unique
    /// across the whole replica set.
    pub async fn issue_token(&self) -> Result<Operation> {
        let span = op_span!("issue_token");
        async {
            let candidate = loop {
                let candidate = generate_token();
                if !self.coordinator.token_known_to_any(&candidate).await? {
                    break candidate;
                }
                tracing::warn!("Generated token already known to a backend; regenerating");
            };

            self.create_token_everywhere(&candidate).await?;

            let seed = serde_json::to_value(SecretPayload::empty(unix_now()))?;
            let status = self.coordinator.write(&candidate, &seed).await?;

            tracing::info!(status = status.last(), "Issued new credential");
            Ok(Operation { new_token: candidate, status_code: status.last(), data: Some(seed) })
        }
        .instrument(span)
        .await
    }

    /// Whether every backend recognizes the token. A single disagreement
    /// means invalid: the check fails closed.
    pub async fn check_token(&self, token: &str) -> Result<bool> {
        self.coordinator.token_known_to_all(token).await
    }

    /// Store a payload under the (possibly rotated) credential.
    ///
    /// The payload is validated before any backend is touched.
    pub async fn put_secret(&self, token: &str, payload: Value) -> Result<Operation> {
        let span = op_span!("put_secret");
        async {
            validation::validate(&payload, unix_now())?;
            self.require_valid(token).await?;

            let active = self.rotate_if_stale(token).await?;
            let status = self.coordinator.write(&active, &payload).await?;

            Ok(Operation { new_token: active, status_code: status.last(), data: None })
        }
        .instrument(span)
        .await
    }

    /// Read the payload, requiring all backends to agree on it.
    pub async fn get_secret(&self, token: &str) -> Result<Operation> {
        let span = op_span!("get_secret");
        async {
            self.require_valid(token).await?;

            let active = self.rotate_if_stale(token).await?;
            let document = self.coordinator.read(&active).await?;
            let data = document.get("data").cloned().unwrap_or_else(|| json!({}));

            Ok(Operation { new_token: active, status_code: 200, data: Some(data) })
        }
        .instrument(span)
        .await
    }

    /// Delete the stored payload everywhere, then re-seed an empty one so
    /// the credential lineage keeps a well-formed document.
    pub async fn delete_secret(&self, token: &str) -> Result<Operation> {
        let span = op_span!("delete_secret");
        async {
            self.require_valid(token).await?;

            let active = self.rotate_if_stale(token).await?;
            let status = self.coordinator.delete(&active).await?;

            let seed = serde_json::to_value(SecretPayload::empty(unix_now()))?;
            self.coordinator.write(&active, &seed).await?;

            tracing::info!(status = status.last(), "Deleted and re-seeded payload");
            Ok(Operation { new_token: active, status_code: status.last(), data: None })
        }
        .instrument(span)
        .await
    }

    /// Generate key material and append it to the stored payload.
    ///
    /// Request parameters are validated before any backend call; the id
    /// uniqueness check runs against the current payload before generation,
    /// so a duplicate request leaves the payload untouched and wastes no
    /// CPU on key material.
    pub async fn generate_key(&self, token: &str, request: KeyRequest) -> Result<Operation> {
        let span = op_span!("generate_key");
        async {
            keygen::validate_request(&request)?;
            self.require_valid(token).await?;

            let active = self.rotate_if_stale(token).await?;
            let current = self.coordinator.read(&active).await?;
            let mut document = current.get("data").cloned().unwrap_or_else(|| json!({}));

            let duplicate = document
                .get("keys")
                .and_then(Value::as_array)
                .is_some_and(|entries| {
                    entries.iter().any(|entry| {
                        entry.get("id").and_then(Value::as_str) == Some(request.name.as_str())
                    })
                });
            if duplicate {
                return Err(BrokerError::duplicate_key_id(&request.name));
            }

            // Key generation is CPU-bound; keep it off the I/O scheduler.
            let record = tokio::task::spawn_blocking(move || keygen::generate(&request))
                .await
                .map_err(|e| BrokerError::internal(format!("key generation task failed: {}", e)))??;
            let record = serde_json::to_value(&record)?;

            let object = document.as_object_mut().ok_or_else(|| {
                BrokerError::validation("stored payload is not a JSON object")
            })?;
            object
                .entry("keys")
                .or_insert_with(|| json!([]))
                .as_array_mut()
                .ok_or_else(|| BrokerError::validation("stored 'keys' is not an array"))?
                .push(record);
            object.entry("timestamp").or_insert_with(|| json!(unix_now()));

            let status = self.coordinator.write(&active, &document).await?;
            let keys = document.get("keys").cloned();

            tracing::info!(status = status.last(), "Appended generated key to payload");
            Ok(Operation { new_token: active, status_code: status.last(), data: keys })
        }
        .instrument(span)
        .await
    }

    /// Rotate the credential when its payload is stale; otherwise return
    /// the same token.
    ///
    /// The staleness decision reads the stored `timestamp`; a payload
    /// younger than the refresh interval short-circuits without touching
    /// token state. A backend set with no stored document rotates into a
    /// fresh empty payload.
    pub async fn rotate_if_stale(&self, token: &str) -> Result<String> {
        let now = unix_now();
        let current = self.coordinator.read(token).await?;
        let data = current.get("data").cloned();

        if let Some(ts) = data.as_ref().and_then(|d| d.get("timestamp")).and_then(Value::as_i64) {
            if now - ts < self.refresh_interval.as_secs() as i64 {
                tracing::debug!(age_secs = now - ts, "Credential still fresh; rotation skipped");
                return Ok(token.to_string());
            }
        }

        let new_token = generate_token();

        let stamped = match data {
            Some(mut document) => {
                match document.as_object_mut() {
                    Some(object) => {
                        object.insert("timestamp".to_string(), json!(now));
                    }
                    None => {
                        return Err(BrokerError::validation("stored payload is not a JSON object"))
                    }
                }
                document
            }
            None => serde_json::to_value(SecretPayload::empty(now))?,
        };

        // Old token stays valid until the new one holds the payload on the
        // last-called backend; any failure up to that point aborts here.
        self.create_token_everywhere(&new_token).await?;
        self.coordinator.write(&new_token, &stamped).await?;

        let revocations = self
            .coordinator
            .backends()
            .iter()
            .map(|backend| backend.revoke_token(token));
        for (backend, outcome) in self.coordinator.backends().iter().zip(join_all(revocations).await)
        {
            match outcome {
                Ok(status) if (200..300).contains(&status) => {}
                Ok(status) => tracing::warn!(
                    backend = %backend.address(),
                    status,
                    "Old token revocation returned non-2xx"
                ),
                Err(e) => tracing::warn!(
                    backend = %backend.address(),
                    error = %e,
                    "Old token revocation failed"
                ),
            }
        }

        tracing::info!("Rotated credential");
        Ok(new_token)
    }

    async fn require_valid(&self, token: &str) -> Result<()> {
        if self.check_token(token).await? {
            Ok(())
        } else {
            Err(BrokerError::UnknownCredential)
        }
    }

    /// Mint the same token value on every backend under the default policy.
    async fn create_token_everywhere(&self, token: &str) -> Result<()> {
        let calls = self
            .coordinator
            .backends()
            .iter()
            .map(|backend| backend.create_token(&self.policy_name, token));
        let issued = join_all(calls).await.into_iter().collect::<Result<Vec<String>>>()?;

        for (backend, value) in self.coordinator.backends().iter().zip(&issued) {
            if value != token {
                return Err(BrokerError::rejected(
                    backend.address(),
                    200,
                    "backend issued a token with a different id",
                ));
            }
        }

        Ok(())
    }
}
