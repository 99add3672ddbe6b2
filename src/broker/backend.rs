//! Single-backend adapter for the upstream secret-store HTTP API.
//!
//! Each [`VaultBackend`] talks to exactly one replica and has no
//! cross-backend knowledge. Every call authorizes itself with a per-request
//! header: either the backend's root credential (policy and token
//! administration) or the caller's bearer token (secret read/write/delete).
//! There is no shared mutable header state, so concurrent fan-out calls on
//! the same client can never observe each other's credentials.
//!
//! The [`SecretStoreBackend`] trait is the seam the coordinator is generic
//! over; tests substitute in-memory fakes for it.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::BackendSettings;
use crate::domain::RootCredential;
use crate::errors::{BrokerError, Result};

/// Header carrying the authorization credential on every backend call.
const AUTH_HEADER: &str = "X-Vault-Token";

/// Operations the broker needs from one backend replica.
#[async_trait]
pub trait SecretStoreBackend: Send + Sync {
    /// Base address of this backend, for error reporting and logging.
    fn address(&self) -> &str;

    /// Idempotent policy upsert under the backend's ACL store.
    async fn create_policy(&self, name: &str, capabilities: &str) -> Result<()>;

    /// Mint a service token whose id is exactly `desired_token`, so the same
    /// credential string is valid identically on every backend. Returns the
    /// issued token value.
    async fn create_token(&self, policy: &str, desired_token: &str) -> Result<String>;

    /// Store the payload at the token-scoped secret path. Returns the raw
    /// HTTP status; callers interpret 2xx as success.
    async fn put_secret(&self, token: &str, payload: &Value) -> Result<u16>;

    /// Fetch the stored document. Returns `{"data": <payload>}` when one is
    /// stored and `{}` when the backend reports nothing at the path.
    async fn get_secret(&self, token: &str) -> Result<Value>;

    /// Delete the stored document. Returns the raw HTTP status.
    async fn delete_secret(&self, token: &str) -> Result<u16>;

    /// Revoke a bearer token. Returns the raw HTTP status.
    async fn revoke_token(&self, token: &str) -> Result<u16>;

    /// Whether the backend recognizes `token` as a live token.
    async fn token_exists(&self, token: &str) -> Result<bool>;
}

/// Decide whether a token-lookup response body reports a missing token.
///
/// The upstream API signals an unknown token with an `errors` field whose
/// message contains `"bad token"`. This string-match contract is deliberately
/// isolated here: it must be preserved for compatibility with the upstream
/// error shape, and swapping it for a structured status check later touches
/// only this function.
pub(crate) fn lookup_reports_missing(body: &str) -> bool {
    body.contains("errors") && body.contains("bad token")
}

/// HTTP adapter for one Vault-compatible backend replica.
pub struct VaultBackend {
    address: String,
    root_credential: RootCredential,
    client: reqwest::Client,
}

impl VaultBackend {
    /// Build an adapter for one backend with a bounded per-call timeout.
    pub fn new(settings: &BackendSettings, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            BrokerError::config(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            address: settings.address.clone(),
            root_credential: settings.token.clone(),
            client,
        })
    }

    /// Build one adapter per configured backend, preserving order.
    pub fn from_settings(backends: &[BackendSettings], timeout: Duration) -> Result<Vec<Self>> {
        backends.iter().map(|settings| Self::new(settings, timeout)).collect()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.address, path)
    }

    fn transport_error(&self, source: reqwest::Error) -> BrokerError {
        BrokerError::unavailable(&self.address, source)
    }
}

#[async_trait]
impl SecretStoreBackend for VaultBackend {
    fn address(&self) -> &str {
        &self.address
    }

    async fn create_policy(&self, name: &str, capabilities: &str) -> Result<()> {
        let url = self.url(&format!("v1/sys/policies/acl/{}", name));
        let body = json!({ "policy": super::policy::policy_document(capabilities) });

        let response = self
            .client
            .post(&url)
            .header(AUTH_HEADER, self.root_credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrokerError::rejected(
                &self.address,
                status.as_u16(),
                format!("policy upsert '{}' failed", name),
            ));
        }

        tracing::debug!(backend = %self.address, policy = %name, "Installed policy");
        Ok(())
    }

    async fn create_token(&self, policy: &str, desired_token: &str) -> Result<String> {
        let url = self.url("v1/auth/token/create");
        let body = json!({
            "id": desired_token,
            "display_name": "vaultmesh_user_token",
            "explicit_max_ttl": "0s",
            "meta": {},
            "no_default_policy": true,
            "no_parent": true,
            "num_uses": 0,
            "policies": [policy],
            "renewable": true,
            "ttl": "8760h",
            "type": "service"
        });

        let response = self
            .client
            .post(&url)
            .header(AUTH_HEADER, self.root_credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrokerError::rejected(
                &self.address,
                status.as_u16(),
                "token create failed",
            ));
        }

        let body: Value = response.json().await.map_err(|e| self.transport_error(e))?;
        let issued = body
            .get("auth")
            .and_then(|auth| auth.get("client_token"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                BrokerError::rejected(
                    &self.address,
                    status.as_u16(),
                    "token create response missing auth.client_token",
                )
            })?;

        Ok(issued.to_string())
    }

    async fn put_secret(&self, token: &str, payload: &Value) -> Result<u16> {
        let url = self.url("v1/cubbyhole/secrets");

        let response = self
            .client
            .post(&url)
            .header(AUTH_HEADER, token)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        Ok(response.status().as_u16())
    }

    async fn get_secret(&self, token: &str) -> Result<Value> {
        let url = self.url("v1/cubbyhole/secrets");

        let response = self
            .client
            .get(&url)
            .header(AUTH_HEADER, token)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        // Not-found is a normal outcome: an empty cubbyhole reads as `{}`.
        let parsed: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) if text.trim().is_empty() => json!({}),
            Err(e) => {
                return Err(BrokerError::rejected(
                    &self.address,
                    status.as_u16(),
                    format!("unparseable secret response: {}", e),
                ));
            }
        };

        match parsed.get("data") {
            Some(data) => Ok(json!({ "data": data })),
            None => Ok(json!({})),
        }
    }

    async fn delete_secret(&self, token: &str) -> Result<u16> {
        let url = self.url("v1/cubbyhole/secrets");

        let response = self
            .client
            .delete(&url)
            .header(AUTH_HEADER, token)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        Ok(response.status().as_u16())
    }

    async fn revoke_token(&self, token: &str) -> Result<u16> {
        let url = self.url("v1/auth/token/revoke");
        let body = json!({ "token": token });

        let response = self
            .client
            .post(&url)
            .header(AUTH_HEADER, self.root_credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        Ok(response.status().as_u16())
    }

    async fn token_exists(&self, token: &str) -> Result<bool> {
        let url = self.url("v1/auth/token/lookup");
        let body = json!({ "token": token });

        let response = self
            .client
            .post(&url)
            .header(AUTH_HEADER, self.root_credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        Ok(!lookup_reports_missing(&text))
    }
}
