//! In-memory fake of one backend replica, shared by the broker unit tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::backend::SecretStoreBackend;
use crate::errors::Result;

/// One fake replica with observable state: stored secrets, live tokens, and
/// call recordings for create/revoke so tests can assert which protocol
/// steps actually ran.
pub(crate) struct FakeBackend {
    address: String,
    pub secrets: Mutex<HashMap<String, Value>>,
    pub tokens: Mutex<HashSet<String>>,
    pub created: Mutex<Vec<String>>,
    pub revoked: Mutex<Vec<String>>,
    pub put_status: u16,
    pub fail_token_create: bool,
}

impl FakeBackend {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            secrets: Mutex::new(HashMap::new()),
            tokens: Mutex::new(HashSet::new()),
            created: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
            put_status: 204,
            fail_token_create: false,
        }
    }

    /// A replica whose writes answer with `status` (and store nothing on
    /// non-2xx).
    pub fn failing_writes(address: &str, status: u16) -> Self {
        Self { put_status: status, ..Self::new(address) }
    }

    /// A replica whose token-create calls error outright.
    pub fn failing_token_create(address: &str) -> Self {
        Self { fail_token_create: true, ..Self::new(address) }
    }

    /// Pre-store a payload under a token.
    pub fn seed(self, token: &str, payload: Value) -> Self {
        self.secrets.lock().unwrap().insert(token.to_string(), payload);
        self
    }

    /// Pre-register a live token.
    pub fn with_token(self, token: &str) -> Self {
        self.tokens.lock().unwrap().insert(token.to_string());
        self
    }

    pub fn create_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn revoke_count(&self) -> usize {
        self.revoked.lock().unwrap().len()
    }
}

#[async_trait]
impl SecretStoreBackend for FakeBackend {
    fn address(&self) -> &str {
        &self.address
    }

    async fn create_policy(&self, _name: &str, _capabilities: &str) -> Result<()> {
        Ok(())
    }

    async fn create_token(&self, _policy: &str, desired_token: &str) -> Result<String> {
        if self.fail_token_create {
            return Err(crate::errors::BrokerError::rejected(
                &self.address,
                503,
                "token create failed",
            ));
        }
        self.tokens.lock().unwrap().insert(desired_token.to_string());
        self.created.lock().unwrap().push(desired_token.to_string());
        Ok(desired_token.to_string())
    }

    async fn put_secret(&self, token: &str, payload: &Value) -> Result<u16> {
        if (200..300).contains(&self.put_status) {
            self.secrets.lock().unwrap().insert(token.to_string(), payload.clone());
        }
        Ok(self.put_status)
    }

    async fn get_secret(&self, token: &str) -> Result<Value> {
        match self.secrets.lock().unwrap().get(token) {
            Some(payload) => Ok(json!({ "data": payload })),
            None => Ok(json!({})),
        }
    }

    async fn delete_secret(&self, token: &str) -> Result<u16> {
        self.secrets.lock().unwrap().remove(token);
        Ok(204)
    }

    async fn revoke_token(&self, token: &str) -> Result<u16> {
        self.tokens.lock().unwrap().remove(token);
        // The cubbyhole dies with its token, as on a real backend.
        self.secrets.lock().unwrap().remove(token);
        self.revoked.lock().unwrap().push(token.to_string());
        Ok(204)
    }

    async fn token_exists(&self, token: &str) -> Result<bool> {
        Ok(self.tokens.lock().unwrap().contains(token))
    }
}
