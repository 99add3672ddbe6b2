//! Multi-backend consistency coordinator.
//!
//! Fans one logical operation out to every backend, joins all results, and
//! enforces the read-equality invariant: a read only ever returns a value
//! that is identical across all backends. Writes and deletes report every
//! per-backend status so callers can detect partial failure, even though
//! the broker itself does not roll back (no cross-backend transaction).
//!
//! Fan-out calls run concurrently and each carries the per-call timeout
//! installed on its backend client, so total wall time for one fan-out is
//! bounded by roughly one backend-call timeout. Ordering between backends
//! within a fan-out carries no meaning; only the join barrier does.

use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;

use super::backend::SecretStoreBackend;
use crate::errors::{BrokerError, Result};

/// Outcome of a fan-out write or delete: one raw HTTP status per backend,
/// in configuration order.
///
/// The broker's own success contract keys off [`FanoutStatus::last`], the
/// inherited last-status-wins behavior; `per_backend` and
/// [`FanoutStatus::all_success`] exist so callers and tests can see partial
/// failure that the last status alone would hide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutStatus {
    pub per_backend: Vec<u16>,
}

impl FanoutStatus {
    /// Status of the last backend called.
    pub fn last(&self) -> u16 {
        *self.per_backend.last().unwrap_or(&0)
    }

    /// True when every backend returned 2xx.
    pub fn all_success(&self) -> bool {
        !self.per_backend.is_empty()
            && self.per_backend.iter().all(|status| (200..300).contains(status))
    }
}

/// Fans logical operations out to every backend and aggregates the results.
pub struct Coordinator<B> {
    backends: Arc<Vec<B>>,
}

impl<B> Clone for Coordinator<B> {
    fn clone(&self) -> Self {
        Self { backends: Arc::clone(&self.backends) }
    }
}

impl<B: SecretStoreBackend> Coordinator<B> {
    /// Wrap an immutable backend set.
    pub fn new(backends: Arc<Vec<B>>) -> Self {
        Self { backends }
    }

    /// The backend replica set, in configuration order.
    pub fn backends(&self) -> &[B] {
        &self.backends
    }

    /// Store the same payload on every backend concurrently.
    ///
    /// A transport-level failure on any backend propagates as an error. HTTP
    /// statuses are collected as-is: a write that succeeds on k < N backends
    /// leaves the replicas inconsistent and is visible only through the
    /// returned statuses. There is no rollback.
    pub async fn write(&self, token: &str, payload: &Value) -> Result<FanoutStatus> {
        let calls = self.backends.iter().map(|backend| backend.put_secret(token, payload));
        let per_backend = join_all(calls).await.into_iter().collect::<Result<Vec<u16>>>()?;

        tracing::debug!(statuses = ?per_backend, "Fan-out write complete");
        Ok(FanoutStatus { per_backend })
    }

    /// Read the payload from every backend and require them to agree.
    ///
    /// The first backend's response is the baseline; any structurally
    /// unequal response from another backend fails the whole read with
    /// [`BrokerError::InconsistentReplicas`]. The error is never resolved by
    /// picking one replica. Backends with nothing stored report `{}`, so an
    /// all-empty read returns `{}` without error.
    pub async fn read(&self, token: &str) -> Result<Value> {
        let calls = self.backends.iter().map(|backend| backend.get_secret(token));
        let responses = join_all(calls).await;

        let mut baseline: Option<Value> = None;
        for (backend, response) in self.backends.iter().zip(responses) {
            let value = response?;
            match &baseline {
                None => baseline = Some(value),
                Some(expected) if *expected == value => {}
                Some(_) => {
                    tracing::error!(
                        backend = %backend.address(),
                        "Replica disagrees with baseline payload"
                    );
                    return Err(BrokerError::inconsistent(backend.address()));
                }
            }
        }

        Ok(baseline.unwrap_or_else(|| json!({})))
    }

    /// Delete the stored payload on every backend concurrently.
    pub async fn delete(&self, token: &str) -> Result<FanoutStatus> {
        let calls = self.backends.iter().map(|backend| backend.delete_secret(token));
        let per_backend = join_all(calls).await.into_iter().collect::<Result<Vec<u16>>>()?;

        tracing::debug!(statuses = ?per_backend, "Fan-out delete complete");
        Ok(FanoutStatus { per_backend })
    }

    /// True only when every backend recognizes the token (fails closed).
    pub async fn token_known_to_all(&self, token: &str) -> Result<bool> {
        let calls = self.backends.iter().map(|backend| backend.token_exists(token));
        let results = join_all(calls).await.into_iter().collect::<Result<Vec<bool>>>()?;
        Ok(results.iter().all(|known| *known))
    }

    /// True when any backend recognizes the token. Used by the issuance
    /// uniqueness probe: a candidate is only usable when no backend has
    /// ever seen it.
    pub async fn token_known_to_any(&self, token: &str) -> Result<bool> {
        let calls = self.backends.iter().map(|backend| backend.token_exists(token));
        let results = join_all(calls).await.into_iter().collect::<Result<Vec<bool>>>()?;
        Ok(results.iter().any(|known| *known))
    }
}
