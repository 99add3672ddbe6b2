//! Mock backend replicas for end-to-end broker tests.
//!
//! Each replica is a wiremock server with shared in-memory state behind the
//! upstream API surface the broker consumes: policy upsert, token
//! create/lookup/revoke, and the token-scoped secret path. State is
//! observable so tests can assert which protocol steps actually ran.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Value};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use vaultmesh::config::{AppConfig, BackendSettings};
use vaultmesh::domain::RootCredential;
use vaultmesh::{CredentialManager, VaultBackend};

/// Root credential every mock replica accepts for admin calls.
pub const ROOT_CREDENTIAL: &str = "mock-root";

/// In-memory state of one mock replica.
#[derive(Default)]
pub struct ReplicaState {
    /// Live tokens.
    pub tokens: HashSet<String>,
    /// Stored secret document per token (the cubbyhole).
    pub secrets: HashMap<String, Value>,
    /// Installed policies by name.
    pub policies: HashMap<String, String>,
    /// Number of token-create calls served.
    pub token_creates: usize,
    /// Number of revoke calls served.
    pub revokes: usize,
}

/// One mock backend replica.
pub struct MockReplica {
    pub server: MockServer,
    pub state: Arc<Mutex<ReplicaState>>,
}

fn auth_token(request: &Request) -> String {
    request
        .headers
        .get("X-Vault-Token")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn body_json(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap_or_else(|_| json!({}))
}

impl MockReplica {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(ReplicaState::default()));

        // Policy upsert.
        let policies = Arc::clone(&state);
        Mock::given(method("POST"))
            .and(path_regex(r"^/v1/sys/policies/acl/.+$"))
            .respond_with(move |request: &Request| {
                let name = request.url.path().rsplit('/').next().unwrap_or_default().to_string();
                let document =
                    body_json(request)["policy"].as_str().unwrap_or_default().to_string();
                policies.lock().unwrap().policies.insert(name, document);
                ResponseTemplate::new(204)
            })
            .mount(&server)
            .await;

        // Token create with explicit id.
        let creates = Arc::clone(&state);
        Mock::given(method("POST"))
            .and(path("/v1/auth/token/create"))
            .respond_with(move |request: &Request| {
                let body = body_json(request);
                let id = body["id"].as_str().unwrap_or_default().to_string();
                let mut state = creates.lock().unwrap();
                state.tokens.insert(id.clone());
                state.token_creates += 1;
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "auth": { "client_token": id } }))
            })
            .mount(&server)
            .await;

        // Token lookup: the "bad token" error shape the broker's heuristic
        // depends on.
        let lookups = Arc::clone(&state);
        Mock::given(method("POST"))
            .and(path("/v1/auth/token/lookup"))
            .respond_with(move |request: &Request| {
                let token = body_json(request)["token"].as_str().unwrap_or_default().to_string();
                if lookups.lock().unwrap().tokens.contains(&token) {
                    ResponseTemplate::new(200)
                        .set_body_json(json!({ "data": { "id": token, "policies": ["user"] } }))
                } else {
                    ResponseTemplate::new(403).set_body_json(json!({ "errors": ["bad token"] }))
                }
            })
            .mount(&server)
            .await;

        // Token revoke: the cubbyhole dies with the token.
        let revokes = Arc::clone(&state);
        Mock::given(method("POST"))
            .and(path("/v1/auth/token/revoke"))
            .respond_with(move |request: &Request| {
                let token = body_json(request)["token"].as_str().unwrap_or_default().to_string();
                let mut state = revokes.lock().unwrap();
                state.tokens.remove(&token);
                state.secrets.remove(&token);
                state.revokes += 1;
                ResponseTemplate::new(204)
            })
            .mount(&server)
            .await;

        // Secret write.
        let writes = Arc::clone(&state);
        Mock::given(method("POST"))
            .and(path("/v1/cubbyhole/secrets"))
            .respond_with(move |request: &Request| {
                let token = auth_token(request);
                let mut state = writes.lock().unwrap();
                if state.tokens.contains(&token) {
                    state.secrets.insert(token, body_json(request));
                    ResponseTemplate::new(204)
                } else {
                    ResponseTemplate::new(403).set_body_json(json!({ "errors": ["permission denied"] }))
                }
            })
            .mount(&server)
            .await;

        // Secret read.
        let reads = Arc::clone(&state);
        Mock::given(method("GET"))
            .and(path("/v1/cubbyhole/secrets"))
            .respond_with(move |request: &Request| {
                let token = auth_token(request);
                match reads.lock().unwrap().secrets.get(&token) {
                    Some(payload) => ResponseTemplate::new(200)
                        .set_body_json(json!({ "data": payload, "lease_duration": 0 })),
                    None => ResponseTemplate::new(404).set_body_json(json!({ "errors": [] })),
                }
            })
            .mount(&server)
            .await;

        // Secret delete.
        let deletes = Arc::clone(&state);
        Mock::given(method("DELETE"))
            .and(path("/v1/cubbyhole/secrets"))
            .respond_with(move |request: &Request| {
                let token = auth_token(request);
                deletes.lock().unwrap().secrets.remove(&token);
                ResponseTemplate::new(204)
            })
            .mount(&server)
            .await;

        Self { server, state }
    }

    pub fn state(&self) -> MutexGuard<'_, ReplicaState> {
        self.state.lock().unwrap()
    }
}

/// A set of mock replicas plus helpers to point a broker at them.
pub struct Cluster {
    pub replicas: Vec<MockReplica>,
}

impl Cluster {
    pub async fn start(size: usize) -> Self {
        let mut replicas = Vec::with_capacity(size);
        for _ in 0..size {
            replicas.push(MockReplica::start().await);
        }
        Self { replicas }
    }

    pub fn config(&self, refresh_secs: u64) -> AppConfig {
        AppConfig {
            backends: self
                .replicas
                .iter()
                .map(|replica| BackendSettings {
                    address: replica.server.uri(),
                    token: RootCredential::new(ROOT_CREDENTIAL),
                })
                .collect(),
            token_refresh_secs: refresh_secs,
            request_timeout_secs: 5,
            observability: Default::default(),
        }
    }

    pub async fn broker(&self, refresh_secs: u64) -> CredentialManager<VaultBackend> {
        CredentialManager::connect(&self.config(refresh_secs))
            .await
            .expect("broker should connect to mock cluster")
    }

    pub fn total_token_creates(&self) -> usize {
        self.replicas.iter().map(|replica| replica.state().token_creates).sum()
    }

    pub fn total_revokes(&self) -> usize {
        self.replicas.iter().map(|replica| replica.state().revokes).sum()
    }

    /// Rewrite the stored payload for `token` on every replica, e.g. to age
    /// its timestamp into staleness.
    pub fn rewrite_stored_payload(&self, token: &str, payload: Value) {
        for replica in &self.replicas {
            replica.state().secrets.insert(token.to_string(), payload.clone());
        }
    }
}
