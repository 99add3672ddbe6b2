//! End-to-end broker scenarios against mock backend replicas.
//!
//! These tests drive the full path (credential manager, coordinator,
//! HTTP backend adapter) against wiremock replicas that implement the
//! upstream API surface with shared in-memory state.

mod common;

use anyhow::Result;
use serde_json::json;
use vaultmesh::broker::TOKEN_LENGTH;
use vaultmesh::domain::unix_now;
use vaultmesh::{BrokerError, KeyRequest};

use common::Cluster;

const LONG_REFRESH: u64 = 3_600;

#[tokio::test]
async fn connect_installs_default_policy_on_every_replica() -> Result<()> {
    let cluster = Cluster::start(3).await;
    let _broker = cluster.broker(LONG_REFRESH).await;

    for replica in &cluster.replicas {
        let state = replica.state();
        let document = state.policies.get("user").expect("default policy installed");
        assert!(document.contains("cubbyhole/secrets"));
        assert!(document.contains("\"create\""));
    }
    Ok(())
}

#[tokio::test]
async fn issued_token_reads_back_empty_payload() -> Result<()> {
    // Scenario A: issue a token, read `{keys: [], timestamp: t0}` back.
    let cluster = Cluster::start(3).await;
    let broker = cluster.broker(LONG_REFRESH).await;

    let before = unix_now();
    let issued = broker.issue_token().await?;
    assert_eq!(issued.new_token.len(), TOKEN_LENGTH);
    assert!((200..300).contains(&issued.status_code));

    let read = broker.get_secret(&issued.new_token).await?;
    let data = read.data.expect("payload data");
    assert_eq!(data["keys"], json!([]));
    assert!(data["timestamp"].as_i64().unwrap() >= before);

    // The same token value is live on every replica, mirrored identically.
    for replica in &cluster.replicas {
        let state = replica.state();
        assert!(state.tokens.contains(&issued.new_token));
        assert_eq!(state.secrets[&issued.new_token]["keys"], json!([]));
    }
    Ok(())
}

#[tokio::test]
async fn generated_candidates_are_unknown_until_issued() -> Result<()> {
    let cluster = Cluster::start(2).await;
    let broker = cluster.broker(LONG_REFRESH).await;

    let candidate = vaultmesh::broker::generate_token();
    assert!(!broker.coordinator().token_known_to_any(&candidate).await?);

    let issued = broker.issue_token().await?;
    assert!(broker.coordinator().token_known_to_all(&issued.new_token).await?);
    Ok(())
}

#[tokio::test]
async fn generate_rsa_key_then_duplicate_id_fails() -> Result<()> {
    // Scenario B: one rsa-2048 record lands in the payload; repeating the
    // id is rejected and the payload is left unchanged.
    let cluster = Cluster::start(2).await;
    let broker = cluster.broker(LONG_REFRESH).await;
    let issued = broker.issue_token().await?;

    let request = KeyRequest {
        name: "k1".to_string(),
        key_type: "rsa".to_string(),
        length: Some(2048),
        cipher_mode: None,
    };
    let result = broker.generate_key(&issued.new_token, request.clone()).await?;

    let keys = result.data.expect("updated keys array");
    assert_eq!(keys.as_array().unwrap().len(), 1);
    assert_eq!(keys[0]["id"], "k1");
    assert_eq!(keys[0]["type"], "rsa");
    assert_eq!(keys[0]["length"], 2048);
    assert!(keys[0]["privateKey"].as_str().unwrap().contains("BEGIN PRIVATE KEY"));

    let err = broker.generate_key(&result.new_token, request).await.unwrap_err();
    assert!(matches!(err, BrokerError::DuplicateKeyId { .. }));

    let read = broker.get_secret(&result.new_token).await?;
    assert_eq!(read.data.unwrap()["keys"].as_array().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn delete_reseeds_empty_payload_under_returned_token() -> Result<()> {
    // Scenario C: delete succeeds and a follow-up read under the returned
    // token yields an empty keys array.
    let cluster = Cluster::start(2).await;
    let broker = cluster.broker(LONG_REFRESH).await;
    let issued = broker.issue_token().await?;

    let payload = json!({
        "keys": [{"id": "k1", "type": "aes", "length": 256, "cipherType": "GCM",
                  "privateKey": "AAAA", "publicKey": "", "curve": ""}],
        "timestamp": unix_now()
    });
    let written = broker.put_secret(&issued.new_token, payload).await?;
    assert!((200..300).contains(&written.status_code));

    let deleted = broker.delete_secret(&written.new_token).await?;
    assert!((200..300).contains(&deleted.status_code));

    let read = broker.get_secret(&deleted.new_token).await?;
    assert_eq!(read.data.unwrap()["keys"], json!([]));
    Ok(())
}

#[tokio::test]
async fn stale_credential_is_rotated_with_payload_preserved() -> Result<()> {
    let cluster = Cluster::start(3).await;
    let broker = cluster.broker(LONG_REFRESH).await;
    let issued = broker.issue_token().await?;

    let keys = json!([{"id": "k1", "type": "ecdh", "curve": "Curve25519",
                       "publicKey": "p", "privateKey": "s", "length": 256, "cipherType": ""}]);
    cluster.rewrite_stored_payload(
        &issued.new_token,
        json!({"keys": keys, "timestamp": unix_now() - 86_400}),
    );

    let before = unix_now();
    let read = broker.get_secret(&issued.new_token).await?;

    // Rotation handed back a different token; the old one is dead on every
    // replica and the new one is live everywhere.
    assert_ne!(read.new_token, issued.new_token);
    assert!(!broker.check_token(&issued.new_token).await?);
    assert!(broker.check_token(&read.new_token).await?);

    // Keys survived content-equal; timestamp moved to rotation time.
    let data = read.data.unwrap();
    assert_eq!(data["keys"], keys);
    assert!(data["timestamp"].as_i64().unwrap() >= before);

    assert_eq!(cluster.total_revokes(), cluster.replicas.len());
    Ok(())
}

#[tokio::test]
async fn fresh_credential_rotation_is_a_noop_on_backends() -> Result<()> {
    let cluster = Cluster::start(2).await;
    let broker = cluster.broker(LONG_REFRESH).await;
    let issued = broker.issue_token().await?;

    let creates_after_issue = cluster.total_token_creates();

    let first = broker.get_secret(&issued.new_token).await?;
    let second = broker.get_secret(&first.new_token).await?;

    // Same token throughout, and not a single token create or revoke
    // happened after issuance.
    assert_eq!(first.new_token, issued.new_token);
    assert_eq!(second.new_token, issued.new_token);
    assert_eq!(cluster.total_token_creates(), creates_after_issue);
    assert_eq!(cluster.total_revokes(), 0);
    Ok(())
}

#[tokio::test]
async fn divergent_replica_fails_reads_loudly() -> Result<()> {
    let cluster = Cluster::start(2).await;
    let broker = cluster.broker(LONG_REFRESH).await;
    let issued = broker.issue_token().await?;

    // One replica's document is mutated behind the broker's back.
    {
        let mut state = cluster.replicas[1].state();
        let tampered = json!({"keys": [{"id": "rogue"}], "timestamp": unix_now()});
        state.secrets.insert(issued.new_token.clone(), tampered);
    }

    let err = broker.get_secret(&issued.new_token).await.unwrap_err();
    assert!(matches!(err, BrokerError::InconsistentReplicas { .. }));
    Ok(())
}

#[tokio::test]
async fn unknown_credential_is_rejected_without_mutation() -> Result<()> {
    let cluster = Cluster::start(2).await;
    let broker = cluster.broker(LONG_REFRESH).await;

    let stranger = vaultmesh::broker::generate_token();
    let err = broker.get_secret(&stranger).await.unwrap_err();
    assert!(matches!(err, BrokerError::UnknownCredential));

    let err = broker
        .put_secret(&stranger, json!({"keys": [], "timestamp": unix_now()}))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::UnknownCredential));

    for replica in &cluster.replicas {
        assert!(replica.state().secrets.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn stale_payload_write_is_rejected_before_any_backend_call() -> Result<()> {
    let cluster = Cluster::start(2).await;
    let broker = cluster.broker(LONG_REFRESH).await;
    let issued = broker.issue_token().await?;

    let seed_before = cluster.replicas[0].state().secrets[&issued.new_token].clone();

    let stale = json!({"keys": [], "timestamp": unix_now() - 301});
    let err = broker.put_secret(&issued.new_token, stale).await.unwrap_err();
    assert!(matches!(err, BrokerError::Validation { .. }));

    // Stored documents are untouched.
    for replica in &cluster.replicas {
        assert_eq!(replica.state().secrets[&issued.new_token], seed_before);
    }
    Ok(())
}
