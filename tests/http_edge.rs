//! HTTP edge tests
//!
//! Drives the axum router directly with `tower::ServiceExt::oneshot`,
//! backed by a live in-process backup so replies flow through the full
//! replicate-first path.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use ftwallet::engine::WalletEngine;
use ftwallet::failover::FailoverState;
use ftwallet::gateway::{self, AppState};
use ftwallet::primary::PrimaryService;
use ftwallet::replication::{ReplicationClient, ReplicationServer};
use tokio::net::TcpListener;

struct Harness {
    router: Router,
    backup_dir: String,
    primary_dir: String,
}

impl Harness {
    async fn start(tag: &str) -> Self {
        let backup_dir = format!("target/test_http_backup_{}_{}", tag, std::process::id());
        let primary_dir = format!("target/test_http_primary_{}_{}", tag, std::process::id());
        let _ = std::fs::remove_dir_all(&backup_dir);
        let _ = std::fs::remove_dir_all(&primary_dir);

        let backup_engine = {
            let mut engine = WalletEngine::open(&backup_dir).unwrap();
            engine.recover().unwrap();
            Arc::new(Mutex::new(engine))
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backup_addr = listener.local_addr().unwrap();
        tokio::spawn(ReplicationServer::new(backup_engine).run(listener));

        let primary_engine = {
            let mut engine = WalletEngine::open(&primary_dir).unwrap();
            engine.recover().unwrap();
            Arc::new(Mutex::new(engine))
        };
        let client = ReplicationClient::new(
            backup_addr.to_string(),
            Duration::from_millis(500),
            Duration::from_millis(200),
        );
        let primary = Arc::new(PrimaryService::new(
            primary_engine,
            client,
            Arc::new(FailoverState::new()),
        ));

        let state = AppState::new(primary);
        state.mark_ready();

        Self {
            router: gateway::router(state),
            backup_dir,
            primary_dir,
        }
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn cleanup(&self) {
        let _ = std::fs::remove_dir_all(&self.backup_dir);
        let _ = std::fs::remove_dir_all(&self.primary_dir);
    }
}

// --------------------------------------------------------
// Test 1: Happy path deposit then balance
// --------------------------------------------------------
#[tokio::test]
async fn test_deposit_then_balance() {
    let harness = Harness::start("happy").await;

    let (status, body) = harness
        .post(
            "/deposit",
            json!({"account_id": "user123", "amount": 100.00, "transaction_id": "t1"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["new_balance"], json!(100.0));
    assert_eq!(body["transaction_id"], json!("t1"));

    let (status, body) = harness
        .post("/balance", json!({"account_id": "user123"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], json!(100.0));

    harness.cleanup();
}

// --------------------------------------------------------
// Test 2: Idempotent retry returns the identical body
// --------------------------------------------------------
#[tokio::test]
async fn test_idempotent_retry_same_body() {
    let harness = Harness::start("idem").await;

    let request = json!({"account_id": "user123", "amount": 100.00, "transaction_id": "t1"});
    let (status1, body1) = harness.post("/deposit", request.clone()).await;
    let (status2, body2) = harness.post("/deposit", request).await;

    assert_eq!(status1, StatusCode::OK);
    assert_eq!(status2, StatusCode::OK);
    assert_eq!(body1, body2);

    let (_, body) = harness
        .post("/balance", json!({"account_id": "user123"}))
        .await;
    assert_eq!(body["balance"], json!(100.0));

    harness.cleanup();
}

// --------------------------------------------------------
// Test 3: Insufficient funds is 400, and so is its replay
// --------------------------------------------------------
#[tokio::test]
async fn test_insufficient_funds_400() {
    let harness = Harness::start("insufficient").await;

    harness
        .post(
            "/deposit",
            json!({"account_id": "user123", "amount": 100.00, "transaction_id": "t1"}),
        )
        .await;

    let request = json!({"account_id": "user123", "amount": 500.00, "transaction_id": "t2"});
    let (status, body) = harness.post("/withdraw", request.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("insufficient balance"));

    // Same status code as the original on replay
    let (status, replay_body) = harness.post("/withdraw", request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(replay_body, body);

    let (_, body) = harness
        .post("/balance", json!({"account_id": "user123"}))
        .await;
    assert_eq!(body["balance"], json!(100.0));

    harness.cleanup();
}

// --------------------------------------------------------
// Test 4: Validation failures are rejected at the edge
// --------------------------------------------------------
#[tokio::test]
async fn test_validation_rejected_at_edge() {
    let harness = Harness::start("validation").await;

    let cases = [
        json!({"account_id": "user123", "amount": -5.0, "transaction_id": "t1"}),
        json!({"account_id": "user123", "amount": 0.0, "transaction_id": "t1"}),
        json!({"account_id": "", "amount": 5.0, "transaction_id": "t1"}),
        json!({"account_id": "user123", "amount": 5.0, "transaction_id": ""}),
    ];
    for case in cases {
        let (status, body) = harness.post("/deposit", case.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "case {}", case);
        assert_eq!(body["success"], json!(false));
    }

    // Nothing reached the ledger
    let (_, body) = harness
        .post("/balance", json!({"account_id": "user123"}))
        .await;
    assert_eq!(body["balance"], json!(0.0));

    harness.cleanup();
}

// --------------------------------------------------------
// Test 5: Health endpoint
// --------------------------------------------------------
#[tokio::test]
async fn test_health() {
    let harness = Harness::start("health").await;

    let (status, body) = harness.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));

    harness.cleanup();
}
