//! Integration tests for the Deployment Orchestrator API

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use ci_gateway::{CiGateway, CiRequest, DroneEndpoints, GatewayError, RemoteResponse};
use deploy_orchestrator::{
    create_router, AppState, MemoryStore, Orchestrator, ParameterEncoder, Store,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tower::ServiceExt; // for `oneshot`

/// CI server double answering requests in order
#[derive(Default)]
struct FakeDrone {
    replies: Mutex<VecDeque<Result<RemoteResponse, GatewayError>>>,
    requests: Mutex<Vec<CiRequest>>,
}

impl FakeDrone {
    fn reply(&self, body: Value) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(RemoteResponse::new(200, body)));
    }

    fn fail(&self, err: GatewayError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CiGateway for FakeDrone {
    async fn send(&self, request: CiRequest) -> Result<RemoteResponse, GatewayError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Unknown("no reply scripted".into())))
    }
}

struct TestApp {
    router: Router,
    drone: Arc<FakeDrone>,
    store: Arc<MemoryStore>,
}

fn create_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let drone = Arc::new(FakeDrone::default());

    let orchestrator = Orchestrator::new(
        store.clone(),
        drone.clone(),
        DroneEndpoints::new("https://ci.example.com", "acme", "nano-fork", "master"),
        ParameterEncoder::new("nano-fork"),
    );

    let router = create_router(AppState {
        store: store.clone(),
        orchestrator,
    });

    TestApp {
        router,
        drone,
        store,
    }
}

fn genesis(tag: &str) -> Value {
    json!({
        "public_key": format!("{}_PUB", tag),
        "private_key": format!("{}_PRIV", tag),
        "account": format!("xrb_{}", tag),
        "work": "7b42a00ee91d5810",
        "signature": format!("{}_SIG", tag),
    })
}

fn reps(tag: &str, n: usize) -> Value {
    Value::Array(
        (0..n)
            .map(|i| {
                json!({
                    "public_key": format!("{}_REP_PUB_{}", tag, i),
                    "private_key": format!("{}_REP_PRIV_{}", tag, i),
                })
            })
            .collect(),
    )
}

fn chain_payload(abbreviation: &str) -> Value {
    json!({
        "abbreviation": abbreviation,
        "name": "Test chain",
        "genesis": {
            "dev": genesis("DEV"),
            "beta": genesis("BETA"),
            "live": genesis("LIVE"),
            "test": genesis("TEST"),
        },
        "canary": { "beta": "CB", "live": "CL", "test": "CT" },
        "faucet_public_key": "FAUCET",
        "landing_public_key": "LANDING",
        "representatives": { "beta": reps("BETA", 2), "live": reps("LIVE", 8) },
        "ports": {
            "live": { "peering": 7075, "rpc": 7076 },
            "beta": { "peering": 54000, "rpc": 55000 },
            "test": { "peering": 17075, "rpc": 17076 },
        },
        "versions": { "node": "V23.3", "proxy": "1.4.0", "tools": "0.9.2" },
    })
}

async fn call(
    app: &TestApp,
    method: &str,
    uri: &str,
    role: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri).method(method);
    if let Some(role) = role {
        builder = builder
            .header("x-user-email", "admin@example.com")
            .header("x-user-role", role);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };

    (status, json)
}

async fn register(app: &TestApp, abbreviation: &str) -> u64 {
    let (status, json) = call(
        app,
        "POST",
        "/api/blockchains",
        Some("admin"),
        Some(chain_payload(abbreviation)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    json["id"].as_u64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();
    let (status, json) = call(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "deploy-orchestrator");
}

#[tokio::test]
async fn test_register_and_fetch_blockchain() {
    let app = create_test_app();
    let id = register(&app, "ABC").await;

    let (status, json) = call(
        &app,
        "GET",
        &format!("/api/blockchains/{}", id),
        Some("user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["abbreviation"], "ABC");
    assert_eq!(json["status"], "created");
    assert_eq!(json["owner"], "admin@example.com");

    let (status, json) = call(&app, "GET", "/api/blockchains", Some("user"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
}

#[tokio::test]
async fn test_duplicate_abbreviation_is_conflict() {
    let app = create_test_app();
    register(&app, "ABC").await;

    let (status, _) = call(
        &app,
        "POST",
        "/api/blockchains",
        Some("admin"),
        Some(chain_payload("abc")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_invalid_abbreviation_is_bad_request() {
    let app = create_test_app();
    let (status, json) = call(
        &app,
        "POST",
        "/api/blockchains",
        Some("admin"),
        Some(chain_payload("TOOLONG")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("abbreviation"));
}

#[tokio::test]
async fn test_principal_required_and_admin_enforced() {
    let app = create_test_app();
    let id = register(&app, "ABC").await;

    let (status, _) = call(&app, "GET", "/api/blockchains", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/blockchains/{}/build", id),
        Some("user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.drone.request_count(), 0);
}

#[tokio::test]
async fn test_build_then_duplicate_trigger_is_conflict() {
    let app = create_test_app();
    let id = register(&app, "ABC").await;

    app.drone
        .reply(json!({ "id": 55, "number": 3, "status": "pending" }));
    let (status, json) = call(
        &app,
        "POST",
        &format!("/api/blockchains/{}/build", id),
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    assert_eq!(json["outcome"], "triggered");
    assert_eq!(json["entry"]["build_id"], 55);
    assert_eq!(json["entry"]["build_no"], 3);
    assert_eq!(json["entry"]["status"], "running");

    app.drone
        .reply(json!({ "id": 55, "number": 3, "status": "running" }));
    let (status, json) = call(
        &app,
        "POST",
        &format!("/api/blockchains/{}/build", id),
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["outcome"], "conflict");
    assert_eq!(json["current_status"], "running");
    assert_eq!(app.store.entry_count().await, 1);

    let (status, json) = call(
        &app,
        "GET",
        &format!("/api/blockchains/{}/build", id),
        Some("user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["kind"], "build");
}

#[tokio::test]
async fn test_deploy_without_build_is_bad_request() {
    let app = create_test_app();
    let id = register(&app, "ABC").await;

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/blockchains/{}/deploy", id),
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.entry_count().await, 0);
}

#[tokio::test]
async fn test_deploy_after_build_links_parent() {
    let app = create_test_app();
    let id = register(&app, "ABC").await;

    app.drone
        .reply(json!({ "id": 55, "number": 3, "status": "pending" }));
    let (_, build) = call(
        &app,
        "POST",
        &format!("/api/blockchains/{}/build", id),
        Some("admin"),
        None,
    )
    .await;

    app.drone
        .reply(json!({ "id": 56, "number": 4, "status": "pending" }));
    let (status, json) = call(
        &app,
        "POST",
        &format!("/api/blockchains/{}/deploy", id),
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["entry"]["kind"], "deploy");
    assert_eq!(json["entry"]["status"], "deploying");
    assert_eq!(json["entry"]["parent_build_id"], build["entry"]["id"]);
    assert_eq!(json["entry"]["parent_build_number"], 3);

    let (status, json) = call(
        &app,
        "GET",
        &format!("/api/blockchains/{}/lifecycle", id),
        Some("user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "created");
    let lanes = json["lanes"].as_array().unwrap();
    let deploy = lanes.iter().find(|l| l["kind"] == "deploy").unwrap();
    assert_eq!(deploy["active"], true);
    assert_eq!(deploy["latest"]["build_no"], 4);
}

#[tokio::test]
async fn test_gateway_failure_on_probe_is_bad_gateway() {
    let app = create_test_app();
    let id = register(&app, "ABC").await;

    app.drone
        .reply(json!({ "id": 55, "number": 3, "status": "pending" }));
    call(
        &app,
        "POST",
        &format!("/api/blockchains/{}/build", id),
        Some("admin"),
        None,
    )
    .await;

    app.drone.fail(GatewayError::Http {
        status: 503,
        body: None,
    });
    let (status, json) = call(
        &app,
        "POST",
        &format!("/api/blockchains/{}/build", id),
        Some("admin"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["kind"], "http_error");
    assert_eq!(json["status_code"], 503);
    assert_eq!(app.store.entry_count().await, 1);
}

#[tokio::test]
async fn test_malformed_ci_response_is_accepted_with_anomaly() {
    let app = create_test_app();
    let id = register(&app, "ABC").await;

    app.drone.reply(json!({ "message": "queued" }));
    let (status, json) = call(
        &app,
        "POST",
        &format!("/api/blockchains/{}/build", id),
        Some("admin"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["outcome"], "remote_anomaly");
    assert_eq!(json["entry"]["status"], "created");
    assert_eq!(json["entry"]["build_no"], 0);
}

#[tokio::test]
async fn test_unknown_kind_and_update_are_rejected() {
    let app = create_test_app();
    let id = register(&app, "ABC").await;

    for kind in ["rollback", "update"] {
        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/blockchains/{}/{}", id, kind),
            Some("admin"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "kind {}", kind);
    }
}

#[tokio::test]
async fn test_job_status_passthrough() {
    let app = create_test_app();
    let id = register(&app, "ABC").await;

    app.drone
        .reply(json!({ "id": 55, "number": 3, "status": "pending" }));
    let (_, build) = call(
        &app,
        "POST",
        &format!("/api/blockchains/{}/build", id),
        Some("admin"),
        None,
    )
    .await;
    let entry_id = build["entry"]["id"].as_u64().unwrap();

    app.drone
        .reply(json!({ "id": 55, "number": 3, "status": "success" }));
    let (status, json) = call(
        &app,
        "GET",
        &format!("/api/jobs/{}/status", entry_id),
        Some("user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["build_no"], 3);
    assert_eq!(json["remote"]["status"], "success");

    let (status, json) = call(
        &app,
        "GET",
        &format!("/api/jobs/{}", entry_id),
        Some("user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "running");

    let (status, _) = call(&app, "GET", "/api/jobs/999", Some("user"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_set_status_and_soft_delete() {
    let app = create_test_app();
    let id = register(&app, "ABC").await;

    let (status, json) = call(
        &app,
        "PUT",
        &format!("/api/blockchains/{}/status", id),
        Some("admin"),
        Some(json!({ "status": "suspended" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "suspended");

    let (status, json) = call(
        &app,
        "DELETE",
        &format!("/api/blockchains/{}", id),
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted"], true);
    assert_eq!(json["deleted_by"], "admin@example.com");

    let (status, _) = call(
        &app,
        "GET",
        &format!("/api/blockchains/{}", id),
        Some("user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = call(&app, "GET", "/api/blockchains", Some("user"), None).await;
    assert_eq!(json["total"], 0);

    // The record is kept
    assert!(app.store.get_blockchain(id).await.unwrap().unwrap().deleted);
}

#[tokio::test]
async fn test_reported_status_ends_the_lane() {
    let app = create_test_app();
    let id = register(&app, "ABC").await;

    app.drone
        .reply(json!({ "id": 55, "number": 3, "status": "pending" }));
    let (_, build) = call(
        &app,
        "POST",
        &format!("/api/blockchains/{}/build", id),
        Some("admin"),
        None,
    )
    .await;
    let entry_id = build["entry"]["id"].as_u64().unwrap();
    let uri = format!("/api/jobs/{}/status", entry_id);

    let (status, _) = call(
        &app,
        "PUT",
        &uri,
        Some("user"),
        Some(json!({ "status": "failure" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = call(
        &app,
        "PUT",
        &uri,
        Some("admin"),
        Some(json!({ "status": "failure" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], entry_id);
    assert_eq!(json["status"], "failure");
    assert_eq!(json["build_no"], 3);

    let (_, json) = call(
        &app,
        "GET",
        &format!("/api/blockchains/{}/lifecycle", id),
        Some("user"),
        None,
    )
    .await;
    let lanes = json["lanes"].as_array().unwrap();
    let build_lane = lanes.iter().find(|l| l["kind"] == "build").unwrap();
    assert_eq!(build_lane["active"], false);
    assert_eq!(build_lane["latest"]["status"], "failure");

    // A finished lane starts a fresh entry without asking the CI server first
    app.drone
        .reply(json!({ "id": 70, "number": 5, "status": "pending" }));
    let (status, json) = call(
        &app,
        "POST",
        &format!("/api/blockchains/{}/build", id),
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(json["entry"]["id"], entry_id);
    assert_eq!(app.store.entry_count().await, 2);
    assert_eq!(app.drone.request_count(), 2);

    let (status, _) = call(
        &app,
        "PUT",
        "/api/jobs/999/status",
        Some("admin"),
        Some(json!({ "status": "success" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
