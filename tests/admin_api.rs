//! Admin API over the axum router, without binding a socket.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use lbaas::admin::{setup_admin_router, AdminState};
use lbaas::apply::{AtomicWriter, BuildOptions, Invoker};
use lbaas::coordinator::Coordinator;
use lbaas::driver::HaproxyDriver;
use lbaas::store::Store;

mod common;

fn router(config_path: std::path::PathBuf) -> Router {
    let driver = HaproxyDriver::new(
        Store::in_memory(),
        AtomicWriter::new(config_path),
        Invoker::Disabled,
        BuildOptions::default(),
    );
    setup_admin_router(
        AdminState {
            coordinator: Coordinator::new(Arc::new(driver)),
        },
        Duration::from_secs(10),
    )
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_crud_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(common::config_path(dir.path()));

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/listeners",
        Some(json!({"name": "web", "protocol": "http", "port": 80})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["listener"]["name"], "web");
    assert_eq!(body["listener"]["algorithm"], "roundrobin");
    assert_eq!(body["revision"], 1);
    assert_eq!(body["apply"]["ok"], true);

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/listeners/web/members",
        Some(json!({"name": "m1", "address": "10.0.0.1", "port": 8080, "tags": ["b", "a"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["member"]["tags"], json!(["a", "b"]));

    let (status, body) = call(
        &app,
        Method::PUT,
        "/v1/listeners/web",
        Some(json!({"port": 8081})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["listener"]["port"], 8081);

    let config = common::read_config(dir.path());
    assert!(config.contains("listen web 0.0.0.0:8081\n"));
    assert!(config.contains("\tserver m1 10.0.0.1:8080 check\n"));

    let (status, body) = call(&app, Method::GET, "/v1/listeners", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["members"][0]["name"], "m1");

    let (status, body) = call(&app, Method::GET, "/v1/members/m1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["port"], 8080);

    let (status, _) = call(&app, Method::DELETE, "/v1/members/m1", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&app, Method::DELETE, "/v1/listeners/web", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], "web");

    let (status, body) = call(&app, Method::GET, "/v1/listeners/web", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = call(&app, Method::GET, "/v1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["diverged"], false);
    assert_eq!(body["store_revision"], 5);
}

#[tokio::test]
async fn test_error_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(common::config_path(dir.path()));

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/listeners",
        Some(json!({"name": "web", "protocol": "udp", "port": 80})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/listeners",
        Some(json!({"name": "web", "protocol": "http"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    call(
        &app,
        Method::POST,
        "/v1/listeners",
        Some(json!({"name": "web", "protocol": "http", "port": 80})),
    )
    .await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/listeners",
        Some(json!({"name": "web", "protocol": "tcp", "port": 81})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_entry");

    let (status, _) = call(
        &app,
        Method::POST,
        "/v1/listeners/ghost/members",
        Some(json!({"name": "m1", "address": "10.0.0.1", "port": 80})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    call(
        &app,
        Method::POST,
        "/v1/listeners/web/members",
        Some(json!({"name": "m1", "address": "10.0.0.1", "port": 80})),
    )
    .await;
    let (status, body) = call(&app, Method::DELETE, "/v1/listeners/web", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "listener_not_empty");
}

#[tokio::test]
async fn test_apply_failure_reported_with_mutation() {
    let dir = tempfile::tempdir().unwrap();
    // Parent directory does not exist, so every apply fails to write.
    let app = router(dir.path().join("missing").join("haproxy.cfg"));

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/listeners",
        Some(json!({"name": "web", "protocol": "http", "port": 80})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["apply"]["ok"], false);
    assert_eq!(body["apply"]["error"]["error"], "write");

    let (status, body) = call(&app, Method::POST, "/v1/apply", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "write");

    let (_, body) = call(&app, Method::GET, "/v1/status", None).await;
    assert_eq!(body["diverged"], true);
    assert_eq!(body["pending"].as_array().unwrap().len(), 1);

    std::fs::create_dir(dir.path().join("missing")).unwrap();
    let (status, body) = call(&app, Method::POST, "/v1/apply", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revision"], 1);
}
