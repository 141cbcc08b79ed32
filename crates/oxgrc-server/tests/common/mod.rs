#![allow(dead_code)]

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use oxgrc_ai::NarrativeService;
use oxgrc_server::app;
use oxgrc_server::auth::hash_password;
use oxgrc_server::config::ServerConfig;
use oxgrc_server::state::AppState;
use oxgrc_storage::GrcStore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

pub fn build_test_context() -> Result<TestContext> {
    oxgrc_common::id::init(1, 1);

    let temp_dir = tempfile::tempdir()?;
    let store = Arc::new(GrcStore::new(temp_dir.path())?);

    let password_hash = hash_password("changeme")?;
    let _ = store.create_user("admin", &password_hash)?;

    let config = ServerConfig {
        http_port: 8080,
        data_dir: temp_dir.path().to_string_lossy().to_string(),
        uploads_dir: temp_dir
            .path()
            .join("uploads")
            .to_string_lossy()
            .to_string(),
        machine_id: 1,
        node_id: 1,
        auth: Default::default(),
        ai: Default::default(),
    };

    let state = AppState {
        store,
        analyzer: Arc::new(NarrativeService::disabled()),
        uploads_dir: Arc::new(temp_dir.path().join("uploads")),
        start_time: Utc::now(),
        jwt_secret: Arc::new("test-secret".to_string()),
        token_expire_secs: 3600,
        config: Arc::new(config),
    };

    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
    })
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder = builder.header("Content-Type", "application/json");

    let req_body = body.unwrap_or(Value::Null).to_string();
    let req = builder
        .body(Body::from(req_body))
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let req = builder.body(Body::empty()).expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub async fn login_and_get_token(app: &axum::Router) -> String {
    let (status, body, _) = request_json(
        app,
        "POST",
        "/v1/auth/login",
        None,
        Some(serde_json::json!({
            "username": "admin",
            "password": "changeme",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["err_code"], 0);
    body["data"]["token"]
        .as_str()
        .expect("token should exist")
        .to_string()
}

pub fn assert_ok_envelope(json: &Value) {
    assert_eq!(json["err_code"], 0);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
}

pub fn assert_err_envelope(json: &Value, err_code: i32) {
    assert_eq!(json["err_code"], err_code);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
    assert!(json.get("data").is_some());
    assert!(json["data"].is_null());
}

pub fn decode_data<T: DeserializeOwned>(json: &Value) -> T {
    serde_json::from_value(json["data"].clone()).expect("data should decode")
}

/// 建一个框架并返回其 ID
pub async fn create_framework(app: &axum::Router, token: &str, name: &str) -> String {
    let (status, body, _) = request_json(
        app,
        "POST",
        "/v1/frameworks",
        Some(token),
        Some(serde_json::json!({
            "name": name,
            "description": "test framework",
            "version": "2022",
            "category": "Security",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"]
        .as_str()
        .expect("framework id should exist")
        .to_string()
}

/// 在框架下建一个控制项并返回其 ID
pub async fn create_framework_control(
    app: &axum::Router,
    token: &str,
    framework_id: &str,
    control_id: &str,
) -> String {
    let (status, body, _) = request_json(
        app,
        "POST",
        &format!("/v1/frameworks/{framework_id}/controls"),
        Some(token),
        Some(serde_json::json!({
            "control_id": control_id,
            "title": format!("Control {control_id}"),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"]
        .as_str()
        .expect("framework control id should exist")
        .to_string()
}

/// 建一个统一控制并返回其 ID
pub async fn create_unified_control(app: &axum::Router, token: &str, ccf_id: &str) -> String {
    let (status, body, _) = request_json(
        app,
        "POST",
        "/v1/unified-controls",
        Some(token),
        Some(serde_json::json!({
            "ccf_id": ccf_id,
            "name": format!("Unified {ccf_id}"),
            "control_type": "Preventive",
            "frequency": "Quarterly",
            "owner": "IAM Team",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"]
        .as_str()
        .expect("unified control id should exist")
        .to_string()
}
