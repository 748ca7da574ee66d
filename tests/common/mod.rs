#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use calcd::app::build_app;
use calcd::auth::JwtKeys;
use calcd::calculator;
use calcd::config::{AppConfig, JwtConfig, StoreBackend};
use calcd::grpc::{ComputeClient, ComputeError};
use calcd::state::AppState;
use calcd::storage::{MemoryStore, Store};

pub fn test_config() -> AppConfig {
    AppConfig {
        store: StoreBackend::Memory,
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "calcd-test".into(),
            audience: "calcd-test-users".into(),
            ttl_minutes: 60,
        },
        host: "127.0.0.1".into(),
        port: 0,
        agent_addr: "http://127.0.0.1:50051".into(),
        job_timeout: Duration::from_secs(5),
        shutdown_grace: Duration::from_secs(5),
    }
}

/// Evaluates in-process, standing in for the agent.
pub struct LocalCompute;

#[async_trait]
impl ComputeClient for LocalCompute {
    async fn evaluate(&self, expression: &str, _: i64, _: Duration) -> Result<f64, ComputeError> {
        calculator::evaluate(expression, &CancellationToken::new())
            .map_err(|e| ComputeError::Rejected(e.to_string()))
    }

    async fn ping(&self) -> Result<(), ComputeError> {
        Ok(())
    }
}

/// An agent that cannot be reached.
pub struct DownCompute;

#[async_trait]
impl ComputeClient for DownCompute {
    async fn evaluate(&self, _: &str, _: i64, _: Duration) -> Result<f64, ComputeError> {
        Err(ComputeError::Unavailable("connection refused".into()))
    }

    async fn ping(&self) -> Result<(), ComputeError> {
        Err(ComputeError::Unavailable("connection refused".into()))
    }
}

pub fn test_state(compute: Arc<dyn ComputeClient>) -> AppState {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    AppState::from_parts(store, compute, Arc::new(test_config()))
}

pub fn test_app(state: &AppState) -> Router {
    build_app(state.clone())
}

/// Sends one request through the router and decodes the JSON body
/// (`Value::Null` when there is none).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

pub async fn register_and_login(app: &Router, login: &str, password: &str) -> String {
    let credentials = json!({ "login": login, "password": password });
    let (status, _) = send(app, "POST", "/api/v1/register", None, Some(credentials.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(app, "POST", "/api/v1/login", None, Some(credentials)).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

pub async fn submit(app: &Router, token: &str, expression: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/v1/calculate",
        Some(token),
        Some(json!({ "expression": expression })),
    )
    .await
}

/// Polls a job until it leaves `pending`.
pub async fn wait_terminal(app: &Router, token: &str, id: i64) -> Value {
    let uri = format!("/api/v1/expressions/{id}");
    for _ in 0..200 {
        let (status, body) = send(app, "GET", &uri, Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] != "pending" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {id} stayed pending");
}

pub fn expired_token(user_id: i64) -> String {
    let mut jwt = test_config().jwt;
    jwt.ttl_minutes = -10;
    JwtKeys::new(&jwt).sign(user_id).unwrap()
}
