mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use calcd::config::AgentConfig;
use calcd::grpc::{AgentServer, ComputeClient, ComputeError, GrpcComputeClient};

use common::{register_and_login, send, submit, test_app, test_state, wait_terminal};

/// Starts a real agent on an ephemeral port.
async fn start_agent(eval_timeout: Duration) -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();

    let config = AgentConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        eval_timeout,
    };
    let server = AgentServer::new(&config);
    let token = shutdown.clone();
    tokio::spawn(async move {
        server.run(listener, token).await.unwrap();
    });

    (addr, shutdown)
}

fn client_for(addr: SocketAddr) -> GrpcComputeClient {
    GrpcComputeClient::connect_lazy(&format!("http://{addr}")).unwrap()
}

#[tokio::test]
async fn test_scenarios_against_real_agent() {
    let (addr, agent_shutdown) = start_agent(Duration::from_secs(15)).await;
    let state = test_state(Arc::new(client_for(addr)));
    let app = test_app(&state);

    // Register alice twice: first 201, second 409.
    let token = register_and_login(&app, "alice", "p").await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/register",
        None,
        Some(json!({ "login": "alice", "password": "p" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, first) = submit(&app, &token, "2+3*4").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, second) = submit(&app, &token, "(1+2)*(3+4)").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, third) = submit(&app, &token, "10/(5-5)").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = submit(&app, &token, "2+").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/calculate",
        None,
        Some(json!({ "expression": "1+1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let job = wait_terminal(&app, &token, first["id"].as_i64().unwrap()).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["result"], 14.0);

    let job = wait_terminal(&app, &token, second["id"].as_i64().unwrap()).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["result"], 21.0);

    let job = wait_terminal(&app, &token, third["id"].as_i64().unwrap()).await;
    assert_eq!(job["status"], "error");

    // Exactly the three accepted submissions were persisted.
    let (_, history) = send(&app, "GET", "/api/v1/expressions", Some(&token), None).await;
    assert_eq!(history.as_array().unwrap().len(), 3);

    let (_, health) = send(&app, "GET", "/api/v1/health", None, None).await;
    assert_eq!(health["agent"], "ok");

    assert!(state.jobs.shutdown(Duration::from_secs(5)).await);
    agent_shutdown.cancel();
}

#[tokio::test]
async fn test_grpc_client_error_mapping() {
    let (addr, agent_shutdown) = start_agent(Duration::from_millis(100)).await;
    let client = client_for(addr);

    client.ping().await.unwrap();
    assert_eq!(
        client.evaluate("2^10", 1, Duration::from_secs(5)).await.unwrap(),
        1024.0
    );

    let err = client
        .evaluate("1/(2-2)", 1, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, ComputeError::Rejected(ref msg) if msg.contains("division by zero")));

    // The agent's own cap fires first.
    let err = client
        .evaluate("1.0000001^99999999999", 1, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, ComputeError::DeadlineExceeded));

    agent_shutdown.cancel();
}

#[tokio::test]
async fn test_agent_shutdown_makes_it_unavailable() {
    let (addr, agent_shutdown) = start_agent(Duration::from_secs(15)).await;
    let client = client_for(addr);
    client.ping().await.unwrap();
    drop(client);

    agent_shutdown.cancel();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let fresh = client_for(addr);
    assert!(fresh.ping().await.is_err());
}
