//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use loadsim_server::config::{LoadConfig, OriginPolicy, WsConfig};
use loadsim_server::server::{AppState, load_routes};
use std::net::SocketAddr;
use std::time::Duration;
use tower::util::ServiceExt;

/// Load settings with a 1ms time unit so paced runs finish quickly
pub fn fast_load_config() -> LoadConfig {
    LoadConfig {
        time_unit: Duration::from_millis(1),
        ..LoadConfig::default()
    }
}

/// Create a test application state with fast pacing
pub fn create_test_state() -> AppState {
    AppState::new().with_load_config(fast_load_config())
}

/// Create a test application router with all routes configured
pub fn create_test_app() -> Router {
    load_routes(create_test_state())
}

/// Send a request through the router and return status plus raw body
pub async fn send_request(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

/// Build a POST request with a JSON body
pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Start a test server on a random port
pub async fn start_test_server(state: AppState) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let app = load_routes(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, handle)
}

/// State that only accepts WebSocket upgrades from the given origin
#[allow(dead_code)]
pub fn create_restricted_state(origin: &str) -> AppState {
    create_test_state().with_ws_config(WsConfig {
        origin_policy: OriginPolicy::parse(origin),
        ..WsConfig::default()
    })
}

/// Initialize test logging for detailed output
#[allow(dead_code)]
pub fn init_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loadsim_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
