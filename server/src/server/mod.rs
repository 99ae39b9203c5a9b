//! HTTP and WebSocket surface of the load-simulation server

pub mod routes;
pub mod websocket;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::config::{Config, LoadConfig, WsConfig};
use crate::load::LoadSimulator;

pub use routes::{ApiError, complex_handler, health, load_test_http_handler, method_not_allowed};
pub use websocket::ws_handler;

/// Shared application state. Immutable after startup; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub simulator: Arc<LoadSimulator>,
    pub ws_config: Arc<WsConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            simulator: Arc::new(LoadSimulator::new(LoadConfig::default())),
            ws_config: Arc::new(WsConfig::default()),
            started_at: Instant::now(),
        }
    }

    /// Build state from a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .with_load_config(config.load.clone())
            .with_ws_config(config.ws.clone())
    }

    /// Replace the load-simulation settings
    pub fn with_load_config(mut self, load: LoadConfig) -> Self {
        self.simulator = Arc::new(LoadSimulator::new(load));
        self
    }

    /// Replace the WebSocket settings
    pub fn with_ws_config(mut self, ws: WsConfig) -> Self {
        self.ws_config = Arc::new(ws);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the load-simulation router: `/ws`, `/complex`, `/load-test-http` and `/health`
pub fn load_routes(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route(
            "/complex",
            post(complex_handler).fallback(method_not_allowed),
        )
        .route(
            "/load-test-http",
            post(load_test_http_handler).fallback(method_not_allowed),
        )
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
