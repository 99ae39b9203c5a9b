use axum::{Router, response::IntoResponse, routing::get};
use loadsim_server::config::{Config, OriginPolicy};
use loadsim_server::server::{AppState, load_routes};
use loadsim_server::telemetry::init_tracing;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tracing::{info, warn};

/// Prometheus metrics handle for exposing metrics in Prometheus format
static PROMETHEUS_HANDLE: std::sync::OnceLock<PrometheusHandle> = std::sync::OnceLock::new();

/// Endpoint to expose metrics in Prometheus format
async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing("loadsim_server=debug,loadsim=debug,tower_http=debug");

    // Initialize Prometheus metrics recorder (must be done before any metrics are recorded)
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            PROMETHEUS_HANDLE.set(handle).ok();
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    }

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        "Loaded configuration: host={}, port={}, time_unit={:?}",
        config.host, config.port, config.load.time_unit
    );
    if let Some(idle) = config.ws.idle_timeout {
        info!("WebSocket idle timeout: {:?}", idle);
    }
    if let OriginPolicy::AllowList(ref origins) = config.ws.origin_policy {
        info!("WebSocket origins restricted to: {:?}", origins);
    }

    let app_state = AppState::from_config(&config);

    let app = load_routes(app_state).merge(
        Router::new().route("/metrics/prometheus", get(prometheus_metrics)),
    );

    // Start the server
    let addr: SocketAddr = config.bind_addr().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
