//! HTTP route handlers for the load-simulation API

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{info, warn};

use super::AppState;
use crate::load::{LoadError, format_elapsed, now_rfc3339};
use crate::protocol::{
    ComplexRequest, ComplexResponse, LoadRequest, LoadTestResponse, LoadType, ResponseStatus,
};

/// Errors surfaced by the HTTP endpoints. Rendered as plain text with a trailing newline.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request method")]
    MethodNotAllowed,

    #[error("Invalid request body")]
    InvalidBody(#[source] serde_json::Error),

    #[error("Invalid load type")]
    InvalidLoadType(String),

    #[error("Internal server error")]
    Internal(String),
}

impl From<LoadError> for ApiError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::InvalidLoadType(kind) => ApiError::InvalidLoadType(kind),
            LoadError::ComputationFailed(reason) => ApiError::Internal(reason),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::InvalidBody(_) | ApiError::InvalidLoadType(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            ApiError::MethodNotAllowed => "method_not_allowed",
            ApiError::InvalidBody(_) => "invalid_body",
            ApiError::InvalidLoadType(_) => "invalid_load_type",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        metrics::counter!(
            "loadsim_invalid_requests_total",
            "transport" => "http",
            "reason" => self.reason()
        )
        .increment(1);

        (
            self.status(),
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            format!("{}\n", self),
        )
            .into_response()
    }
}

/// Decode the first JSON value of a body regardless of its declared content
/// type. Anything after that value is ignored, like a streaming decoder would.
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    T::deserialize(&mut deserializer).map_err(|e| {
        warn!("Rejecting request body: {}", e);
        ApiError::InvalidBody(e)
    })
}

/// Fallback for any method other than POST on the load endpoints
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// POST /complex - CPU loop plus simulated I/O wait
pub async fn complex_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ComplexResponse>, ApiError> {
    let request: ComplexRequest = decode_body(&body)?;

    info!(
        "Simulating resource utilization for message: {}",
        request.message
    );
    let outcome = state
        .simulator
        .run_complex(&request.message)
        .await
        .inspect_err(|e| tracing::error!("{}", e))?;

    metrics::counter!(
        "loadsim_load_runs_total",
        "transport" => "http",
        "load_type" => "complex"
    )
    .increment(1);

    Ok(Json(ComplexResponse {
        message: outcome.message,
        computation: outcome.computation,
        processing_time: format_elapsed(outcome.elapsed),
        timestamp: now_rfc3339(),
        status: ResponseStatus::Success,
    }))
}

/// POST /load-test-http - simple or medium load, answered in one JSON body
pub async fn load_test_http_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<LoadTestResponse>, ApiError> {
    let request: LoadRequest = decode_body(&body)?;
    let load_type: LoadType = request.load_type().inspect_err(|e| {
        warn!("{} for HTTP", e);
    })?;

    info!("Simulating {} load for HTTP", load_type);
    let outcome = state.simulator.run_http(load_type).await;

    metrics::counter!(
        "loadsim_load_runs_total",
        "transport" => "http",
        "load_type" => load_type.as_str()
    )
    .increment(1);

    Ok(Json(LoadTestResponse {
        message: outcome.message.to_string(),
        messages: outcome.messages,
        processing_time: format_elapsed(outcome.elapsed),
        timestamp: now_rfc3339(),
        status: ResponseStatus::Success,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// GET /health - liveness probe
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
