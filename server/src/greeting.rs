//! Greeting server: one catch-all handler behind permissive CORS headers

use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Body returned for every non-preflight request
pub const GREETING: &str = "Hello from api.postprove.com!\n";

/// Answer preflights with an empty 200, everything else with the greeting
pub async fn greet(method: Method) -> Response {
    if method == Method::OPTIONS {
        debug!("Answering CORS preflight");
        return StatusCode::OK.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        GREETING,
    )
        .into_response()
}

/// Build the greeting router. Every method on every path reaches `greet`, and
/// every response carries the CORS headers.
///
/// `CorsLayer` is not used: it answers preflights itself and only adds the
/// allow-methods/allow-headers pair to preflight responses, while these headers
/// must be on every response, including plain OPTIONS without a preflight.
pub fn greeting_routes() -> Router {
    let cors_headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ));

    Router::new()
        .fallback(greet)
        .layer(cors_headers)
        .layer(TraceLayer::new_for_http())
}
