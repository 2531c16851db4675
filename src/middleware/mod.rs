// Request id, tracing, and timeout middleware

use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Upper bound on handling a single inbound request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Request id middleware
///
/// Reuses the caller's `x-request-id` when present, otherwise generates one.
/// The id is echoed on the response and attached to every log line emitted
/// while handling the request.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let Ok(value) = HeaderValue::from_str(&request_id) else {
        return next.run(request).await;
    };
    request.headers_mut().insert(REQUEST_ID_HEADER, value.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path()
    );

    let mut response = next.run(request).instrument(span).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, value);
    response
}

/// HTTP tracing layer
pub fn trace_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
}

/// Request timeout layer; timed out requests get `408`
pub fn timeout_layer() -> TimeoutLayer {
    TimeoutLayer::new(REQUEST_TIMEOUT)
}
