use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{error, info, info_span, instrument};
use uuid::Uuid;

/// Per-request tracing span plus a completion log line, adapted from the
/// teacher's HTTP logging middleware: a UUID request id, a span wrapping
/// the downstream call, and severity chosen from the response status.
#[instrument(skip(request, next))]
pub async fn logging_middleware(mut request: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();

    request.headers_mut().insert("x-request-id", request_id.parse().expect("uuid is a valid header value"));

    let span = info_span!("http_request", request_id = %request_id, method = %method, uri = %uri);
    let response = span.in_scope(|| next.run(request)).await;

    let status = response.status();
    let duration_ms = start.elapsed().as_millis();
    if status.is_server_error() {
        error!(request_id = %request_id, %status, duration_ms, "request failed with server error");
    } else if status.is_client_error() {
        error!(request_id = %request_id, %status, duration_ms, "request failed with client error");
    } else {
        info!(request_id = %request_id, %status, duration_ms, "request completed");
    }

    response
}
