//! # HTTP Metrics
//!
//! Counts every response as `sakay_http_requests_total{method,status}`.
//! Recording is a no-op until a recorder is installed, so tests run
//! without one.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Middleware that counts requests by method and status.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::counter!(
        "sakay_http_requests_total",
        "method" => method,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}
