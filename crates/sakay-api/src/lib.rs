//! # sakay-api: HTTP Service for the Dispatch Engine
//!
//! Exposes [`DispatchEngine`](sakay_dispatch::DispatchEngine) over Axum.
//! Handlers translate HTTP into engine calls and engine errors into
//! structured responses; no lifecycle rule lives here.
//!
//! ## API Surface
//!
//! | Prefix            | Module                 | Domain                    |
//! |-------------------|------------------------|---------------------------|
//! | `/v1/requests/*`  | [`routes::requests`]   | Bookings and orders       |
//! | `/v1/offers/*`    | [`routes::offers`]     | Candidate responses       |
//! | `/v1/quotes`      | [`routes::quotes`]     | Fare estimates            |
//! | `/v1/promos/*`    | [`routes::promos`]     | Promo registry            |
//! | `/health/*`       | here                   | Probes                    |
//! | `/metrics`        | here                   | Prometheus exposition     |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → Handler
//! ```
//!
//! Callers are identified by the gateway headers read by
//! [`extractors::Principal`]; every `/v1` route requires them.

pub mod bootstrap;
pub mod config;
pub mod directory;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

pub use error::AppError;
pub use state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::requests::router())
        .merge(routes::offers::router())
        .merge(routes::quotes::router())
        .merge(routes::promos::router())
        .merge(openapi::router())
        .route("/metrics", get(metrics))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: the engine is built before the listener binds.
async fn readiness() -> &'static str {
    "ready"
}

/// Prometheus text exposition.
async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
