//! # HTTP Middleware
//!
//! - `metrics`: per-request counters.
//! - `tracing_layer`: request spans via `tower-http`.

pub mod metrics;
pub mod tracing_layer;
