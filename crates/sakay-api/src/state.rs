//! # Application State
//!
//! Shared by every handler. Cloning is cheap; the engine and the metrics
//! handle are reference-counted.

use metrics_exporter_prometheus::PrometheusHandle;

use sakay_dispatch::DispatchEngine;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// The request service and dispatch coordinator.
    pub engine: DispatchEngine,
    /// Renders `/metrics`. Absent when no recorder was installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// State around `engine`, without a metrics exporter.
    pub fn new(engine: DispatchEngine) -> Self {
        Self {
            engine,
            metrics: None,
        }
    }

    /// Attach the Prometheus handle served at `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
