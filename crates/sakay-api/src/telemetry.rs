//! # Logging and Metrics
//!
//! Subscriber setup for the binary and the [`MetricsSink`] that turns engine
//! events into Prometheus counters:
//!
//! - `sakay_transitions_total{to}`
//! - `sakay_offers_total{outcome}`
//! - `sakay_dispatch_exhausted_total`

use std::sync::Arc;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

use sakay_dispatch::{EngineEvent, EventSink};

use crate::config::LogFormat;

/// Install the global tracing subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Install the Prometheus recorder and describe the engine counters.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_counter!("sakay_transitions_total", "Request status transitions by target status");
    describe_counter!("sakay_offers_total", "Dispatch offers by outcome");
    describe_counter!(
        "sakay_dispatch_exhausted_total",
        "Dispatch runs that ran out of candidates"
    );
    describe_counter!("sakay_http_requests_total", "HTTP responses by method and status");
    Ok(handle)
}

/// Counts events, then forwards them.
pub struct MetricsSink {
    inner: Arc<dyn EventSink>,
}

impl MetricsSink {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn EventSink>) -> Self {
        Self { inner }
    }
}

impl EventSink for MetricsSink {
    fn publish(&self, event: EngineEvent) {
        match &event {
            EngineEvent::Transition { to_status, .. } => {
                counter!("sakay_transitions_total", "to" => to_status.as_str()).increment(1);
            }
            EngineEvent::OfferCreated { .. } => {
                counter!("sakay_offers_total", "outcome" => "pending").increment(1);
            }
            EngineEvent::OfferResolved { outcome, .. } => {
                counter!("sakay_offers_total", "outcome" => outcome.as_str()).increment(1);
            }
            EngineEvent::NoCandidatesAvailable { .. } => {
                counter!("sakay_dispatch_exhausted_total").increment(1);
            }
        }
        self.inner.publish(event);
    }
}
