//! # Engine Bootstrap
//!
//! Turns an [`AppConfig`] into a running [`DispatchEngine`]:
//!
//! 1. **Load the pricing catalog** if `PRICING_CATALOG` is set, otherwise
//!    use the standard tariff with an empty promo registry.
//! 2. **Pick the candidate directory**: the HTTP ranking service when
//!    `CANDIDATE_DIRECTORY_URL` is set, else the static roster.
//! 3. **Wire the event sink**: metrics counters in front of the tracing sink.

use std::sync::Arc;

use thiserror::Error;

use sakay_dispatch::{
    CandidateDirectory, DirectoryError, DispatchEngine, StaticDirectory, TracingSink,
};
use sakay_pricing::{CatalogError, PromoBook, RegisterError, Tariff};

use crate::config::AppConfig;
use crate::directory::HttpCandidateDirectory;
use crate::telemetry::MetricsSink;

/// Errors during startup.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The pricing catalog could not be loaded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The catalog's tariff or promos were refused.
    #[error("pricing catalog rejected: {0}")]
    Pricing(String),

    /// The HTTP directory client could not be built.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl From<RegisterError> for BootstrapError {
    fn from(err: RegisterError) -> Self {
        Self::Pricing(err.to_string())
    }
}

/// Build the engine described by `config`.
pub fn build_engine(config: &AppConfig) -> Result<DispatchEngine, BootstrapError> {
    let (tariff, promos) = match &config.pricing_catalog {
        Some(path) => {
            let catalog = sakay_pricing::PricingCatalog::from_path(path)?;
            let tariff = catalog
                .tariff()
                .map_err(|e| BootstrapError::Pricing(e.to_string()))?;
            let promos = PromoBook::with_promos(catalog.promos)?;
            tracing::info!(
                path = %path.display(),
                promos = promos.list().len(),
                "pricing catalog loaded"
            );
            (tariff, promos)
        }
        None => (Tariff::standard(), PromoBook::new()),
    };

    let directory: Arc<dyn CandidateDirectory> = match &config.candidate_directory_url {
        Some(url) => {
            tracing::info!(url = %url, "using HTTP candidate directory");
            Arc::new(HttpCandidateDirectory::new(url)?)
        }
        None => {
            if config.static_candidates.is_empty() {
                tracing::warn!("no candidate directory configured; dispatch will find nobody");
            }
            Arc::new(StaticDirectory::new(config.static_candidates.clone()))
        }
    };

    Ok(DispatchEngine::builder()
        .config(config.engine())
        .tariff(tariff)
        .promos(Arc::new(promos))
        .directory(directory)
        .sink(Arc::new(MetricsSink::new(Arc::new(TracingSink))))
        .build())
}
