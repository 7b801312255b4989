//! # sakay-cli: Command-Line Tool for the Dispatch Engine
//!
//! Offline pricing tools for operators:
//!
//! - `sakay quote`: price a trip with the standard tariff or a catalog.
//! - `sakay catalog`: validate a pricing catalog and summarise it.
//!
//! ```bash
//! sakay quote --distance-m 3200 --duration-s 720 --class motorcycle
//! sakay quote --distance-m 5400 --duration-s 1100 --class car --surge 1.5 --json
//! sakay catalog config/catalog.yaml
//! ```

pub mod catalog;
pub mod quote;

use std::path::Path;

use anyhow::{Context, Result};

use sakay_pricing::PricingCatalog;

/// Load `path` if given, else an empty catalog (standard tariff, no promos).
pub fn load_catalog(path: Option<&Path>) -> Result<PricingCatalog> {
    match path {
        Some(path) => PricingCatalog::from_path(path)
            .with_context(|| format!("loading catalog {}", path.display())),
        None => Ok(PricingCatalog::default()),
    }
}
