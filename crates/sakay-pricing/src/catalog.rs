//! # Pricing Catalogs
//!
//! YAML files carrying tariff overrides and seed promos:
//!
//! ```yaml
//! vehicle_classes:
//!   car: { base: "65.00", per_km: "15.00", per_minute: "2.00" }
//! promos:
//!   - code: FOODIE100
//!     discount: { type: fixed, amount: "100.00" }
//!     valid_from: "2026-01-01T00:00:00Z"
//!     valid_until: "2027-01-01T00:00:00Z"
//!     min_order_value: "300.00"
//!     per_user_cap: 1
//!     scope: food
//! ```
//!
//! Classes missing from `vehicle_classes` keep their standard rates.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sakay_core::{ValidationError, VehicleClass};

use crate::promo::PromoCode;
use crate::tariff::{Tariff, VehicleRate};

/// Errors loading a catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    Io {
        /// The catalog path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not a valid catalog document.
    #[error("failed to parse catalog {path}: {source}")]
    Yaml {
        /// The catalog path, or `<inline>` for string input.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_yaml::Error,
    },

    /// The document parsed but describes an invalid tariff or promo.
    #[error("invalid catalog {path}: {source}")]
    Invalid {
        /// The catalog path, or `<inline>` for string input.
        path: PathBuf,
        /// What was wrong.
        source: ValidationError,
    },
}

/// A tariff plus seed promos.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingCatalog {
    /// Per-class rate overrides.
    #[serde(default)]
    pub vehicle_classes: BTreeMap<VehicleClass, VehicleRate>,
    /// Promos to register at startup.
    #[serde(default)]
    pub promos: Vec<PromoCode>,
}

impl PricingCatalog {
    /// Load and validate a catalog file.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse and validate catalog YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        Self::parse(yaml, Path::new("<inline>"))
    }

    fn parse(yaml: &str, path: &Path) -> Result<Self, CatalogError> {
        let catalog: Self = serde_yaml::from_str(yaml).map_err(|source| CatalogError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        catalog.validate().map_err(|source| CatalogError::Invalid {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(catalog)
    }

    /// Check rates and promo definitions, including duplicate codes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.tariff()?;
        let mut seen = HashSet::new();
        for promo in &self.promos {
            promo.validate_definition()?;
            if !seen.insert(promo.key()) {
                return Err(ValidationError::Invalid(format!(
                    "promo {} is defined more than once",
                    promo.key()
                )));
            }
        }
        Ok(())
    }

    /// The standard tariff with this catalog's overrides applied.
    pub fn tariff(&self) -> Result<Tariff, ValidationError> {
        Tariff::with_overrides(self.vehicle_classes.iter().map(|(c, r)| (*c, *r)))
    }
}
