//! # Service Configuration
//!
//! Read once at startup from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `PORT` | `8080` |
//! | `OFFER_WINDOW_SECS` | `30` |
//! | `PRICING_CATALOG` | unset (standard tariff, no promos) |
//! | `CANDIDATE_DIRECTORY_URL` | unset |
//! | `STATIC_CANDIDATES` | unset (comma-separated fulfiller ids) |
//! | `LOG_FORMAT` | `text` (`json` for structured logs) |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use sakay_core::FulfillerId;
use sakay_dispatch::EngineConfig;

/// A variable was set to something unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {var}={value:?}: {reason}")]
pub struct ConfigError {
    /// The variable name.
    pub var: &'static str,
    /// What it was set to.
    pub value: String,
    /// Why it was refused.
    pub reason: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Runtime configuration for the HTTP service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Port to bind.
    pub port: u16,
    /// How long a candidate has to answer an offer.
    pub offer_window: Duration,
    /// YAML catalog with the tariff and seed promos.
    pub pricing_catalog: Option<PathBuf>,
    /// Base URL of the external candidate ranking service.
    pub candidate_directory_url: Option<String>,
    /// Fixed roster used when no directory URL is set.
    pub static_candidates: Vec<FulfillerId>,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            offer_window: EngineConfig::DEFAULT_OFFER_WINDOW,
            pricing_catalog: None,
            candidate_directory_url: None,
            static_candidates: Vec::new(),
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from any variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(value) = get("PORT") {
            config.port = value.parse().map_err(|_| ConfigError {
                var: "PORT",
                value: value.clone(),
                reason: "expected a port number".into(),
            })?;
        }

        if let Some(value) = get("OFFER_WINDOW_SECS") {
            let secs: u64 = value.parse().map_err(|_| ConfigError {
                var: "OFFER_WINDOW_SECS",
                value: value.clone(),
                reason: "expected a whole number of seconds".into(),
            })?;
            if secs == 0 {
                return Err(ConfigError {
                    var: "OFFER_WINDOW_SECS",
                    value,
                    reason: "the window must be at least one second".into(),
                });
            }
            config.offer_window = Duration::from_secs(secs);
        }

        config.pricing_catalog = get("PRICING_CATALOG").map(PathBuf::from);
        config.candidate_directory_url = get("CANDIDATE_DIRECTORY_URL");

        if let Some(value) = get("STATIC_CANDIDATES") {
            config.static_candidates = value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(FulfillerId::new)
                .collect::<Result<_, _>>()
                .map_err(|err| ConfigError {
                    var: "STATIC_CANDIDATES",
                    value: value.clone(),
                    reason: err.to_string(),
                })?;
        }

        if let Some(value) = get("LOG_FORMAT") {
            config.log_format = match value.to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError {
                        var: "LOG_FORMAT",
                        value,
                        reason: "expected text or json".into(),
                    })
                }
            };
        }

        Ok(config)
    }

    /// The engine tunables derived from this configuration.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig::default().with_offer_window(self.offer_window)
    }
}
