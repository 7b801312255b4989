//! Engine configuration.

use std::time::Duration;

/// Tunables for the dispatch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a candidate has to answer an offer.
    pub offer_window: Duration,
}

impl EngineConfig {
    /// The default offer window.
    pub const DEFAULT_OFFER_WINDOW: Duration = Duration::from_secs(30);

    /// Override the offer window.
    pub fn with_offer_window(mut self, window: Duration) -> Self {
        self.offer_window = window;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            offer_window: Self::DEFAULT_OFFER_WINDOW,
        }
    }
}
