//! # Surge
//!
//! A surge multiplier is held in basis points (`10_000` = 1.0x) so fare
//! arithmetic stays integral. Demand signals are external; the engine asks a
//! [`SurgeSource`] for the multiplier at quote time.

use serde::{Deserialize, Serialize};

use sakay_core::{RequestType, Timestamp, ValidationError, VehicleClass};

/// A fare multiplier of at least 1.0, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SurgeMultiplier(u32);

impl SurgeMultiplier {
    /// Basis points in 1.0x.
    pub const BPS_PER_UNIT: u32 = 10_000;

    /// No surge.
    pub const NONE: SurgeMultiplier = SurgeMultiplier(Self::BPS_PER_UNIT);

    /// Highest accepted multiplier (10x).
    pub const MAX_BPS: u32 = 10 * Self::BPS_PER_UNIT;

    /// Construct from basis points. Values below 1.0x or above 10x are rejected.
    pub fn from_bps(bps: u32) -> Result<Self, ValidationError> {
        if bps < Self::BPS_PER_UNIT {
            return Err(ValidationError::Invalid(format!(
                "surge multiplier must be at least 1.0, got {}",
                f64::from(bps) / f64::from(Self::BPS_PER_UNIT)
            )));
        }
        if bps > Self::MAX_BPS {
            return Err(ValidationError::Invalid(format!(
                "surge multiplier must be at most 10.0, got {}",
                f64::from(bps) / f64::from(Self::BPS_PER_UNIT)
            )));
        }
        Ok(Self(bps))
    }

    /// Construct from a decimal multiplier such as `1.5`, rounded to 4 places.
    pub fn from_f64(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::Invalid(format!(
                "surge multiplier must be a finite number, got {value}"
            )));
        }
        let bps = (value * f64::from(Self::BPS_PER_UNIT)).round();
        if bps < 0.0 {
            return Self::from_bps(0);
        }
        if bps > f64::from(Self::MAX_BPS) {
            return Self::from_bps(u32::MAX);
        }
        Self::from_bps(bps as u32)
    }

    /// The multiplier in basis points.
    pub fn bps(&self) -> u32 {
        self.0
    }

    /// Whether the multiplier is above 1.0x.
    pub fn is_surging(&self) -> bool {
        self.0 > Self::BPS_PER_UNIT
    }

    /// The multiplier as a decimal.
    pub fn as_f64(&self) -> f64 {
        f64::from(self.0) / f64::from(Self::BPS_PER_UNIT)
    }
}

impl Default for SurgeMultiplier {
    fn default() -> Self {
        Self::NONE
    }
}

impl TryFrom<f64> for SurgeMultiplier {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_f64(value)
    }
}

impl From<SurgeMultiplier> for f64 {
    fn from(value: SurgeMultiplier) -> Self {
        value.as_f64()
    }
}

impl std::fmt::Display for SurgeMultiplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.as_f64())
    }
}

/// Supplies the surge multiplier for a request at quote time.
pub trait SurgeSource: Send + Sync {
    /// The multiplier for a request of `request_type` in `class` at `at`.
    fn multiplier(
        &self,
        request_type: RequestType,
        class: VehicleClass,
        at: Timestamp,
    ) -> SurgeMultiplier;
}

/// The same multiplier for every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatSurge(pub SurgeMultiplier);

impl SurgeSource for FlatSurge {
    fn multiplier(&self, _: RequestType, _: VehicleClass, _: Timestamp) -> SurgeMultiplier {
        self.0
    }
}
