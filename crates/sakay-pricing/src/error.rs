//! Pricing errors.

use thiserror::Error;

use sakay_core::{ValidationError, VehicleClass};

/// Errors produced while computing a fare.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// An input was malformed (negative distance, surge below 1).
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The tariff has no rate for the requested class.
    #[error("no tariff configured for vehicle class {0}")]
    UnknownVehicleClass(VehicleClass),

    /// A fare component does not fit in a centavo count.
    #[error("fare exceeds the representable range")]
    Overflow,
}
