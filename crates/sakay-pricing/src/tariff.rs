//! # Tariffs
//!
//! Per-class rates. The standard tariff:
//!
//! | class      | base  | per km | per minute |
//! |------------|-------|--------|------------|
//! | motorcycle | ₱40   | ₱8     | ₱1         |
//! | car        | ₱60   | ₱14    | ₱2         |
//! | suv        | ₱80   | ₱18    | ₱3         |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sakay_core::{Money, ValidationError, VehicleClass};

use crate::error::PricingError;

/// Rates for one vehicle class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRate {
    /// Flat fare charged on every trip.
    pub base: Money,
    /// Charge per kilometre travelled.
    pub per_km: Money,
    /// Charge per minute of trip duration.
    pub per_minute: Money,
}

impl VehicleRate {
    /// Rates given in whole pesos.
    pub const fn pesos(base: i64, per_km: i64, per_minute: i64) -> Self {
        Self {
            base: Money::from_pesos(base),
            per_km: Money::from_pesos(per_km),
            per_minute: Money::from_pesos(per_minute),
        }
    }

    fn validate(&self, class: VehicleClass) -> Result<(), ValidationError> {
        for (field, value) in [
            ("base", self.base),
            ("per_km", self.per_km),
            ("per_minute", self.per_minute),
        ] {
            if value.centavos() < 0 {
                return Err(ValidationError::Invalid(format!(
                    "{class} {field} rate must not be negative"
                )));
            }
        }
        Ok(())
    }
}

/// The full set of per-class rates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tariff {
    rates: BTreeMap<VehicleClass, VehicleRate>,
}

impl Tariff {
    /// The standard tariff.
    pub fn standard() -> Self {
        let rates = BTreeMap::from([
            (VehicleClass::Motorcycle, VehicleRate::pesos(40, 8, 1)),
            (VehicleClass::Car, VehicleRate::pesos(60, 14, 2)),
            (VehicleClass::Suv, VehicleRate::pesos(80, 18, 3)),
        ]);
        Self { rates }
    }

    /// The standard tariff with `overrides` replacing individual classes.
    pub fn with_overrides(
        overrides: impl IntoIterator<Item = (VehicleClass, VehicleRate)>,
    ) -> Result<Self, ValidationError> {
        let mut tariff = Self::standard();
        for (class, rate) in overrides {
            rate.validate(class)?;
            tariff.rates.insert(class, rate);
        }
        Ok(tariff)
    }

    /// The rate for `class`.
    pub fn rate(&self, class: VehicleClass) -> Result<&VehicleRate, PricingError> {
        self.rates
            .get(&class)
            .ok_or(PricingError::UnknownVehicleClass(class))
    }

    /// Iterate over configured classes and their rates.
    pub fn iter(&self) -> impl Iterator<Item = (VehicleClass, &VehicleRate)> {
        self.rates.iter().map(|(class, rate)| (*class, rate))
    }
}

impl Default for Tariff {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_tariff_covers_every_class() {
        let tariff = Tariff::standard();
        for class in VehicleClass::ALL {
            assert!(tariff.rate(class).is_ok());
        }
        assert_eq!(tariff.rate(VehicleClass::Car).unwrap().base, Money::from_pesos(60));
    }

    #[test]
    fn overrides_replace_single_classes() {
        let tariff =
            Tariff::with_overrides([(VehicleClass::Suv, VehicleRate::pesos(100, 20, 4))]).unwrap();
        assert_eq!(tariff.rate(VehicleClass::Suv).unwrap().per_km, Money::from_pesos(20));
        assert_eq!(tariff.rate(VehicleClass::Motorcycle).unwrap().base, Money::from_pesos(40));
    }

    #[test]
    fn negative_rates_are_rejected() {
        let bad = VehicleRate {
            base: Money::from_centavos(-1),
            per_km: Money::ZERO,
            per_minute: Money::ZERO,
        };
        assert!(Tariff::with_overrides([(VehicleClass::Car, bad)]).is_err());
    }
}
