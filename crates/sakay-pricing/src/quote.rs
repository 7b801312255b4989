//! # Fare Quotes
//!
//! ```text
//! base      = per-class constant
//! distance  = km × per-km rate
//! time      = minutes × per-minute rate
//! surge     = (base + distance + time) × (multiplier − 1)
//! discount  = promo discount, capped by max_discount and by the subtotal
//! total     = max(0, base + distance + time + surge − discount)
//! ```
//!
//! Intermediate values are held exactly as integer multiples of
//! `1 / FINE_PER_CENTAVO` centavo. That denominator is divisible by every
//! factor the formula divides by (1000 m per km, 60 s per minute, and two
//! rounds of 10 000 basis points), so no precision is lost before rounding.
//! Each component is then rounded half-up to whole centavos once and the
//! total is derived from the rounded components, so the invariant above
//! holds to the centavo.

use serde::{Deserialize, Serialize};

use sakay_core::{Money, ValidationError, VehicleClass};

use crate::error::PricingError;
use crate::promo::{DiscountDescriptor, DiscountKind};
use crate::surge::SurgeMultiplier;
use crate::tariff::Tariff;

/// Sub-centavo units per centavo. Divisible by 3 000 × 10 000 × 10 000.
const FINE_PER_CENTAVO: i128 = 300_000_000_000;

const BPS: i128 = SurgeMultiplier::BPS_PER_UNIT as i128;

/// Trip measurements and class for a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteInput {
    /// Routed distance, from the geo provider.
    pub distance_meters: i64,
    /// Routed duration, from the geo provider.
    pub duration_seconds: i64,
    /// Vehicle or service class.
    pub vehicle_class: VehicleClass,
    /// Surge multiplier in effect.
    #[serde(default)]
    pub surge: SurgeMultiplier,
}

/// A priced fare. All components are non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareQuote {
    /// Flat per-class fare.
    pub base: Money,
    /// Distance charge.
    pub distance_portion: Money,
    /// Duration charge.
    pub time_portion: Money,
    /// Surge premium on top of the three portions above.
    pub surge_amount: Money,
    /// Promo discount, subtracted from the subtotal.
    pub discount_amount: Money,
    /// Amount payable.
    pub total: Money,
}

impl FareQuote {
    /// The pre-discount amount: `base + distance + time + surge`.
    pub fn subtotal(&self) -> Money {
        self.base + self.distance_portion + self.time_portion + self.surge_amount
    }
}

impl Tariff {
    /// Price a trip, optionally applying an already-validated discount.
    pub fn quote(
        &self,
        input: &QuoteInput,
        discount: Option<&DiscountDescriptor>,
    ) -> Result<FareQuote, PricingError> {
        ValidationError::ensure_non_negative("distance_meters", input.distance_meters)?;
        ValidationError::ensure_non_negative("duration_seconds", input.duration_seconds)?;
        let rate = self.rate(input.vehicle_class)?;

        let base = fine(rate.base);
        let distance = scaled(input.distance_meters, rate.per_km, 1000)?;
        let time = scaled(input.duration_seconds, rate.per_minute, 60)?;

        let pre_surge = base
            .checked_add(distance)
            .and_then(|v| v.checked_add(time))
            .ok_or(PricingError::Overflow)?;
        let surge = if input.surge.is_surging() {
            pre_surge / BPS * (i128::from(input.surge.bps()) - BPS)
        } else {
            0
        };
        let subtotal = pre_surge.checked_add(surge).ok_or(PricingError::Overflow)?;

        let discount = match discount {
            None => 0,
            Some(descriptor) => {
                let raw = match descriptor.discount {
                    DiscountKind::Percentage { bps } => subtotal / BPS * i128::from(bps),
                    DiscountKind::Fixed { amount } => fine(amount),
                    DiscountKind::FreeDelivery => pre_surge,
                };
                let capped = match descriptor.max_discount {
                    Some(max) => raw.min(fine(max)),
                    None => raw,
                };
                capped.min(subtotal).max(0)
            }
        };

        let base = round_half_up(base)?;
        let distance_portion = round_half_up(distance)?;
        let time_portion = round_half_up(time)?;
        let surge_amount = round_half_up(surge)?;
        let rounded_subtotal = [distance_portion, time_portion, surge_amount]
            .into_iter()
            .try_fold(base, Money::checked_add)
            .ok_or(PricingError::Overflow)?;
        let discount_amount = round_half_up(discount)?.min(rounded_subtotal);
        let total = rounded_subtotal.saturating_sub_floor(discount_amount);

        Ok(FareQuote {
            base,
            distance_portion,
            time_portion,
            surge_amount,
            discount_amount,
            total,
        })
    }
}

fn fine(amount: Money) -> i128 {
    i128::from(amount.centavos()) * FINE_PER_CENTAVO
}

/// `quantity × rate / per_unit`, in fine units.
fn scaled(quantity: i64, rate: Money, per_unit: i128) -> Result<i128, PricingError> {
    i128::from(quantity)
        .checked_mul(i128::from(rate.centavos()))
        .and_then(|v| v.checked_mul(FINE_PER_CENTAVO / per_unit))
        .ok_or(PricingError::Overflow)
}

fn round_half_up(value: i128) -> Result<Money, PricingError> {
    let centavos = (value + FINE_PER_CENTAVO / 2) / FINE_PER_CENTAVO;
    i64::try_from(centavos)
        .map(Money::from_centavos)
        .map_err(|_| PricingError::Overflow)
}
