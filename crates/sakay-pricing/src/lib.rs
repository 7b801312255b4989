//! # sakay-pricing: Fares and Promo Codes
//!
//! Pure fare computation plus the promo registry that decides which
//! discounts apply.
//!
//! ## Modules
//!
//! - **Tariff** (`tariff.rs`): per-vehicle-class base fare, per-km and
//!   per-minute rates.
//! - **Surge** (`surge.rs`): the surge multiplier and the source trait that
//!   supplies it per request.
//! - **Quote** (`quote.rs`): `base + distance + time + surge − discount`, in
//!   exact integer arithmetic with one half-up rounding per component.
//! - **Promo** (`promo.rs`): promo definitions and the ordered validation
//!   rules.
//! - **Book** (`book.rs`): the promo registry with usage counters.
//! - **Catalog** (`catalog.rs`): YAML files carrying a tariff and seed promos.
//!
//! Nothing in this crate reads the wall clock; callers pass `now`.

pub mod book;
pub mod catalog;
pub mod error;
pub mod promo;
pub mod quote;
pub mod surge;
pub mod tariff;

pub use book::{PromoBook, PromoSnapshot, RegisterError};
pub use catalog::{CatalogError, PricingCatalog};
pub use error::PricingError;
pub use promo::{DiscountDescriptor, DiscountKind, PromoCode, PromoError, PromoScope, PromoUsage};
pub use quote::{FareQuote, QuoteInput};
pub use surge::{FlatSurge, SurgeMultiplier, SurgeSource};
pub use tariff::{Tariff, VehicleRate};
