//! # sakay-core: Foundational Types for the Dispatch Engine
//!
//! Every other crate in the workspace depends on `sakay-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `RequestId`, `OfferId`,
//!    `RequesterId`, `FulfillerId` are distinct types. An offer id cannot be
//!    passed where a request id is expected.
//!
//! 2. **Integer money.** [`Money`] counts centavos in an `i64` and renders as
//!    a two-place decimal string. No floating point reaches a fare.
//!
//! 3. **UTC-only timestamps behind a [`Clock`].** Time-dependent rules (promo
//!    windows, offer expiry) read the clock they are given, so tests control
//!    time without sleeping.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `sakay-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod actor;
pub mod domain;
pub mod error;
pub mod identity;
pub mod money;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use actor::{Actor, Role};
pub use domain::{PaymentMethod, Place, RequestType, VehicleClass};
pub use error::ValidationError;
pub use identity::{FulfillerId, OfferId, RequestId, RequesterId};
pub use money::Money;
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
