//! # Route Modules
//!
//! Each module defines an Axum Router for one API surface area. Routers are
//! assembled in [`crate::app`].
//!
//! Domain records are returned as-is. The `*View` wrappers below only give
//! them a schema name in the OpenAPI document.

pub mod offers;
pub mod promos;
pub mod quotes;
pub mod requests;

use serde::Serialize;
use utoipa::ToSchema;

use sakay_dispatch::RequestRecord;
use sakay_pricing::{FareQuote, PromoSnapshot};
use sakay_state::DispatchOffer;

/// A ride booking or order with its lifecycle and audit log.
#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct RequestView(pub RequestRecord);

/// An offer of a request to one candidate.
#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct OfferView(pub DispatchOffer);

/// A priced fare. Amounts are decimal peso strings.
#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct FareView(pub FareQuote);

/// A promo definition with its usage count.
#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct PromoView(pub PromoSnapshot);
