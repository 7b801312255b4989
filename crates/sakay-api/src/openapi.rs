//! # OpenAPI Specification Assembly
//!
//! Collects the utoipa-documented handlers into one OpenAPI 3.1 document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sakay Dispatch API",
        version = "0.1.0",
        description = "Ride bookings and deliveries: request lifecycle, dispatch offers, fare quotes and promo codes.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Requests
        crate::routes::requests::create_request,
        crate::routes::requests::list_requests,
        crate::routes::requests::get_request,
        crate::routes::requests::list_offers,
        crate::routes::requests::apply_promo,
        crate::routes::requests::remove_promo,
        crate::routes::requests::confirm_request,
        crate::routes::requests::cancel_request,
        crate::routes::requests::advance_status,
        crate::routes::requests::redispatch_request,
        // Offers
        crate::routes::offers::get_offer,
        crate::routes::offers::respond_to_offer,
        // Quotes
        crate::routes::quotes::create_quote,
        // Promos
        crate::routes::promos::register_promo,
        crate::routes::promos::list_promos,
        crate::routes::promos::get_promo,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::RequestView,
        crate::routes::OfferView,
        crate::routes::FareView,
        crate::routes::PromoView,
        crate::routes::requests::CreateRequestBody,
        crate::routes::requests::ApplyPromoBody,
        crate::routes::requests::CancelBody,
        crate::routes::requests::AdvanceStatusBody,
        crate::routes::offers::RespondBody,
        crate::routes::quotes::QuoteBody,
        crate::routes::quotes::QuoteResponse,
        crate::routes::promos::PromoDefinition,
    )),
    tags(
        (name = "requests", description = "Ride bookings and orders"),
        (name = "offers", description = "Dispatch offers to candidates"),
        (name = "quotes", description = "Fare estimates"),
        (name = "promos", description = "Promo code registry"),
    )
)]
pub struct ApiDoc;

/// Router serving `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
