//! # Quotes API
//!
//! `POST /v1/quotes` prices a trip at the current surge without storing
//! anything. A promo in the body is validated for the quoting requester but
//! never consumed.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use sakay_core::{Actor, RequestType, RequesterId, ValidationError, VehicleClass};
use sakay_pricing::QuoteInput;

use super::FareView;
use crate::error::AppError;
use crate::extractors::{extract_json, Principal};
use crate::state::AppState;

/// Trip to price.
#[derive(Debug, Deserialize, ToSchema)]
pub struct QuoteBody {
    /// `ride`, `food`, `grocery` or `pharmacy`.
    #[schema(value_type = String, example = "ride")]
    pub request_type: RequestType,
    /// `motorcycle`, `car` or `suv`.
    #[schema(value_type = String, example = "car")]
    pub vehicle_class: VehicleClass,
    /// Routed distance.
    pub distance_meters: i64,
    /// Routed duration.
    pub duration_seconds: i64,
    /// Promo to price with.
    #[serde(default)]
    pub promo_code: Option<String>,
    /// Whose promo eligibility to check. Operators only.
    #[serde(default)]
    pub requester: Option<String>,
}

/// A fare with the surge it was priced at.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteResponse {
    /// Surge multiplier in effect, e.g. `1.5`.
    pub surge: f64,
    /// The priced fare.
    pub fare: FareView,
}

/// Build the quotes router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/quotes", post(create_quote))
}

/// POST /v1/quotes: Price a trip.
#[utoipa::path(
    post,
    path = "/v1/quotes",
    request_body = QuoteBody,
    responses(
        (status = 200, description = "Fare priced", body = QuoteResponse),
        (status = 422, description = "Invalid trip or promo", body = crate::error::ErrorBody),
    ),
    tag = "quotes"
)]
pub(crate) async fn create_quote(
    State(state): State<AppState>,
    principal: Principal,
    body: Result<Json<QuoteBody>, JsonRejection>,
) -> Result<Json<QuoteResponse>, AppError> {
    let req = extract_json(body)?;
    ValidationError::ensure_non_negative("distance_meters", req.distance_meters)?;
    ValidationError::ensure_non_negative("duration_seconds", req.duration_seconds)?;

    let surge = state
        .engine
        .current_surge(req.request_type, req.vehicle_class);
    let input = QuoteInput {
        distance_meters: req.distance_meters,
        duration_seconds: req.duration_seconds,
        vehicle_class: req.vehicle_class,
        surge,
    };

    let requester = match (&principal.0, req.requester.as_deref()) {
        (Actor::Requester(own), None) => Some(own.clone()),
        (Actor::Requester(own), Some(other)) if other == own.as_str() => Some(own.clone()),
        (Actor::Operator(_), Some(other)) => Some(RequesterId::new(other)?),
        (_, Some(other)) => {
            return Err(AppError::Forbidden(format!(
                "{} may not quote for {other}",
                principal.0
            )))
        }
        (_, None) => None,
    };
    let promo = match (req.promo_code.as_deref(), requester.as_ref()) {
        (Some(code), Some(requester)) => Some((code, requester)),
        (Some(_), None) => {
            return Err(AppError::Validation(
                "a promo quote needs a requester".into(),
            ))
        }
        (None, _) => None,
    };

    let fare = state.engine.quote(&input, req.request_type, promo)?;
    Ok(Json(QuoteResponse {
        surge: surge.as_f64(),
        fare: FareView(fare),
    }))
}
