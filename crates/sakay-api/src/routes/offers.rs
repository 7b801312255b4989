//! # Offers API
//!
//! Candidates answer the offers pushed to them.
//!
//! - `GET /v1/offers/{id}`: get an offer
//! - `POST /v1/offers/{id}/respond`: accept or decline

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use sakay_core::OfferId;
use sakay_state::OfferResponse;

use super::OfferView;
use crate::error::AppError;
use crate::extractors::{extract_json, Principal};
use crate::state::AppState;

/// A candidate's answer.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RespondBody {
    /// `accept` or `decline`.
    #[schema(value_type = String, example = "accept")]
    pub response: OfferResponse,
}

/// Build the offers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/offers/{id}", get(get_offer))
        .route("/v1/offers/{id}/respond", post(respond_to_offer))
}

/// GET /v1/offers/{id}: Get an offer. Operators and the offered candidate only.
#[utoipa::path(
    get,
    path = "/v1/offers/{id}",
    params(("id" = Uuid, Path, description = "Offer ID")),
    responses(
        (status = 200, description = "Offer found", body = OfferView),
        (status = 404, description = "Offer not found", body = crate::error::ErrorBody),
    ),
    tag = "offers"
)]
pub(crate) async fn get_offer(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<OfferView>, AppError> {
    let offer = state.engine.offer(OfferId(id))?;
    let visible =
        principal.0.is_operator() || principal.fulfiller() == Some(&offer.candidate);
    if !visible {
        return Err(AppError::NotFound(format!("{} not found", offer.id)));
    }
    Ok(Json(OfferView(offer)))
}

/// POST /v1/offers/{id}/respond: Accept or decline an offer.
///
/// Exactly one response wins. A late or duplicate answer is refused and
/// leaves the request untouched.
#[utoipa::path(
    post,
    path = "/v1/offers/{id}/respond",
    params(("id" = Uuid, Path, description = "Offer ID")),
    request_body = RespondBody,
    responses(
        (status = 200, description = "Response recorded", body = OfferView),
        (status = 403, description = "Not offered to this fulfiller", body = crate::error::ErrorBody),
        (status = 409, description = "Already resolved", body = crate::error::ErrorBody),
        (status = 410, description = "Offer expired", body = crate::error::ErrorBody),
    ),
    tag = "offers"
)]
pub(crate) async fn respond_to_offer(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    body: Result<Json<RespondBody>, JsonRejection>,
) -> Result<Json<OfferView>, AppError> {
    let req = extract_json(body)?;
    let responder = principal.fulfiller().cloned().ok_or_else(|| {
        AppError::Forbidden(format!("{} may not respond to offers", principal.0))
    })?;
    let offer = state
        .engine
        .respond_to_offer(OfferId(id), responder, req.response)
        .await?;
    Ok(Json(OfferView(offer)))
}
