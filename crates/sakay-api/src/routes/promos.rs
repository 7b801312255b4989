//! # Promo Registry API
//!
//! - `POST /v1/promos`: register a promo (operators)
//! - `GET /v1/promos`: list promos with usage (operators)
//! - `GET /v1/promos/{code}`: look up one promo

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use sakay_pricing::PromoCode;

use super::PromoView;
use crate::error::AppError;
use crate::extractors::{extract_json, Principal};
use crate::state::AppState;

/// A promo definition: code, discount, validity window, caps and scope.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct PromoDefinition(pub PromoCode);

/// Build the promos router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/promos", get(list_promos).post(register_promo))
        .route("/v1/promos/{code}", get(get_promo))
}

/// POST /v1/promos: Register a promo code.
#[utoipa::path(
    post,
    path = "/v1/promos",
    request_body = PromoDefinition,
    responses(
        (status = 201, description = "Promo registered", body = PromoView),
        (status = 403, description = "Operators only", body = crate::error::ErrorBody),
        (status = 409, description = "Code already registered", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed definition", body = crate::error::ErrorBody),
    ),
    tag = "promos"
)]
pub(crate) async fn register_promo(
    State(state): State<AppState>,
    principal: Principal,
    body: Result<Json<PromoDefinition>, JsonRejection>,
) -> Result<(StatusCode, Json<PromoView>), AppError> {
    principal.require_operator()?;
    let PromoDefinition(promo) = extract_json(body)?;
    let key = promo.key();
    state.engine.promos().register(promo)?;
    let snapshot = state
        .engine
        .promos()
        .get(&key)
        .ok_or_else(|| AppError::Internal(format!("promo {key} vanished after registration")))?;
    Ok((StatusCode::CREATED, Json(PromoView(snapshot))))
}

/// GET /v1/promos: List every promo with its usage.
#[utoipa::path(
    get,
    path = "/v1/promos",
    responses(
        (status = 200, description = "Registered promos", body = Vec<PromoView>),
        (status = 403, description = "Operators only", body = crate::error::ErrorBody),
    ),
    tag = "promos"
)]
pub(crate) async fn list_promos(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<PromoView>>, AppError> {
    principal.require_operator()?;
    Ok(Json(
        state
            .engine
            .promos()
            .list()
            .into_iter()
            .map(PromoView)
            .collect(),
    ))
}

/// GET /v1/promos/{code}: Look up a promo by code.
#[utoipa::path(
    get,
    path = "/v1/promos/{code}",
    params(("code" = String, Path, description = "Promo code, case-insensitive")),
    responses(
        (status = 200, description = "Promo found", body = PromoView),
        (status = 404, description = "Unknown code", body = crate::error::ErrorBody),
    ),
    tag = "promos"
)]
pub(crate) async fn get_promo(
    State(state): State<AppState>,
    _principal: Principal,
    Path(code): Path<String>,
) -> Result<Json<PromoView>, AppError> {
    state
        .engine
        .promos()
        .get(&code)
        .map(|snapshot| Json(PromoView(snapshot)))
        .ok_or_else(|| AppError::NotFound(format!("promo {code} does not exist")))
}
