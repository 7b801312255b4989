//! # Requests API
//!
//! Ride bookings and orders, from creation to a terminal status.
//!
//! ## Endpoints
//!
//! - `POST /v1/requests`: create (honours `Idempotency-Key`)
//! - `GET /v1/requests`: list by `requester` and/or `status`
//! - `GET /v1/requests/{id}`: get
//! - `GET /v1/requests/{id}/offers`: dispatch history
//! - `POST /v1/requests/{id}/promo`: attach or replace a promo
//! - `DELETE /v1/requests/{id}/promo`: drop the promo before confirmation
//! - `POST /v1/requests/{id}/confirm`: confirm and start matching
//! - `POST /v1/requests/{id}/cancel`: cancel
//! - `POST /v1/requests/{id}/status`: advance fulfillment
//! - `POST /v1/requests/{id}/redispatch`: retry matching after exhaustion

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use sakay_core::{Actor, PaymentMethod, Place, RequestId, RequestType, RequesterId, VehicleClass};
use sakay_dispatch::{RequestParams, RequestRecord};
use sakay_state::RequestStatus;

use super::{OfferView, RequestView};
use crate::error::AppError;
use crate::extractors::{extract_json, Principal};
use crate::state::AppState;

/// Header a client sets to make creation safe to retry.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

// ── Request/Response DTOs ───────────────────────────────────────────

/// Request to create a ride booking or order.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRequestBody {
    /// `ride`, `food`, `grocery` or `pharmacy`.
    #[schema(value_type = String, example = "ride")]
    pub request_type: RequestType,
    /// Whose request this is. Operators only; requesters book for themselves.
    #[serde(default)]
    pub requester: Option<String>,
    /// Ride origin or merchant location. Required for rides.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub pickup: Option<Place>,
    /// Ride destination or delivery address.
    #[schema(value_type = Object)]
    pub dropoff: Place,
    /// `motorcycle`, `car` or `suv`.
    #[schema(value_type = String, example = "car")]
    pub vehicle_class: VehicleClass,
    /// `cash`, `card` or `wallet`.
    #[schema(value_type = String, example = "cash")]
    pub payment_method: PaymentMethod,
    /// Routed distance from the geo provider.
    pub distance_meters: i64,
    /// Routed duration from the geo provider.
    pub duration_seconds: i64,
    /// Promo to attach. Validated now, consumed on confirmation.
    #[serde(default)]
    pub promo_code: Option<String>,
}

/// Filters for listing requests. At least one is required.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListRequestsQuery {
    /// Requests of this requester.
    pub requester: Option<String>,
    /// Requests in this status.
    pub status: Option<String>,
}

/// Request to attach a promo.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyPromoBody {
    /// The promo code, case-insensitive.
    pub code: String,
}

/// Optional body for cancellation.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelBody {
    /// Free-text reason kept on the cancellation record.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request to move a request forward along its fulfillment path.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdvanceStatusBody {
    /// Target status, e.g. `in_progress` or `picked_up`.
    pub status: String,
    /// Refuse the change unless the stored version still matches.
    #[serde(default)]
    pub expected_version: Option<u64>,
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the requests router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/requests", get(list_requests).post(create_request))
        .route("/v1/requests/{id}", get(get_request))
        .route("/v1/requests/{id}/offers", get(list_offers))
        .route(
            "/v1/requests/{id}/promo",
            post(apply_promo).delete(remove_promo),
        )
        .route("/v1/requests/{id}/confirm", post(confirm_request))
        .route("/v1/requests/{id}/cancel", post(cancel_request))
        .route("/v1/requests/{id}/status", post(advance_status))
        .route("/v1/requests/{id}/redispatch", post(redispatch_request))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /v1/requests: Create a ride booking or order.
#[utoipa::path(
    post,
    path = "/v1/requests",
    request_body = CreateRequestBody,
    params(("Idempotency-Key" = Option<String>, Header, description = "Retry key")),
    responses(
        (status = 201, description = "Request created", body = RequestView),
        (status = 200, description = "Retry of an earlier creation", body = RequestView),
        (status = 422, description = "Validation or promo error", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn create_request(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    body: Result<Json<CreateRequestBody>, JsonRejection>,
) -> Result<(StatusCode, Json<RequestView>), AppError> {
    let req = extract_json(body)?;
    let requester = match &principal.0 {
        Actor::Requester(own) => match req.requester.as_deref() {
            Some(other) if other != own.as_str() => {
                return Err(AppError::Forbidden(format!(
                    "{} may not book for {other}",
                    principal.0
                )))
            }
            _ => own.clone(),
        },
        Actor::Operator(_) => {
            let id = req.requester.as_deref().ok_or_else(|| {
                AppError::Validation("requester is required when an operator books".into())
            })?;
            RequesterId::new(id)?
        }
        other => {
            return Err(AppError::Forbidden(format!(
                "{other} may not create requests"
            )))
        }
    };

    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let params = RequestParams {
        request_type: req.request_type,
        requester,
        pickup: req.pickup,
        dropoff: req.dropoff,
        vehicle_class: req.vehicle_class,
        payment_method: req.payment_method,
        distance_meters: req.distance_meters,
        duration_seconds: req.duration_seconds,
        promo_code: req.promo_code,
    };

    let outcome = state.engine.create_request(params, idempotency_key).await?;
    let status = if outcome.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(RequestView(outcome.record))))
}

/// GET /v1/requests: List requests by requester and/or status.
#[utoipa::path(
    get,
    path = "/v1/requests",
    params(ListRequestsQuery),
    responses(
        (status = 200, description = "Matching requests, oldest first", body = Vec<RequestView>),
        (status = 422, description = "No filter given", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn list_requests(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Vec<RequestView>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<RequestStatus>)
        .transpose()?;
    let requester = match &principal.0 {
        Actor::Requester(own) => match query.requester.as_deref() {
            Some(other) if other != own.as_str() => {
                return Err(AppError::Forbidden(format!(
                    "{} may not list requests of {other}",
                    principal.0
                )))
            }
            _ => Some(own.clone()),
        },
        Actor::Operator(_) => query.requester.as_deref().map(RequesterId::new).transpose()?,
        other => {
            return Err(AppError::Forbidden(format!(
                "{other} may not list requests"
            )))
        }
    };

    let records = match (requester, status) {
        (Some(requester), status) => state
            .engine
            .list_by_requester(&requester)
            .await?
            .into_iter()
            .filter(|r| status.map_or(true, |s| r.status() == s))
            .collect(),
        (None, Some(status)) => state.engine.list_by_status(status).await?,
        (None, None) => {
            return Err(AppError::Validation(
                "a requester or status filter is required".into(),
            ))
        }
    };
    Ok(Json(records.into_iter().map(RequestView).collect()))
}

/// GET /v1/requests/{id}: Get a single request.
#[utoipa::path(
    get,
    path = "/v1/requests/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request found", body = RequestView),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn get_request(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestView>, AppError> {
    let record = state.engine.get(RequestId(id)).await?;
    ensure_visible(&state, &record, &principal)?;
    Ok(Json(RequestView(record)))
}

/// GET /v1/requests/{id}/offers: Every offer made for a request.
#[utoipa::path(
    get,
    path = "/v1/requests/{id}/offers",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Offers, oldest first", body = Vec<OfferView>),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn list_offers(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<OfferView>>, AppError> {
    let id = RequestId(id);
    let record = state.engine.get(id).await?;
    ensure_visible(&state, &record, &principal)?;
    Ok(Json(
        state.engine.offers_for(id).into_iter().map(OfferView).collect(),
    ))
}

/// POST /v1/requests/{id}/promo: Attach or replace a promo.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/promo",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = ApplyPromoBody,
    responses(
        (status = 200, description = "Request repriced", body = RequestView),
        (status = 422, description = "Promo refused", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn apply_promo(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    body: Result<Json<ApplyPromoBody>, JsonRejection>,
) -> Result<Json<RequestView>, AppError> {
    let req = extract_json(body)?;
    let record = state
        .engine
        .apply_promo(RequestId(id), &req.code, principal.actor())
        .await?;
    Ok(Json(RequestView(record)))
}

/// DELETE /v1/requests/{id}/promo: Remove the promo and reprice.
#[utoipa::path(
    delete,
    path = "/v1/requests/{id}/promo",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request repriced without a discount", body = RequestView),
        (status = 422, description = "Request is past creation", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn remove_promo(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestView>, AppError> {
    let record = state
        .engine
        .remove_promo(RequestId(id), principal.actor())
        .await?;
    Ok(Json(RequestView(record)))
}

/// POST /v1/requests/{id}/confirm: Confirm and start matching.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/confirm",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request confirmed", body = RequestView),
        (status = 409, description = "Not in a confirmable status", body = crate::error::ErrorBody),
        (status = 422, description = "Promo no longer applies", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn confirm_request(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestView>, AppError> {
    let record = state.engine.confirm(RequestId(id), principal.actor()).await?;
    Ok(Json(RequestView(record)))
}

/// POST /v1/requests/{id}/cancel: Cancel a request.
///
/// The body is optional; `{"reason": "..."}` records why.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/cancel",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body(content = CancelBody, description = "Optional reason"),
    responses(
        (status = 200, description = "Request cancelled", body = RequestView),
        (status = 409, description = "Already terminal", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn cancel_request(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<RequestView>, AppError> {
    let req: CancelBody = if body.iter().all(u8::is_ascii_whitespace) {
        CancelBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    let reason = req
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let record = state
        .engine
        .cancel(RequestId(id), principal.actor(), reason)
        .await?;
    Ok(Json(RequestView(record)))
}

/// POST /v1/requests/{id}/status: Advance along the fulfillment path.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/status",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = AdvanceStatusBody,
    responses(
        (status = 200, description = "Status advanced", body = RequestView),
        (status = 409, description = "Illegal transition or stale version", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn advance_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    body: Result<Json<AdvanceStatusBody>, JsonRejection>,
) -> Result<Json<RequestView>, AppError> {
    let req = extract_json(body)?;
    let target: RequestStatus = req.status.parse()?;
    let record = state
        .engine
        .advance_status(RequestId(id), target, principal.actor(), req.expected_version)
        .await?;
    Ok(Json(RequestView(record)))
}

/// POST /v1/requests/{id}/redispatch: Start a new matching run.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/redispatch",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 202, description = "Matching restarted", body = RequestView),
        (status = 409, description = "Not confirmed, or an offer is outstanding", body = crate::error::ErrorBody),
        (status = 503, description = "No candidates available", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn redispatch_request(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<RequestView>), AppError> {
    let record = state
        .engine
        .redispatch(RequestId(id), principal.actor())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(RequestView(record))))
}

// ── Access ──────────────────────────────────────────────────────────

/// Operators see everything. Requesters see their own requests. Fulfillers
/// see requests assigned to them or offered to them.
fn ensure_visible(
    state: &AppState,
    record: &RequestRecord,
    principal: &Principal,
) -> Result<(), AppError> {
    let visible = match &principal.0 {
        Actor::Operator(_) => true,
        Actor::Requester(id) => *id == record.requester,
        Actor::Fulfiller(id) => {
            record.fulfiller() == Some(id)
                || state
                    .engine
                    .offers_for(record.id)
                    .iter()
                    .any(|offer| offer.candidate == *id)
        }
        Actor::System => false,
    };
    if visible {
        Ok(())
    } else {
        // Indistinguishable from a missing request.
        Err(AppError::NotFound(format!("{} not found", record.id)))
    }
}
