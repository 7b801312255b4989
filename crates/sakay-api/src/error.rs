//! # API Error Types
//!
//! [`AppError`] implements `axum::response::IntoResponse`. Engine errors map
//! to HTTP status codes and a JSON body `{"error": {"code", "message"}}`.
//! Internal failures are logged and answered with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use sakay_core::ValidationError;
use sakay_dispatch::EngineError;
use sakay_pricing::{PromoError, RegisterError};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. `INVALID_TRANSITION`, `PROMO_EXPIRED`).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// An engine operation was refused.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// No route-level resource with this key (404).
    #[error("{0}")]
    NotFound(String),

    /// Request body or parameters are semantically invalid (422).
    #[error("{0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("{0}")]
    BadRequest(String),

    /// No principal was forwarded (401).
    #[error("{0}")]
    Unauthorized(String),

    /// The principal's role may not call this route (403).
    #[error("{0}")]
    Forbidden(String),

    /// The resource already exists (409).
    #[error("{0}")]
    Conflict(String),

    /// Unexpected failure (500). Message is logged, not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Engine(err) => engine_status(err),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "NOT_PERMITTED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

fn engine_status(err: &EngineError) -> (StatusCode, &'static str) {
    match err {
        EngineError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        EngineError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
        EngineError::Promo(promo) => (StatusCode::UNPROCESSABLE_ENTITY, promo_code(promo)),
        EngineError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
        EngineError::StaleState { .. } => (StatusCode::CONFLICT, "STALE_STATE"),
        EngineError::OfferAlreadyResolved { .. } => {
            (StatusCode::CONFLICT, "OFFER_ALREADY_RESOLVED")
        }
        EngineError::OfferOutstanding { .. } => (StatusCode::CONFLICT, "OFFER_OUTSTANDING"),
        EngineError::OfferExpired { .. } => (StatusCode::GONE, "OFFER_EXPIRED"),
        EngineError::NotPermitted { .. } => (StatusCode::FORBIDDEN, "NOT_PERMITTED"),
        EngineError::NoCandidatesAvailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "NO_CANDIDATES")
        }
        EngineError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
    }
}

fn promo_code(err: &PromoError) -> &'static str {
    match err {
        PromoError::NotFound { .. } => "PROMO_NOT_FOUND",
        PromoError::Expired { .. } => "PROMO_EXPIRED",
        PromoError::ScopeMismatch { .. } => "PROMO_SCOPE_MISMATCH",
        PromoError::BelowMinimum { .. } => "PROMO_BELOW_MINIMUM",
        PromoError::UsageCapReached { .. } => "PROMO_USAGE_CAP_REACHED",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        } else if status.is_server_error() {
            tracing::warn!(code, error = %self, "dependency failure");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Engine(EngineError::Validation(err))
    }
}

impl From<RegisterError> for AppError {
    fn from(err: RegisterError) -> Self {
        match err {
            RegisterError::Duplicate { .. } => Self::Conflict(err.to_string()),
            RegisterError::Invalid(v) => v.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use sakay_core::{Money, OfferId, RequestId};
    use sakay_state::RequestStatus;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[test]
    fn engine_errors_map_to_documented_statuses() {
        let cases: Vec<(EngineError, StatusCode, &str)> = vec![
            (
                EngineError::InvalidTransition {
                    from: RequestStatus::Completed,
                    to: RequestStatus::Cancelled,
                    detail: "terminal".into(),
                },
                StatusCode::CONFLICT,
                "INVALID_TRANSITION",
            ),
            (
                EngineError::OfferExpired {
                    offer_id: OfferId::new(),
                },
                StatusCode::GONE,
                "OFFER_EXPIRED",
            ),
            (
                EngineError::NoCandidatesAvailable {
                    request_id: RequestId::new(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
                "NO_CANDIDATES",
            ),
            (
                EngineError::Unavailable("store down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "UNAVAILABLE",
            ),
            (
                EngineError::NotPermitted {
                    actor: "requester:rider-2".into(),
                    action: "confirm",
                },
                StatusCode::FORBIDDEN,
                "NOT_PERMITTED",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(AppError::from(err).status_and_code(), (status, code));
        }
    }

    #[tokio::test]
    async fn promo_errors_carry_specific_codes() {
        let err = AppError::from(EngineError::Promo(PromoError::BelowMinimum {
            code: "FOODIE100".into(),
            minimum: Money::from_pesos(300),
            subtotal: Money::from_centavos(7760),
        }));
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error.code, "PROMO_BELOW_MINIMUM");
        assert_eq!(
            body.error.message,
            "promo FOODIE100 requires a minimum order of ₱300.00"
        );
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = response_parts(AppError::Internal("db password wrong".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[tokio::test]
    async fn offer_expired_answers_with_user_message() {
        let err = AppError::from(EngineError::OfferExpired {
            offer_id: OfferId::new(),
        });
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body.error.message, "offer no longer available");
    }
}
