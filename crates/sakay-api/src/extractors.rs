//! # Principal & Body Extractors
//!
//! Authentication happens at the gateway. It forwards the verified caller
//! in two headers, which [`Principal`] turns into an engine [`Actor`]:
//!
//! - `x-principal-id`: the identity-provider reference
//! - `x-principal-role`: `requester`, `fulfiller` or `operator`

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::Json;

use sakay_core::{Actor, FulfillerId, Role};

use crate::error::AppError;

/// Header carrying the principal's identifier.
pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
/// Header carrying the principal's role.
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

/// The caller, as asserted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub Actor);

impl Principal {
    /// The engine actor for this caller.
    pub fn actor(&self) -> Actor {
        self.0.clone()
    }

    /// The fulfiller id, if the caller is a fulfiller.
    pub fn fulfiller(&self) -> Option<&FulfillerId> {
        match &self.0 {
            Actor::Fulfiller(id) => Some(id),
            _ => None,
        }
    }

    /// Refuse callers that are not operators.
    pub fn require_operator(&self) -> Result<(), AppError> {
        if self.0.is_operator() {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{} may not use operator routes",
                self.0
            )))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let (Some(id), Some(role)) = (header(PRINCIPAL_ID_HEADER), header(PRINCIPAL_ROLE_HEADER))
        else {
            return Err(AppError::Unauthorized(format!(
                "missing {PRINCIPAL_ID_HEADER} or {PRINCIPAL_ROLE_HEADER} header"
            )));
        };
        let role: Role = role
            .parse()
            .map_err(|_| AppError::Unauthorized(format!("unknown principal role {role:?}")))?;
        let actor = Actor::from_principal(role, id)
            .map_err(|err| AppError::Unauthorized(err.to_string()))?;
        Ok(Self(actor))
    }
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use sakay_core::RequesterId;

    async fn extract(headers: &[(&str, &str)]) -> Result<Principal, AppError> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        Principal::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn requester_headers_become_a_requester() {
        let principal = extract(&[
            (PRINCIPAL_ID_HEADER, "rider-1"),
            (PRINCIPAL_ROLE_HEADER, "requester"),
        ])
        .await
        .unwrap();
        assert_eq!(
            principal.actor(),
            Actor::Requester(RequesterId::new("rider-1").unwrap())
        );
        assert!(principal.require_operator().is_err());
    }

    #[tokio::test]
    async fn missing_headers_are_unauthorized() {
        let err = extract(&[(PRINCIPAL_ID_HEADER, "rider-1")]).await.unwrap_err();
        assert_eq!(err.status_and_code().1, "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn unknown_role_is_unauthorized() {
        let err = extract(&[
            (PRINCIPAL_ID_HEADER, "x"),
            (PRINCIPAL_ROLE_HEADER, "admin"),
        ])
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
