//! # Engine Errors
//!
//! Every mutating operation reports failure synchronously with one of these.
//! None of them leave a request half-changed: either the whole operation was
//! applied and persisted, or the stored request is as it was.

use thiserror::Error;

use sakay_core::{OfferId, RequestId, ValidationError};
use sakay_pricing::{PricingError, PromoError};
use sakay_state::{LifecycleError, OfferOutcome, RequestStatus};

use crate::repository::RepositoryError;

/// Errors returned by [`DispatchEngine`](crate::DispatchEngine) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The requested status change is not allowed from the current status.
    #[error("cannot move request from {from} to {to}: {detail}")]
    InvalidTransition {
        /// Current status.
        from: RequestStatus,
        /// Attempted target.
        to: RequestStatus,
        /// Which guard refused the transition.
        detail: String,
    },

    /// The caller's view of the request is out of date.
    #[error("{request_id} changed concurrently: expected version {expected}, found {actual}")]
    StaleState {
        /// The request.
        request_id: RequestId,
        /// Version the caller expected.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// A promo code could not be applied.
    #[error(transparent)]
    Promo(#[from] PromoError),

    /// The offer's response window has closed.
    #[error("offer no longer available")]
    OfferExpired {
        /// The offer.
        offer_id: OfferId,
    },

    /// Every candidate declined or let the offer lapse.
    #[error("no candidates available for {request_id}")]
    NoCandidatesAvailable {
        /// The request left in `confirmed`.
        request_id: RequestId,
    },

    /// Malformed input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No such request or offer.
    #[error("{entity} {id} not found")]
    NotFound {
        /// What was looked up.
        entity: &'static str,
        /// The identifier given.
        id: String,
    },

    /// The actor may not perform this operation on this request.
    #[error("{actor} may not {action} this request")]
    NotPermitted {
        /// Who attempted it.
        actor: String,
        /// What they attempted.
        action: &'static str,
    },

    /// The offer already has a final outcome.
    #[error("offer {offer_id} is already {outcome}")]
    OfferAlreadyResolved {
        /// The offer.
        offer_id: OfferId,
        /// Its outcome.
        outcome: OfferOutcome,
    },

    /// A pending offer or a running matching loop already exists.
    #[error("{request_id} already has dispatch in progress")]
    OfferOutstanding {
        /// The request.
        request_id: RequestId,
    },

    /// A collaborator (storage, candidate directory) failed.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl EngineError {
    /// Map a lifecycle refusal to `InvalidTransition`.
    pub(crate) fn from_lifecycle(err: LifecycleError, from: RequestStatus, to: RequestStatus) -> Self {
        Self::InvalidTransition {
            from,
            to,
            detail: err.to_string(),
        }
    }

    pub(crate) fn request_not_found(id: RequestId) -> Self {
        Self::NotFound {
            entity: "request",
            id: id.to_string(),
        }
    }

    pub(crate) fn offer_not_found(id: OfferId) -> Self {
        Self::NotFound {
            entity: "offer",
            id: id.to_string(),
        }
    }
}

impl From<PricingError> for EngineError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::Validation(v) => Self::Validation(v),
            other => Self::Validation(ValidationError::Invalid(other.to_string())),
        }
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::request_not_found(id),
            RepositoryError::Conflict {
                request_id,
                expected,
                actual,
            } => Self::StaleState {
                request_id,
                expected,
                actual,
            },
            RepositoryError::DuplicateKey { key, .. } => Self::Validation(ValidationError::Invalid(
                format!("idempotency key {key:?} is already in use"),
            )),
            RepositoryError::Unavailable(msg) => Self::Unavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_expired_message_is_user_facing() {
        let err = EngineError::OfferExpired {
            offer_id: OfferId::new(),
        };
        assert_eq!(err.to_string(), "offer no longer available");
    }

    #[test]
    fn storage_conflict_maps_to_stale_state() {
        let id = RequestId::new();
        let err: EngineError = RepositoryError::Conflict {
            request_id: id,
            expected: 3,
            actual: 4,
        }
        .into();
        assert!(matches!(err, EngineError::StaleState { expected: 3, actual: 4, .. }));
    }

    #[test]
    fn promo_errors_keep_their_message() {
        let err: EngineError = PromoError::NotFound {
            code: "NOPE".into(),
        }
        .into();
        assert_eq!(err.to_string(), "promo NOPE does not exist");
    }
}
