//! # Dispatch Offers
//!
//! One offer links one request to one candidate fulfiller for a fixed
//! window. It starts `Pending` and resolves exactly once.
//!
//! ```text
//! Pending ──▶ Accepted
//!    │
//!    ├──▶ Declined
//!    │
//!    └──▶ Expired   (window elapsed, or request cancelled)
//! ```
//!
//! Expiry is a property of the stored `expires_at` and the caller's clock,
//! not of whether a timer has fired: a response arriving at or after
//! `expires_at` is late even if the countdown task has not run yet.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sakay_core::{FulfillerId, OfferId, RequestId, Timestamp};

// ─── Outcome ─────────────────────────────────────────────────────────

/// Resolution state of a dispatch offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferOutcome {
    /// Waiting for the candidate to respond.
    Pending,
    /// The candidate took the request.
    Accepted,
    /// The candidate turned the request down.
    Declined,
    /// The window elapsed or the request was cancelled.
    Expired,
}

impl OfferOutcome {
    /// Whether the offer has left `Pending`.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Compact encoding for atomic storage.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Accepted => 1,
            Self::Declined => 2,
            Self::Expired => 3,
        }
    }

    /// Inverse of [`as_u8`](Self::as_u8). Unknown values decode as `Expired`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Accepted,
            2 => Self::Declined,
            _ => Self::Expired,
        }
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for OfferOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate's answer to an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferResponse {
    /// Take the request.
    Accept,
    /// Pass on the request.
    Decline,
}

impl OfferResponse {
    /// The outcome this response resolves a pending offer to.
    pub fn outcome(&self) -> OfferOutcome {
        match self {
            Self::Accept => OfferOutcome::Accepted,
            Self::Decline => OfferOutcome::Declined,
        }
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Reasons a response to an offer is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OfferError {
    /// The responder is not the candidate the offer was made to.
    #[error("{offer_id} was not offered to {responder}")]
    NotOfferedTo {
        /// The offer responded to.
        offer_id: OfferId,
        /// Who tried to respond.
        responder: FulfillerId,
    },

    /// The offer already has an outcome.
    #[error("{offer_id} is already {outcome}")]
    AlreadyResolved {
        /// The offer responded to.
        offer_id: OfferId,
        /// Its existing outcome.
        outcome: OfferOutcome,
    },

    /// The response arrived at or after `expires_at`.
    #[error("{offer_id} expired at {expires_at}")]
    Expired {
        /// The offer responded to.
        offer_id: OfferId,
        /// When the window closed.
        expires_at: Timestamp,
    },
}

// ─── Offer ───────────────────────────────────────────────────────────

/// An offer of one request to one candidate. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOffer {
    /// Offer identifier.
    pub id: OfferId,
    /// The request on offer.
    pub request_id: RequestId,
    /// The candidate the request is offered to.
    pub candidate: FulfillerId,
    /// 1-based position of this offer within the request's dispatch history.
    pub attempt: u32,
    /// When the offer was pushed to the candidate.
    pub offered_at: Timestamp,
    /// End of the response window (exclusive).
    pub expires_at: Timestamp,
    /// Current outcome.
    pub outcome: OfferOutcome,
    /// When the outcome left `Pending`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Timestamp>,
}

impl DispatchOffer {
    /// Open a pending offer with `expires_at = offered_at + window`.
    pub fn new(
        request_id: RequestId,
        candidate: FulfillerId,
        attempt: u32,
        offered_at: Timestamp,
        window: Duration,
    ) -> Self {
        Self {
            id: OfferId::new(),
            request_id,
            candidate,
            attempt,
            offered_at,
            expires_at: offered_at.plus(window),
            outcome: OfferOutcome::Pending,
            resolved_at: None,
        }
    }

    /// Whether the offer is still awaiting a response.
    pub fn is_pending(&self) -> bool {
        self.outcome == OfferOutcome::Pending
    }

    /// Whether the window has closed at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Decide what a response from `responder` at `now` would resolve to.
    ///
    /// Checks, in order: the responder is the candidate, the offer is still
    /// pending, the window is open. Does not mutate the offer; the caller
    /// applies the outcome so that it can race it against expiry and
    /// cancellation.
    pub fn evaluate_response(
        &self,
        responder: &FulfillerId,
        response: OfferResponse,
        now: Timestamp,
    ) -> Result<OfferOutcome, OfferError> {
        if &self.candidate != responder {
            return Err(OfferError::NotOfferedTo {
                offer_id: self.id,
                responder: responder.clone(),
            });
        }
        if self.outcome.is_resolved() {
            return Err(OfferError::AlreadyResolved {
                offer_id: self.id,
                outcome: self.outcome,
            });
        }
        if self.is_expired_at(now) {
            return Err(OfferError::Expired {
                offer_id: self.id,
                expires_at: self.expires_at,
            });
        }
        Ok(response.outcome())
    }

    /// Move a pending offer to `outcome`.
    pub fn resolve(&mut self, outcome: OfferOutcome, at: Timestamp) -> Result<(), OfferError> {
        if self.outcome.is_resolved() {
            return Err(OfferError::AlreadyResolved {
                offer_id: self.id,
                outcome: self.outcome,
            });
        }
        self.outcome = outcome;
        if outcome.is_resolved() {
            self.resolved_at = Some(at);
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
