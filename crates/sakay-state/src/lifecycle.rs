//! # Request Lifecycle State Machine
//!
//! Models the status of a ride booking or an order from creation to a
//! terminal status.
//!
//! ## States
//!
//! ```text
//! Created ──▶ Confirmed ──▶ Assigned ──▶ InProgress ─┬─▶ ArrivedDropoff ──▶ Completed   (ride)
//!                                                    └─▶ Completed
//!
//!                                        InProgress ──▶ Preparing ──▶ Ready ──▶ PickedUp
//!                                                       ──▶ OnTheWay ──▶ Delivered      (order)
//!
//! any non-terminal ──▶ Cancelled
//! ```
//!
//! `Completed`, `Delivered` and `Cancelled` are terminal. Transitions are
//! forward-only; skipping a status is rejected.
//!
//! ## Guards
//!
//! - `Confirmed → Assigned` carries the accepted [`DispatchOffer`], which
//!   becomes the recorded [`Assignment`].
//! - `Assigned → InProgress` requires an accepted offer matching that
//!   assignment.
//! - A requester cancelling after assignment is recorded with
//!   `post_assignment = true`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sakay_core::{Actor, FulfillerId, OfferId, RequestId, RequestType, Timestamp};

use crate::offer::{DispatchOffer, OfferOutcome};

// ─── Status ──────────────────────────────────────────────────────────

/// Canonical status of a request, shared by both fulfillment paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Quoted but not yet confirmed by the requester.
    Created,
    /// Confirmed; dispatch is looking for a fulfiller.
    Confirmed,
    /// A fulfiller accepted the offer.
    Assigned,
    /// Fulfillment has started (ride boarded, order accepted by merchant).
    InProgress,
    /// Ride reached the drop-off point.
    ArrivedDropoff,
    /// Ride finished (terminal).
    Completed,
    /// Merchant is preparing the order.
    Preparing,
    /// Order is ready for pickup.
    Ready,
    /// Courier collected the order.
    PickedUp,
    /// Courier is travelling to the delivery address.
    OnTheWay,
    /// Order handed over (terminal).
    Delivered,
    /// Request abandoned (terminal).
    Cancelled,
}

impl RequestStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [RequestStatus; 12] = [
        Self::Created,
        Self::Confirmed,
        Self::Assigned,
        Self::InProgress,
        Self::ArrivedDropoff,
        Self::Completed,
        Self::Preparing,
        Self::Ready,
        Self::PickedUp,
        Self::OnTheWay,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Whether no transition leaves this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Delivered | Self::Cancelled)
    }

    /// Whether no fulfiller has been assigned yet. The fare may only be
    /// recomputed in these statuses.
    pub fn is_pre_assignment(&self) -> bool {
        matches!(self, Self::Created | Self::Confirmed)
    }

    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Confirmed => "confirmed",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::ArrivedDropoff => "arrived_dropoff",
            Self::Completed => "completed",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::PickedUp => "picked_up",
            Self::OnTheWay => "on_the_way",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Look up a status by its canonical name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = sakay_core::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s.trim()).ok_or_else(|| sakay_core::ValidationError::UnknownVariant {
            kind: "request status",
            value: s.to_string(),
        })
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Paths ───────────────────────────────────────────────────────────

/// Which fulfillment sequence a request follows after `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentPath {
    /// Passenger transport.
    Ride,
    /// Food, grocery and pharmacy delivery.
    Order,
}

impl FulfillmentPath {
    /// The path a request type follows.
    pub fn for_request(request_type: RequestType) -> Self {
        if request_type.is_order() {
            Self::Order
        } else {
            Self::Ride
        }
    }

    /// Legal successors of `from` on this path.
    pub fn successors(&self, from: RequestStatus) -> &'static [RequestStatus] {
        use RequestStatus::*;
        match (self, from) {
            (_, Created) => &[Confirmed, Cancelled],
            (_, Confirmed) => &[Assigned, Cancelled],
            (_, Assigned) => &[InProgress, Cancelled],
            (Self::Ride, InProgress) => &[ArrivedDropoff, Completed, Cancelled],
            (Self::Ride, ArrivedDropoff) => &[Completed, Cancelled],
            (Self::Order, InProgress) => &[Preparing, Cancelled],
            (Self::Order, Preparing) => &[Ready, Cancelled],
            (Self::Order, Ready) => &[PickedUp, Cancelled],
            (Self::Order, PickedUp) => &[OnTheWay, Cancelled],
            (Self::Order, OnTheWay) => &[Delivered, Cancelled],
            _ => &[],
        }
    }

    /// Whether `from → to` is in this path's transition table.
    pub fn is_legal(&self, from: RequestStatus, to: RequestStatus) -> bool {
        self.successors(from).contains(&to)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors that can occur during lifecycle transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The target is not a legal successor of the current status.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: RequestStatus,
        /// Attempted target status.
        to: RequestStatus,
    },

    /// The request is in a terminal status.
    #[error("request is in terminal status {state}")]
    TerminalState {
        /// The terminal status.
        state: RequestStatus,
    },

    /// `Assigned` or `InProgress` was requested without an offer.
    #[error("transition to {to} requires an accepted dispatch offer")]
    OfferRequired {
        /// Attempted target status.
        to: RequestStatus,
    },

    /// The offer supplied does not authorize the transition.
    #[error("offer {offer_id} does not authorize this transition: {reason}")]
    OfferMismatch {
        /// The offer supplied.
        offer_id: OfferId,
        /// What was wrong with it.
        reason: String,
    },
}

// ─── Evidence and Records ────────────────────────────────────────────

/// Inputs to a transition.
#[derive(Debug, Clone)]
pub struct TransitionEvidence {
    /// Who is making the transition.
    pub actor: Actor,
    /// Optional free-text reason.
    pub reason: Option<String>,
    /// When the transition happens.
    pub at: Timestamp,
    /// The offer backing an `Assigned` or `InProgress` transition.
    pub offer: Option<DispatchOffer>,
}

impl TransitionEvidence {
    /// Evidence from `actor` at `at`, with no reason or offer.
    pub fn new(actor: Actor, at: Timestamp) -> Self {
        Self {
            actor,
            reason: None,
            at,
            offer: None,
        }
    }

    /// Attach a reason.
    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    /// Attach the offer backing the transition.
    pub fn with_offer(mut self, offer: DispatchOffer) -> Self {
        self.offer = Some(offer);
        self
    }
}

/// Record of an applied transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Status before the transition.
    pub from_status: RequestStatus,
    /// Status after the transition.
    pub to_status: RequestStatus,
    /// Who made the transition.
    pub actor: Actor,
    /// Free-text reason, if one was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// When the transition occurred.
    pub timestamp: Timestamp,
}

/// The fulfiller bound to a request by an accepted offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// The accepted offer.
    pub offer_id: OfferId,
    /// The fulfiller who accepted it.
    pub fulfiller: FulfillerId,
    /// When the assignment was recorded.
    pub assigned_at: Timestamp,
}

/// How a request came to be cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationRecord {
    /// Who cancelled.
    pub actor: Actor,
    /// Why, if stated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The status the request was cancelled from.
    pub from_status: RequestStatus,
    /// The requester cancelled after a fulfiller was assigned.
    pub post_assignment: bool,
    /// When the cancellation was recorded.
    pub cancelled_at: Timestamp,
}

// ─── Lifecycle ───────────────────────────────────────────────────────

/// The status of one request with its assignment and transition history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLifecycle {
    /// The request this lifecycle belongs to.
    pub request_id: RequestId,
    /// Ride or order path.
    pub path: FulfillmentPath,
    /// Current status.
    pub status: RequestStatus,
    /// Set on `Confirmed → Assigned`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
    /// Set on any transition to `Cancelled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation: Option<CancellationRecord>,
    /// Ordered log of all applied transitions.
    pub transitions: Vec<TransitionRecord>,
}

impl RequestLifecycle {
    /// A new lifecycle in `Created`.
    pub fn new(request_id: RequestId, request_type: RequestType) -> Self {
        Self {
            request_id,
            path: FulfillmentPath::for_request(request_type),
            status: RequestStatus::Created,
            assignment: None,
            cancellation: None,
            transitions: Vec::new(),
        }
    }

    /// Whether the request is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The assigned fulfiller, if any.
    pub fn fulfiller(&self) -> Option<&FulfillerId> {
        self.assignment.as_ref().map(|a| &a.fulfiller)
    }

    /// Check whether `to` could be applied now, ignoring offer guards.
    pub fn check(&self, to: RequestStatus) -> Result<(), LifecycleError> {
        if self.status.is_terminal() {
            return Err(LifecycleError::TerminalState { state: self.status });
        }
        if !self.path.is_legal(self.status, to) {
            return Err(LifecycleError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    /// Apply a transition to `to`.
    ///
    /// On error the lifecycle is unchanged. On success the returned record
    /// has also been appended to [`transitions`](Self::transitions).
    pub fn transition(
        &mut self,
        to: RequestStatus,
        evidence: TransitionEvidence,
    ) -> Result<TransitionRecord, LifecycleError> {
        self.check(to)?;

        match to {
            RequestStatus::Assigned => {
                let offer = self.require_offer(to, &evidence)?;
                self.assignment = Some(Assignment {
                    offer_id: offer.id,
                    fulfiller: offer.candidate.clone(),
                    assigned_at: evidence.at,
                });
            }
            RequestStatus::InProgress => {
                let offer = self.require_offer(to, &evidence)?;
                let matches = self
                    .assignment
                    .as_ref()
                    .is_some_and(|a| a.offer_id == offer.id && a.fulfiller == offer.candidate);
                if !matches {
                    return Err(LifecycleError::OfferMismatch {
                        offer_id: offer.id,
                        reason: "offer is not the recorded assignment".to_string(),
                    });
                }
            }
            RequestStatus::Cancelled => {
                let post_assignment =
                    self.assignment.is_some() && matches!(evidence.actor, Actor::Requester(_));
                self.cancellation = Some(CancellationRecord {
                    actor: evidence.actor.clone(),
                    reason: evidence.reason.clone(),
                    from_status: self.status,
                    post_assignment,
                    cancelled_at: evidence.at,
                });
            }
            _ => {}
        }

        Ok(self.do_transition(to, evidence))
    }

    /// Validate the offer carried by `evidence` for a transition to `to`.
    fn require_offer<'e>(
        &self,
        to: RequestStatus,
        evidence: &'e TransitionEvidence,
    ) -> Result<&'e DispatchOffer, LifecycleError> {
        let offer = evidence
            .offer
            .as_ref()
            .ok_or(LifecycleError::OfferRequired { to })?;
        if offer.request_id != self.request_id {
            return Err(LifecycleError::OfferMismatch {
                offer_id: offer.id,
                reason: format!("offer belongs to {}", offer.request_id),
            });
        }
        if offer.outcome != OfferOutcome::Accepted {
            return Err(LifecycleError::OfferMismatch {
                offer_id: offer.id,
                reason: format!("offer is {}, not accepted", offer.outcome),
            });
        }
        Ok(offer)
    }

    /// Record a status change.
    fn do_transition(&mut self, to: RequestStatus, evidence: TransitionEvidence) -> TransitionRecord {
        let record = TransitionRecord {
            from_status: self.status,
            to_status: to,
            actor: evidence.actor,
            reason: evidence.reason,
            timestamp: evidence.at,
        };
        self.transitions.push(record.clone());
        self.status = to;
        record
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use sakay_core::RequesterId;
    use std::time::Duration;

    fn t0() -> Timestamp {
        Timestamp::parse("2026-03-01T08:00:00Z").unwrap()
    }

    fn rider() -> Actor {
        Actor::Requester(RequesterId::new("rider-1").unwrap())
    }

    fn driver() -> Actor {
        Actor::Fulfiller(FulfillerId::new("driver-1").unwrap())
    }

    fn evidence(actor: Actor) -> TransitionEvidence {
        TransitionEvidence::new(actor, t0())
    }

    fn accepted_offer(lc: &RequestLifecycle) -> DispatchOffer {
        let mut offer = DispatchOffer::new(
            lc.request_id,
            FulfillerId::new("driver-1").unwrap(),
            1,
            t0(),
            Duration::from_secs(30),
        );
        offer.resolve(OfferOutcome::Accepted, t0()).unwrap();
        offer
    }

    fn make_assigned(request_type: RequestType) -> (RequestLifecycle, DispatchOffer) {
        let mut lc = RequestLifecycle::new(RequestId::new(), request_type);
        lc.transition(RequestStatus::Confirmed, evidence(rider())).unwrap();
        let offer = accepted_offer(&lc);
        lc.transition(
            RequestStatus::Assigned,
            evidence(Actor::System).with_offer(offer.clone()),
        )
        .unwrap();
        (lc, offer)
    }

    // ── Happy paths ──────────────────────────────────────────────────

    #[test]
    fn test_full_ride_lifecycle() {
        let (mut lc, offer) = make_assigned(RequestType::Ride);
        lc.transition(RequestStatus::InProgress, evidence(driver()).with_offer(offer))
            .unwrap();
        lc.transition(RequestStatus::ArrivedDropoff, evidence(driver())).unwrap();
        lc.transition(RequestStatus::Completed, evidence(driver())).unwrap();
        assert!(lc.is_terminal());
        assert_eq!(lc.transitions.len(), 5);
        assert_eq!(lc.fulfiller().map(|f| f.as_str()), Some("driver-1"));
    }

    #[test]
    fn test_ride_may_complete_without_arrival() {
        let (mut lc, offer) = make_assigned(RequestType::Ride);
        lc.transition(RequestStatus::InProgress, evidence(driver()).with_offer(offer))
            .unwrap();
        lc.transition(RequestStatus::Completed, evidence(driver())).unwrap();
        assert_eq!(lc.status, RequestStatus::Completed);
    }

    #[test]
    fn test_full_order_lifecycle() {
        let (mut lc, offer) = make_assigned(RequestType::Food);
        lc.transition(RequestStatus::InProgress, evidence(driver()).with_offer(offer))
            .unwrap();
        for next in [
            RequestStatus::Preparing,
            RequestStatus::Ready,
            RequestStatus::PickedUp,
            RequestStatus::OnTheWay,
            RequestStatus::Delivered,
        ] {
            lc.transition(next, evidence(driver())).unwrap();
        }
        assert_eq!(lc.status, RequestStatus::Delivered);
        assert!(lc.is_terminal());
    }

    // ── Guards ───────────────────────────────────────────────────────

    #[test]
    fn test_skip_ahead_is_rejected_and_state_unchanged() {
        let mut lc = RequestLifecycle::new(RequestId::new(), RequestType::Ride);
        let before = lc.clone();
        let err = lc
            .transition(RequestStatus::InProgress, evidence(driver()))
            .unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: RequestStatus::Created,
                to: RequestStatus::InProgress
            }
        );
        assert_eq!(lc, before);
    }

    #[test]
    fn test_assignment_requires_offer() {
        let mut lc = RequestLifecycle::new(RequestId::new(), RequestType::Ride);
        lc.transition(RequestStatus::Confirmed, evidence(rider())).unwrap();
        let err = lc
            .transition(RequestStatus::Assigned, evidence(Actor::System))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::OfferRequired { .. }));
        assert_eq!(lc.status, RequestStatus::Confirmed);
    }

    #[test]
    fn test_assignment_rejects_pending_offer() {
        let mut lc = RequestLifecycle::new(RequestId::new(), RequestType::Ride);
        lc.transition(RequestStatus::Confirmed, evidence(rider())).unwrap();
        let pending = DispatchOffer::new(
            lc.request_id,
            FulfillerId::new("driver-1").unwrap(),
            1,
            t0(),
            Duration::from_secs(30),
        );
        let err = lc
            .transition(RequestStatus::Assigned, evidence(Actor::System).with_offer(pending))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::OfferMismatch { .. }));
    }

    #[test]
    fn test_start_requires_matching_offer() {
        let (mut lc, _) = make_assigned(RequestType::Ride);
        let other = accepted_offer(&lc);
        let err = lc
            .transition(RequestStatus::InProgress, evidence(driver()).with_offer(other))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::OfferMismatch { .. }));
        assert_eq!(lc.status, RequestStatus::Assigned);
    }

    #[test]
    fn test_order_statuses_illegal_on_ride_path() {
        let (mut lc, offer) = make_assigned(RequestType::Ride);
        lc.transition(RequestStatus::InProgress, evidence(driver()).with_offer(offer))
            .unwrap();
        assert!(lc.transition(RequestStatus::Preparing, evidence(driver())).is_err());
    }

    // ── Cancellation ─────────────────────────────────────────────────

    #[test]
    fn test_cancel_before_assignment_is_not_tagged() {
        let mut lc = RequestLifecycle::new(RequestId::new(), RequestType::Grocery);
        lc.transition(RequestStatus::Confirmed, evidence(rider())).unwrap();
        lc.transition(
            RequestStatus::Cancelled,
            evidence(rider()).with_reason(Some("changed my mind".into())),
        )
        .unwrap();
        let cancellation = lc.cancellation.as_ref().unwrap();
        assert!(!cancellation.post_assignment);
        assert_eq!(cancellation.from_status, RequestStatus::Confirmed);
    }

    #[test]
    fn test_requester_cancel_after_assignment_is_tagged() {
        let (mut lc, _) = make_assigned(RequestType::Ride);
        lc.transition(RequestStatus::Cancelled, evidence(rider())).unwrap();
        assert!(lc.cancellation.as_ref().unwrap().post_assignment);
    }

    #[test]
    fn test_fulfiller_cancel_after_assignment_is_not_tagged() {
        let (mut lc, _) = make_assigned(RequestType::Ride);
        lc.transition(RequestStatus::Cancelled, evidence(driver())).unwrap();
        assert!(!lc.cancellation.as_ref().unwrap().post_assignment);
    }

    #[test]
    fn test_terminal_state_rejects_everything() {
        let mut lc = RequestLifecycle::new(RequestId::new(), RequestType::Ride);
        lc.transition(RequestStatus::Cancelled, evidence(rider())).unwrap();
        for to in RequestStatus::ALL {
            let err = lc.transition(to, evidence(rider())).unwrap_err();
            assert_eq!(
                err,
                LifecycleError::TerminalState {
                    state: RequestStatus::Cancelled
                }
            );
        }
        assert_eq!(lc.transitions.len(), 1);
    }

    #[test]
    fn test_status_names_round_trip() {
        for status in RequestStatus::ALL {
            assert_eq!(RequestStatus::from_name(status.as_str()), Some(status));
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
        }
    }
}
