//! # Engine Events
//!
//! The engine's only side-channel output. Delivery is at-least-once: a sink
//! may see the same event twice after a retry, and consumers deduplicate on
//! [`EngineEvent::dedup_key`].

use parking_lot::Mutex;
use serde::Serialize;

use sakay_core::{Actor, FulfillerId, OfferId, RequestId, Timestamp};
use sakay_state::{DispatchOffer, OfferOutcome, RequestStatus, TransitionRecord};

/// Something observable happened to a request or offer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A request changed status.
    Transition {
        /// The request.
        request_id: RequestId,
        /// Status before.
        from_status: RequestStatus,
        /// Status after.
        to_status: RequestStatus,
        /// Who made the change.
        actor: Actor,
        /// When.
        timestamp: Timestamp,
    },
    /// An offer was pushed to a candidate.
    OfferCreated {
        /// The offer as created.
        offer: DispatchOffer,
    },
    /// An offer reached its final outcome.
    OfferResolved {
        /// The offer.
        offer_id: OfferId,
        /// Its request.
        request_id: RequestId,
        /// The candidate it was made to.
        candidate: FulfillerId,
        /// Accepted, declined or expired.
        outcome: OfferOutcome,
        /// When.
        timestamp: Timestamp,
    },
    /// The candidate list ran out; the request stays confirmed.
    NoCandidatesAvailable {
        /// The request.
        request_id: RequestId,
        /// Offers made so far.
        attempts: u32,
        /// When.
        timestamp: Timestamp,
    },
}

impl EngineEvent {
    /// Build a transition event from an audit record.
    pub fn transition(request_id: RequestId, record: &TransitionRecord) -> Self {
        Self::Transition {
            request_id,
            from_status: record.from_status,
            to_status: record.to_status,
            actor: record.actor.clone(),
            timestamp: record.timestamp,
        }
    }

    /// Build a resolution event from a resolved offer.
    pub fn offer_resolved(offer: &DispatchOffer) -> Self {
        Self::OfferResolved {
            offer_id: offer.id,
            request_id: offer.request_id,
            candidate: offer.candidate.clone(),
            outcome: offer.outcome,
            timestamp: offer.resolved_at.unwrap_or(offer.offered_at),
        }
    }

    /// The request this event concerns.
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Transition { request_id, .. }
            | Self::OfferResolved { request_id, .. }
            | Self::NoCandidatesAvailable { request_id, .. } => *request_id,
            Self::OfferCreated { offer } => offer.request_id,
        }
    }

    /// Identity for deduplication: `(request, to_status)` for transitions,
    /// `(offer, outcome)` for offers.
    pub fn dedup_key(&self) -> String {
        match self {
            Self::Transition {
                request_id,
                to_status,
                ..
            } => format!("{request_id}:{to_status}"),
            Self::OfferCreated { offer } => format!("{}:{}", offer.id, OfferOutcome::Pending),
            Self::OfferResolved {
                offer_id, outcome, ..
            } => format!("{offer_id}:{outcome}"),
            Self::NoCandidatesAvailable {
                request_id,
                attempts,
                ..
            } => format!("{request_id}:no_candidates:{attempts}"),
        }
    }

    /// Short name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transition { .. } => "transition",
            Self::OfferCreated { .. } => "offer_created",
            Self::OfferResolved { .. } => "offer_resolved",
            Self::NoCandidatesAvailable { .. } => "no_candidates_available",
        }
    }
}

/// Receives engine events.
///
/// `publish` is called while the request's lock is held and must not block
/// for long; sinks that deliver over the network should enqueue.
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    fn publish(&self, event: EngineEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: EngineEvent) {
        match &event {
            EngineEvent::Transition {
                request_id,
                from_status,
                to_status,
                actor,
                ..
            } => tracing::info!(
                request_id = %request_id,
                from = %from_status,
                to = %to_status,
                actor = %actor,
                "request transitioned"
            ),
            EngineEvent::OfferCreated { offer } => tracing::info!(
                request_id = %offer.request_id,
                offer_id = %offer.id,
                candidate = %offer.candidate,
                expires_at = %offer.expires_at,
                "offer created"
            ),
            EngineEvent::OfferResolved {
                request_id,
                offer_id,
                outcome,
                ..
            } => tracing::info!(
                request_id = %request_id,
                offer_id = %offer_id,
                outcome = %outcome,
                "offer resolved"
            ),
            EngineEvent::NoCandidatesAvailable {
                request_id,
                attempts,
                ..
            } => tracing::warn!(
                request_id = %request_id,
                attempts,
                "no candidates available"
            ),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    /// Events concerning `request_id`, in order.
    pub fn events_for(&self, request_id: RequestId) -> Vec<EngineEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.request_id() == request_id)
            .cloned()
            .collect()
    }

    /// Target statuses of the transitions of `request_id`, in order.
    pub fn statuses_for(&self, request_id: RequestId) -> Vec<RequestStatus> {
        self.events_for(request_id)
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::Transition { to_status, .. } => Some(to_status),
                _ => None,
            })
            .collect()
    }

    /// Offers created for `request_id`, in order.
    pub fn offers_for(&self, request_id: RequestId) -> Vec<DispatchOffer> {
        self.events_for(request_id)
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::OfferCreated { offer } => Some(offer),
                _ => None,
            })
            .collect()
    }

    /// Number of events published.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing was published.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}
