//! # Live Offers
//!
//! [`OfferBook`] holds every offer the engine has made. An [`OfferCell`]
//! stores the offer's outcome in an `AtomicU8`; resolving it is a single
//! compare-and-swap from `Pending`, so when an accept, a decline, the
//! countdown and a cancellation race, exactly one of them takes effect. The
//! winner also wakes the matching loop through the cell's one-shot channel.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use sakay_core::{OfferId, RequestId, Timestamp};
use sakay_state::{DispatchOffer, OfferOutcome};

use crate::error::EngineError;

/// One offer and its atomically resolved outcome.
#[derive(Debug)]
pub struct OfferCell {
    offer: DispatchOffer,
    outcome: AtomicU8,
    resolved_at: Mutex<Option<Timestamp>>,
    notify: Mutex<Option<oneshot::Sender<OfferOutcome>>>,
}

impl OfferCell {
    fn new(offer: DispatchOffer) -> (Arc<Self>, oneshot::Receiver<OfferOutcome>) {
        let (tx, rx) = oneshot::channel();
        let cell = Self {
            outcome: AtomicU8::new(offer.outcome.as_u8()),
            resolved_at: Mutex::new(offer.resolved_at),
            offer,
            notify: Mutex::new(Some(tx)),
        };
        (Arc::new(cell), rx)
    }

    /// The offer identifier.
    pub fn id(&self) -> OfferId {
        self.offer.id
    }

    /// The request on offer.
    pub fn request_id(&self) -> RequestId {
        self.offer.request_id
    }

    /// The current outcome.
    pub fn outcome(&self) -> OfferOutcome {
        OfferOutcome::from_u8(self.outcome.load(Ordering::Acquire))
    }

    /// The offer with its current outcome.
    pub fn snapshot(&self) -> DispatchOffer {
        let mut offer = self.offer.clone();
        offer.outcome = self.outcome();
        offer.resolved_at = *self.resolved_at.lock();
        offer
    }

    /// Resolve a pending offer to `outcome`.
    ///
    /// Returns the resolved snapshot, or the existing outcome if another
    /// resolution got there first.
    pub fn try_resolve(&self, outcome: OfferOutcome, at: Timestamp) -> Result<DispatchOffer, OfferOutcome> {
        self.outcome
            .compare_exchange(
                OfferOutcome::Pending.as_u8(),
                outcome.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(OfferOutcome::from_u8)?;
        *self.resolved_at.lock() = Some(at);
        if let Some(tx) = self.notify.lock().take() {
            // The loop may already have stopped listening.
            let _ = tx.send(outcome);
        }
        Ok(self.snapshot())
    }
}

/// Every offer made, indexed by offer and by request.
#[derive(Debug, Default)]
pub struct OfferBook {
    offers: DashMap<OfferId, Arc<OfferCell>>,
    by_request: DashMap<RequestId, Vec<OfferId>>,
}

impl OfferBook {
    /// An empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending offer.
    ///
    /// Fails with `OfferOutstanding` if the request already has a pending
    /// offer. Returns the cell and the receiver woken on resolution.
    pub fn open(
        &self,
        offer: DispatchOffer,
    ) -> Result<(Arc<OfferCell>, oneshot::Receiver<OfferOutcome>), EngineError> {
        let request_id = offer.request_id;
        let mut ids = self.by_request.entry(request_id).or_default();
        let outstanding = ids.iter().any(|id| {
            self.offers
                .get(id)
                .is_some_and(|cell| cell.outcome() == OfferOutcome::Pending)
        });
        if outstanding {
            return Err(EngineError::OfferOutstanding { request_id });
        }
        let (cell, rx) = OfferCell::new(offer);
        self.offers.insert(cell.id(), Arc::clone(&cell));
        ids.push(cell.id());
        Ok((cell, rx))
    }

    /// Look up an offer.
    pub fn get(&self, id: OfferId) -> Option<Arc<OfferCell>> {
        self.offers.get(&id).map(|c| Arc::clone(c.value()))
    }

    /// The pending offer of a request, if any.
    pub fn pending_for(&self, request_id: RequestId) -> Option<Arc<OfferCell>> {
        let ids = self.by_request.get(&request_id)?;
        ids.iter()
            .filter_map(|id| self.get(*id))
            .find(|cell| cell.outcome() == OfferOutcome::Pending)
    }

    /// Snapshots of every offer made for a request, oldest first.
    pub fn for_request(&self, request_id: RequestId) -> Vec<DispatchOffer> {
        let Some(ids) = self.by_request.get(&request_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.get(*id))
            .map(|cell| cell.snapshot())
            .collect()
    }
}
