//! # Matching Loop
//!
//! One task per dispatch run. The task walks the candidate list, opening one
//! offer at a time and waiting for whichever comes first: the request's
//! cancellation signal, the offer's resolution, or the end of the window.
//!
//! ```text
//! for candidate in list:
//!     open offer            (under the request lock)
//!     select! {
//!         cancelled   => stop
//!         resolved    => accepted ? stop : next
//!         window over => expire (under the lock) ; next
//!     }
//! exhausted => NoCandidatesAvailable, request stays confirmed
//! ```
//!
//! The loop never transitions the request itself. Assignment happens in the
//! responder's call, under the same lock, so the loop only learns about it.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use tokio::sync::{oneshot, watch};

use sakay_core::{FulfillerId, RequestId};
use sakay_state::{DispatchOffer, OfferOutcome, RequestStatus};

use crate::directory::CandidateQuery;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::offers::OfferCell;
use crate::service::EngineInner;

/// Control handle for a running matching task.
#[derive(Debug)]
pub(crate) struct RunHandle {
    run_id: u64,
    cancel: watch::Sender<bool>,
    done: watch::Receiver<bool>,
}

impl RunHandle {
    /// Ask the task to stop at its next check point.
    pub(crate) fn cancel(&self) {
        // A send error means the task already finished.
        let _ = self.cancel.send(true);
    }

    /// A receiver that flips to `true` when the task finishes.
    pub(crate) fn done(&self) -> watch::Receiver<bool> {
        self.done.clone()
    }
}

/// Start a matching task for `request_id`.
///
/// `prefetched` skips the first directory call when the caller already
/// holds a fresh list. Fails with `OfferOutstanding` if a task is running.
pub(crate) fn spawn(
    inner: &Arc<EngineInner>,
    request_id: RequestId,
    prefetched: Option<Vec<FulfillerId>>,
) -> Result<(), EngineError> {
    let run_id = inner.next_run.fetch_add(1, Ordering::Relaxed);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (done_tx, done_rx) = watch::channel(false);
    match inner.runs.entry(request_id) {
        Entry::Occupied(_) => return Err(EngineError::OfferOutstanding { request_id }),
        Entry::Vacant(slot) => {
            slot.insert(RunHandle {
                run_id,
                cancel: cancel_tx,
                done: done_rx,
            });
        }
    }

    let task = Arc::clone(inner);
    tokio::spawn(async move {
        run(&task, request_id, cancel_rx, prefetched).await;
        task.runs.remove_if(&request_id, |_, handle| handle.run_id == run_id);
        let _ = done_tx.send(true);
    });
    tracing::debug!(request_id = %request_id, run_id, "matching started");
    Ok(())
}

/// Ask the directory for a fresh candidate list.
pub(crate) async fn fetch_candidates(
    inner: &EngineInner,
    request_id: RequestId,
) -> Result<Vec<FulfillerId>, EngineError> {
    let record = inner
        .repository
        .get(request_id)
        .await?
        .ok_or_else(|| EngineError::request_not_found(request_id))?;
    inner
        .directory
        .candidates(&CandidateQuery::from(&record))
        .await
        .map_err(|err| EngineError::Unavailable(err.to_string()))
}

/// Publish `NoCandidatesAvailable` if the request is still waiting.
pub(crate) async fn report_exhausted(inner: &EngineInner, request_id: RequestId) {
    let _guard = inner.locks.lock(request_id).await;
    let attempts = match inner.repository.get(request_id).await {
        Ok(Some(record)) if record.status() == RequestStatus::Confirmed => record.dispatch_attempts,
        Ok(_) => return,
        Err(err) => {
            tracing::warn!(request_id = %request_id, error = %err, "could not load exhausted request");
            return;
        }
    };
    inner.sink.publish(EngineEvent::NoCandidatesAvailable {
        request_id,
        attempts,
        timestamp: inner.clock.now(),
    });
}

async fn run(
    inner: &EngineInner,
    request_id: RequestId,
    mut cancel: watch::Receiver<bool>,
    prefetched: Option<Vec<FulfillerId>>,
) {
    let candidates = match prefetched {
        Some(list) => list,
        None => match fetch_candidates(inner, request_id).await {
            Ok(list) => list,
            Err(err) => {
                tracing::warn!(request_id = %request_id, error = %err, "candidate lookup failed");
                Vec::new()
            }
        },
    };

    for candidate in candidates {
        if *cancel.borrow() {
            return;
        }
        let (cell, resolved) = match open_offer(inner, request_id, candidate).await {
            Ok(Some(opened)) => opened,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(request_id = %request_id, error = %err, "could not open offer");
                return;
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.changed() => return,
            outcome = resolved => outcome.unwrap_or_else(|_| cell.outcome()),
            _ = tokio::time::sleep(inner.config.offer_window) => expire_offer(inner, &cell).await,
        };
        if outcome == OfferOutcome::Accepted {
            return;
        }
    }

    report_exhausted(inner, request_id).await;
}

/// Open the next offer. `None` means the request left `confirmed`.
async fn open_offer(
    inner: &EngineInner,
    request_id: RequestId,
    candidate: FulfillerId,
) -> Result<Option<(Arc<OfferCell>, oneshot::Receiver<OfferOutcome>)>, EngineError> {
    let _guard = inner.locks.lock(request_id).await;
    let Some(mut record) = inner.repository.get(request_id).await? else {
        return Ok(None);
    };
    if record.status() != RequestStatus::Confirmed {
        return Ok(None);
    }

    let now = inner.clock.now();
    let attempt = record.dispatch_attempts.saturating_add(1);
    let offer = DispatchOffer::new(request_id, candidate, attempt, now, inner.config.offer_window);
    let (cell, resolved) = inner.offers.open(offer)?;

    let expected = record.version;
    record.last_offer_id = Some(cell.id());
    record.dispatch_attempts = attempt;
    record.updated_at = now;
    if let Err(err) = inner.repository.update(record, expected).await {
        // Never announced, so no resolution event.
        let _ = cell.try_resolve(OfferOutcome::Expired, now);
        return Err(err.into());
    }

    inner.sink.publish(EngineEvent::OfferCreated {
        offer: cell.snapshot(),
    });
    Ok(Some((cell, resolved)))
}

/// The window elapsed. Returns whatever outcome the offer ends with.
async fn expire_offer(inner: &EngineInner, cell: &OfferCell) -> OfferOutcome {
    let _guard = inner.locks.lock(cell.request_id()).await;
    match cell.try_resolve(OfferOutcome::Expired, inner.clock.now()) {
        Ok(offer) => {
            inner.sink.publish(EngineEvent::offer_resolved(&offer));
            OfferOutcome::Expired
        }
        Err(existing) => existing,
    }
}
