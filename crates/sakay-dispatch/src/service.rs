//! # Dispatch Engine
//!
//! The service boundary. Each mutating operation follows the same shape:
//!
//! 1. take the request's lock,
//! 2. load the record and check the actor may act on it,
//! 3. apply the change to a copy (lifecycle transition, promo, fare),
//! 4. persist with an optimistic version check,
//! 5. publish events, still under the lock.
//!
//! A failure before step 4 leaves storage untouched. A failure in step 4
//! undoes any promo use taken in step 3.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use dashmap::DashMap;

use sakay_core::{
    Actor, Clock, FulfillerId, OfferId, RequestId, RequestType, RequesterId, SystemClock,
    ValidationError, VehicleClass,
};
use sakay_pricing::{
    DiscountDescriptor, FareQuote, FlatSurge, PromoBook, QuoteInput, SurgeMultiplier, SurgeSource,
    Tariff,
};
use sakay_state::{
    DispatchOffer, OfferError, OfferOutcome, OfferResponse, RequestStatus, TransitionEvidence,
};

use crate::config::EngineConfig;
use crate::coordinator::{self, RunHandle};
use crate::directory::{CandidateDirectory, StaticDirectory};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventSink, TracingSink};
use crate::locks::LockTable;
use crate::offers::OfferBook;
use crate::repository::{InMemoryRequests, RepositoryError, RequestRepository};
use crate::request::{AppliedPromo, RequestParams, RequestRecord};

/// Shared state behind every [`DispatchEngine`] clone and matching task.
pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    pub(crate) repository: Arc<dyn RequestRepository>,
    pub(crate) directory: Arc<dyn CandidateDirectory>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) tariff: Tariff,
    pub(crate) promos: Arc<PromoBook>,
    pub(crate) surge: Arc<dyn SurgeSource>,
    pub(crate) locks: LockTable,
    pub(crate) offers: OfferBook,
    pub(crate) runs: DashMap<RequestId, RunHandle>,
    pub(crate) next_run: AtomicU64,
}

/// Result of [`DispatchEngine::create_request`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOutcome {
    /// The stored request.
    pub record: RequestRecord,
    /// `true` when an earlier request with the same idempotency key was returned.
    pub replayed: bool,
}

// ─── Builder ─────────────────────────────────────────────────────────

/// Assembles a [`DispatchEngine`]. Every collaborator has an in-process default.
pub struct EngineBuilder {
    config: EngineConfig,
    repository: Arc<dyn RequestRepository>,
    directory: Arc<dyn CandidateDirectory>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    tariff: Tariff,
    promos: Arc<PromoBook>,
    surge: Arc<dyn SurgeSource>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            repository: Arc::new(InMemoryRequests::new()),
            directory: Arc::new(StaticDirectory::default()),
            sink: Arc::new(TracingSink),
            clock: Arc::new(SystemClock),
            tariff: Tariff::standard(),
            promos: Arc::new(PromoBook::new()),
            surge: Arc::new(FlatSurge::default()),
        }
    }
}

impl EngineBuilder {
    /// Engine tunables.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Request storage.
    pub fn repository(mut self, repository: Arc<dyn RequestRepository>) -> Self {
        self.repository = repository;
        self
    }

    /// Candidate ranking.
    pub fn directory(mut self, directory: Arc<dyn CandidateDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Event delivery.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Time source for offers, promos and audit records.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fare rates.
    pub fn tariff(mut self, tariff: Tariff) -> Self {
        self.tariff = tariff;
        self
    }

    /// Promo registry.
    pub fn promos(mut self, promos: Arc<PromoBook>) -> Self {
        self.promos = promos;
        self
    }

    /// Surge multiplier source.
    pub fn surge(mut self, surge: Arc<dyn SurgeSource>) -> Self {
        self.surge = surge;
        self
    }

    /// Finish building.
    pub fn build(self) -> DispatchEngine {
        DispatchEngine {
            inner: Arc::new(EngineInner {
                config: self.config,
                repository: self.repository,
                directory: self.directory,
                sink: self.sink,
                clock: self.clock,
                tariff: self.tariff,
                promos: self.promos,
                surge: self.surge,
                locks: LockTable::new(),
                offers: OfferBook::new(),
                runs: DashMap::new(),
                next_run: AtomicU64::new(1),
            }),
        }
    }
}

// ─── Engine ──────────────────────────────────────────────────────────

/// Request service and dispatch coordinator. Cheap to clone.
#[derive(Clone)]
pub struct DispatchEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("config", &self.inner.config)
            .field("running", &self.inner.runs.len())
            .finish_non_exhaustive()
    }
}

impl DispatchEngine {
    /// Start configuring an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Engine tunables.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The promo registry.
    pub fn promos(&self) -> &Arc<PromoBook> {
        &self.inner.promos
    }

    /// The fare rates.
    pub fn tariff(&self) -> &Tariff {
        &self.inner.tariff
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Price and store a new request in `created`.
    ///
    /// A promo given here is validated but not consumed; the use is taken on
    /// confirmation. A retry carrying an idempotency key already seen returns
    /// the original request, provided it belongs to the same requester.
    pub async fn create_request(
        &self,
        params: RequestParams,
        idempotency_key: Option<String>,
    ) -> Result<CreateOutcome, EngineError> {
        params.validate()?;
        let key = idempotency_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if let Some(key) = &key {
            if let Some(existing) = self.inner.repository.find_by_idempotency_key(key).await? {
                return replay(existing, &params.requester);
            }
        }

        let now = self.inner.clock.now();
        let surge = self
            .inner
            .surge
            .multiplier(params.request_type, params.vehicle_class, now);
        let input = QuoteInput {
            distance_meters: params.distance_meters,
            duration_seconds: params.duration_seconds,
            vehicle_class: params.vehicle_class,
            surge,
        };
        let (fare, promo) = match &params.promo_code {
            Some(code) => {
                let (fare, descriptor) =
                    self.price_with_promo(&input, code, params.request_type, &params.requester)?;
                let applied = AppliedPromo {
                    code: descriptor.code.clone(),
                    descriptor,
                    consumed: false,
                };
                (fare, Some(applied))
            }
            None => (self.inner.tariff.quote(&input, None)?, None),
        };

        let requester = params.requester.clone();
        let record = RequestRecord::new(params, key, surge, fare, promo, now);
        match self.inner.repository.insert(record.clone()).await {
            Ok(()) => {
                tracing::info!(
                    request_id = %record.id,
                    request_type = %record.request_type,
                    requester = %record.requester,
                    total = %record.fare.total,
                    "request created"
                );
                Ok(CreateOutcome {
                    record,
                    replayed: false,
                })
            }
            Err(RepositoryError::DuplicateKey { key, .. }) => {
                let existing = self
                    .inner
                    .repository
                    .find_by_idempotency_key(&key)
                    .await?
                    .ok_or_else(|| {
                        EngineError::Unavailable(format!("idempotency key {key:?} lost its request"))
                    })?;
                replay(existing, &requester)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Attach or replace the promo of a pre-assignment request.
    ///
    /// In `created` the promo replaces any earlier one and is only validated.
    /// In `confirmed` it is allowed only when no promo is attached yet, and
    /// the use is consumed immediately.
    pub async fn apply_promo(
        &self,
        id: RequestId,
        code: &str,
        actor: Actor,
    ) -> Result<RequestRecord, EngineError> {
        if code.trim().is_empty() {
            return Err(ValidationError::Missing("code").into());
        }
        let _guard = self.inner.locks.lock(id).await;
        let mut record = self.load(id).await?;
        self.ensure_requester_or_operator(&record, &actor, "apply a promo to")?;

        let status = record.status();
        if !status.is_pre_assignment() {
            return Err(ValidationError::Invalid(format!(
                "promos cannot be applied to a request in {status}"
            ))
            .into());
        }

        let input = record.quote_input();
        if status == RequestStatus::Created {
            let (fare, descriptor) =
                self.price_with_promo(&input, code, record.request_type, &record.requester)?;
            record.fare = fare;
            record.promo = Some(AppliedPromo {
                code: descriptor.code.clone(),
                descriptor,
                consumed: false,
            });
            return self.save(record).await;
        }

        if let Some(existing) = &record.promo {
            return Err(ValidationError::Invalid(format!(
                "promo {} is already applied to this request",
                existing.code
            ))
            .into());
        }
        let (fare, _) = self.price_with_promo(&input, code, record.request_type, &record.requester)?;
        let descriptor = self.inner.promos.consume(
            code,
            fare.subtotal(),
            record.request_type,
            &record.requester,
            self.inner.clock.now(),
        )?;
        let requester = record.requester.clone();
        let applied_code = descriptor.code.clone();
        record.fare = fare;
        record.promo = Some(AppliedPromo {
            code: applied_code.clone(),
            descriptor,
            consumed: true,
        });
        match self.save(record).await {
            Ok(stored) => Ok(stored),
            Err(err) => {
                self.inner.promos.release(&applied_code, &requester);
                Err(err)
            }
        }
    }

    /// Detach the promo of a `created` request and reprice without it.
    ///
    /// This is the way out when an attached promo expired or ran out before
    /// confirmation. Once confirmed, the use is spent and the promo stays.
    /// Removing from a request with no promo returns it unchanged.
    pub async fn remove_promo(
        &self,
        id: RequestId,
        actor: Actor,
    ) -> Result<RequestRecord, EngineError> {
        let _guard = self.inner.locks.lock(id).await;
        let mut record = self.load(id).await?;
        self.ensure_requester_or_operator(&record, &actor, "remove the promo of")?;
        let status = record.status();
        if status != RequestStatus::Created {
            return Err(ValidationError::Invalid(format!(
                "the promo of a request in {status} cannot be removed"
            ))
            .into());
        }
        let Some(removed) = record.promo.take() else {
            return Ok(record);
        };

        record.fare = self.inner.tariff.quote(&record.quote_input(), None)?;
        let stored = self.save(record).await?;
        tracing::info!(
            request_id = %id,
            promo = %removed.code,
            total = %stored.fare.total,
            "promo removed"
        );
        Ok(stored)
    }

    /// Move a request from `created` to `confirmed` and start matching.
    ///
    /// An attached promo is consumed here. If the promo no longer applies the
    /// request stays in `created`.
    pub async fn confirm(&self, id: RequestId, actor: Actor) -> Result<RequestRecord, EngineError> {
        let guard = self.inner.locks.lock(id).await;
        let mut record = self.load(id).await?;
        self.ensure_requester_or_operator(&record, &actor, "confirm")?;
        let from = record.status();
        record
            .lifecycle
            .check(RequestStatus::Confirmed)
            .map_err(|err| EngineError::from_lifecycle(err, from, RequestStatus::Confirmed))?;

        let now = self.inner.clock.now();
        let mut consumed = None;
        if let Some(promo) = record.promo.clone().filter(|p| !p.consumed) {
            let input = record.quote_input();
            let undiscounted = self.inner.tariff.quote(&input, None)?;
            let descriptor = self.inner.promos.consume(
                &promo.code,
                undiscounted.subtotal(),
                record.request_type,
                &record.requester,
                now,
            )?;
            consumed = Some(promo.code.clone());
            match self.inner.tariff.quote(&input, Some(&descriptor)) {
                Ok(fare) => record.fare = fare,
                Err(err) => {
                    self.inner.promos.release(&promo.code, &record.requester);
                    return Err(err.into());
                }
            }
            record.promo = Some(AppliedPromo {
                code: promo.code,
                descriptor,
                consumed: true,
            });
        }

        let requester = record.requester.clone();
        let release = |code: &Option<String>| {
            if let Some(code) = code {
                self.inner.promos.release(code, &requester);
            }
        };
        let transition = match record
            .lifecycle
            .transition(RequestStatus::Confirmed, TransitionEvidence::new(actor, now))
        {
            Ok(transition) => transition,
            Err(err) => {
                release(&consumed);
                return Err(EngineError::from_lifecycle(err, from, RequestStatus::Confirmed));
            }
        };
        let stored = match self.save(record).await {
            Ok(stored) => stored,
            Err(err) => {
                release(&consumed);
                return Err(err);
            }
        };
        self.inner.sink.publish(EngineEvent::transition(id, &transition));

        if let Err(err) = coordinator::spawn(&self.inner, id, None) {
            tracing::warn!(request_id = %id, error = %err, "matching not started");
        }
        drop(guard);
        Ok(stored)
    }

    /// Answer an offer on behalf of the candidate it was made to.
    ///
    /// Accepting assigns the request to the responder; the assignment is
    /// persisted before the offer is marked accepted, so a storage failure
    /// leaves the offer open. A response at or after `expires_at` expires
    /// the offer and is refused with `OfferExpired`.
    pub async fn respond_to_offer(
        &self,
        offer_id: OfferId,
        responder: FulfillerId,
        response: OfferResponse,
    ) -> Result<DispatchOffer, EngineError> {
        let cell = self
            .inner
            .offers
            .get(offer_id)
            .ok_or_else(|| EngineError::offer_not_found(offer_id))?;
        let request_id = cell.request_id();
        let _guard = self.inner.locks.lock(request_id).await;
        let now = self.inner.clock.now();
        let snapshot = cell.snapshot();

        match snapshot.evaluate_response(&responder, response, now) {
            Ok(_) => {}
            Err(OfferError::NotOfferedTo { .. }) => {
                return Err(EngineError::NotPermitted {
                    actor: Actor::Fulfiller(responder).to_string(),
                    action: "respond to",
                });
            }
            Err(OfferError::AlreadyResolved {
                outcome: OfferOutcome::Expired,
                ..
            }) => {
                tracing::info!(offer_id = %offer_id, responder = %responder, "response to expired offer");
                return Err(EngineError::OfferExpired { offer_id });
            }
            Err(OfferError::AlreadyResolved { outcome, .. }) => {
                return Err(EngineError::OfferAlreadyResolved { offer_id, outcome });
            }
            Err(OfferError::Expired { expires_at, .. }) => {
                if let Ok(expired) = cell.try_resolve(OfferOutcome::Expired, now) {
                    self.inner.sink.publish(EngineEvent::offer_resolved(&expired));
                }
                tracing::info!(
                    offer_id = %offer_id,
                    responder = %responder,
                    expires_at = %expires_at,
                    "late offer response"
                );
                return Err(EngineError::OfferExpired { offer_id });
            }
        }

        let already = |outcome| EngineError::OfferAlreadyResolved { offer_id, outcome };
        match response {
            OfferResponse::Decline => {
                let declined = cell.try_resolve(OfferOutcome::Declined, now).map_err(already)?;
                self.inner.sink.publish(EngineEvent::offer_resolved(&declined));
                Ok(declined)
            }
            OfferResponse::Accept => {
                let mut record = self.load(request_id).await?;
                let from = record.status();
                let mut accepted = snapshot;
                accepted.outcome = OfferOutcome::Accepted;
                accepted.resolved_at = Some(now);
                let evidence = TransitionEvidence::new(Actor::Fulfiller(responder), now)
                    .with_offer(accepted);
                let transition = record
                    .lifecycle
                    .transition(RequestStatus::Assigned, evidence)
                    .map_err(|err| EngineError::from_lifecycle(err, from, RequestStatus::Assigned))?;
                self.save(record).await?;

                let accepted = cell.try_resolve(OfferOutcome::Accepted, now).map_err(already)?;
                self.inner.sink.publish(EngineEvent::transition(request_id, &transition));
                self.inner.sink.publish(EngineEvent::offer_resolved(&accepted));
                Ok(accepted)
            }
        }
    }

    /// Cancel a non-terminal request.
    ///
    /// Any pending offer expires at once and the matching task stops.
    pub async fn cancel(
        &self,
        id: RequestId,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<RequestRecord, EngineError> {
        let guard = self.inner.locks.lock(id).await;
        let mut record = self.load(id).await?;
        let may_cancel = actor.is_operator()
            || actor.is_requester(&record.requester)
            || record.fulfiller().is_some_and(|f| actor.is_fulfiller(f));
        if !may_cancel {
            return Err(self.refuse(&record, &actor, "cancel"));
        }

        let now = self.inner.clock.now();
        let from = record.status();
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let evidence = TransitionEvidence::new(actor, now).with_reason(reason);
        let transition = record
            .lifecycle
            .transition(RequestStatus::Cancelled, evidence)
            .map_err(|err| EngineError::from_lifecycle(err, from, RequestStatus::Cancelled))?;
        let stored = self.save(record).await?;
        self.inner.sink.publish(EngineEvent::transition(id, &transition));

        if let Some(cell) = self.inner.offers.pending_for(id) {
            if let Ok(expired) = cell.try_resolve(OfferOutcome::Expired, now) {
                self.inner.sink.publish(EngineEvent::offer_resolved(&expired));
            }
        }
        if let Some((_, run)) = self.inner.runs.remove(&id) {
            run.cancel();
        }
        drop(guard);
        Ok(stored)
    }

    /// Apply a forward transition that is not part of dispatch.
    ///
    /// `confirmed`, `assigned` and `cancelled` have their own operations and
    /// are refused here. When `expected_version` is given and the stored
    /// request has moved on, nothing changes and `StaleState` is returned.
    pub async fn advance_status(
        &self,
        id: RequestId,
        target: RequestStatus,
        actor: Actor,
        expected_version: Option<u64>,
    ) -> Result<RequestRecord, EngineError> {
        if matches!(
            target,
            RequestStatus::Confirmed | RequestStatus::Assigned | RequestStatus::Cancelled
        ) {
            return Err(ValidationError::Invalid(format!(
                "{target} is reached through its own operation, not a status update"
            ))
            .into());
        }

        let guard = self.inner.locks.lock(id).await;
        let mut record = self.load(id).await?;
        if let Some(expected) = expected_version {
            if expected != record.version {
                return Err(EngineError::StaleState {
                    request_id: id,
                    expected,
                    actual: record.version,
                });
            }
        }
        let may_advance =
            actor.is_operator() || record.fulfiller().is_some_and(|f| actor.is_fulfiller(f));
        if !may_advance {
            return Err(self.refuse(&record, &actor, "advance"));
        }

        let now = self.inner.clock.now();
        let from = record.status();
        let mut evidence = TransitionEvidence::new(actor, now);
        if target == RequestStatus::InProgress {
            let assigned_offer = record
                .lifecycle
                .assignment
                .as_ref()
                .and_then(|a| self.inner.offers.get(a.offer_id));
            if let Some(cell) = assigned_offer {
                evidence = evidence.with_offer(cell.snapshot());
            }
        }
        let transition = record
            .lifecycle
            .transition(target, evidence)
            .map_err(|err| EngineError::from_lifecycle(err, from, target))?;
        let stored = self.save(record).await?;
        self.inner.sink.publish(EngineEvent::transition(id, &transition));

        drop(guard);
        Ok(stored)
    }

    /// Restart matching for a `confirmed` request after `NoCandidatesAvailable`.
    ///
    /// Fetches a fresh list first; an empty list is reported synchronously.
    pub async fn redispatch(&self, id: RequestId, actor: Actor) -> Result<RequestRecord, EngineError> {
        let _guard = self.inner.locks.lock(id).await;
        let record = self.load(id).await?;
        self.ensure_requester_or_operator(&record, &actor, "redispatch")?;
        if record.status() != RequestStatus::Confirmed {
            return Err(EngineError::InvalidTransition {
                from: record.status(),
                to: RequestStatus::Assigned,
                detail: "only confirmed requests can be dispatched".to_string(),
            });
        }
        if self.inner.runs.contains_key(&id) || self.inner.offers.pending_for(id).is_some() {
            return Err(EngineError::OfferOutstanding { request_id: id });
        }

        let candidates = coordinator::fetch_candidates(&self.inner, id).await?;
        if candidates.is_empty() {
            self.inner.sink.publish(EngineEvent::NoCandidatesAvailable {
                request_id: id,
                attempts: record.dispatch_attempts,
                timestamp: self.inner.clock.now(),
            });
            return Err(EngineError::NoCandidatesAvailable { request_id: id });
        }
        tracing::info!(request_id = %id, candidates = candidates.len(), "redispatching");
        coordinator::spawn(&self.inner, id, Some(candidates))?;
        Ok(record)
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Load one request.
    pub async fn get(&self, id: RequestId) -> Result<RequestRecord, EngineError> {
        self.load(id).await
    }

    /// Every request of `requester`, oldest first.
    pub async fn list_by_requester(
        &self,
        requester: &RequesterId,
    ) -> Result<Vec<RequestRecord>, EngineError> {
        Ok(self.inner.repository.find_by_requester(requester).await?)
    }

    /// Every request currently in `status`, oldest first.
    pub async fn list_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<RequestRecord>, EngineError> {
        Ok(self.inner.repository.find_by_status(status).await?)
    }

    /// Every offer made for a request, oldest first.
    pub fn offers_for(&self, id: RequestId) -> Vec<DispatchOffer> {
        self.inner.offers.for_request(id)
    }

    /// Look up a single offer.
    pub fn offer(&self, id: OfferId) -> Result<DispatchOffer, EngineError> {
        self.inner
            .offers
            .get(id)
            .map(|cell| cell.snapshot())
            .ok_or_else(|| EngineError::offer_not_found(id))
    }

    /// Whether a matching task is running for `id`.
    pub fn is_dispatching(&self, id: RequestId) -> bool {
        self.inner.runs.contains_key(&id)
    }

    /// Wait until the matching task for `id`, if any, has finished.
    pub async fn await_dispatch(&self, id: RequestId) {
        let Some(mut done) = self.inner.runs.get(&id).map(|run| run.done()) else {
            return;
        };
        // An error means the task ended without signalling.
        let _ = done.wait_for(|finished| *finished).await;
    }

    /// The surge multiplier a request of this type and class would be priced at now.
    pub fn current_surge(&self, request_type: RequestType, class: VehicleClass) -> SurgeMultiplier {
        self.inner
            .surge
            .multiplier(request_type, class, self.inner.clock.now())
    }

    /// Price a trip without storing anything. A promo is validated, never consumed.
    pub fn quote(
        &self,
        input: &QuoteInput,
        request_type: RequestType,
        promo: Option<(&str, &RequesterId)>,
    ) -> Result<FareQuote, EngineError> {
        match promo {
            Some((code, requester)) => {
                let (fare, _) = self.price_with_promo(input, code, request_type, requester)?;
                Ok(fare)
            }
            None => Ok(self.inner.tariff.quote(input, None)?),
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn load(&self, id: RequestId) -> Result<RequestRecord, EngineError> {
        self.inner
            .repository
            .get(id)
            .await?
            .ok_or_else(|| EngineError::request_not_found(id))
    }

    async fn save(&self, mut record: RequestRecord) -> Result<RequestRecord, EngineError> {
        let expected = record.version;
        record.updated_at = self.inner.clock.now();
        Ok(self.inner.repository.update(record, expected).await?)
    }

    /// Whether `actor` may know that `record` exists: operators, its
    /// requester, its assigned fulfiller and every candidate it was offered to.
    fn can_see(&self, record: &RequestRecord, actor: &Actor) -> bool {
        if actor.is_operator() || actor.is_requester(&record.requester) {
            return true;
        }
        match actor {
            Actor::Fulfiller(fulfiller) => {
                record.fulfiller() == Some(fulfiller)
                    || self
                        .inner
                        .offers
                        .for_request(record.id)
                        .iter()
                        .any(|offer| &offer.candidate == fulfiller)
            }
            _ => false,
        }
    }

    /// The refusal for `actor`. Callers who cannot see the request are told
    /// it does not exist.
    fn refuse(&self, record: &RequestRecord, actor: &Actor, action: &'static str) -> EngineError {
        if self.can_see(record, actor) {
            not_permitted(actor, action)
        } else {
            EngineError::request_not_found(record.id)
        }
    }

    fn ensure_requester_or_operator(
        &self,
        record: &RequestRecord,
        actor: &Actor,
        action: &'static str,
    ) -> Result<(), EngineError> {
        if actor.is_operator() || actor.is_requester(&record.requester) {
            Ok(())
        } else {
            Err(self.refuse(record, actor, action))
        }
    }

    /// Validate `code` against the undiscounted subtotal and price with it.
    fn price_with_promo(
        &self,
        input: &QuoteInput,
        code: &str,
        request_type: RequestType,
        requester: &RequesterId,
    ) -> Result<(FareQuote, DiscountDescriptor), EngineError> {
        let undiscounted = self.inner.tariff.quote(input, None)?;
        let descriptor = self.inner.promos.validate(
            code,
            undiscounted.subtotal(),
            request_type,
            requester,
            self.inner.clock.now(),
        )?;
        let fare = self.inner.tariff.quote(input, Some(&descriptor))?;
        Ok((fare, descriptor))
    }
}

fn replay(existing: RequestRecord, requester: &RequesterId) -> Result<CreateOutcome, EngineError> {
    if &existing.requester != requester {
        return Err(ValidationError::Invalid(
            "idempotency key is already used by another requester".to_string(),
        )
        .into());
    }
    tracing::debug!(request_id = %existing.id, "idempotent replay");
    Ok(CreateOutcome {
        record: existing,
        replayed: true,
    })
}

fn not_permitted(actor: &Actor, action: &'static str) -> EngineError {
    EngineError::NotPermitted {
        actor: actor.to_string(),
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sakay_core::{PaymentMethod, Place};

    fn rider() -> RequesterId {
        RequesterId::new("rider-1").unwrap()
    }

    fn params() -> RequestParams {
        RequestParams {
            request_type: RequestType::Ride,
            requester: rider(),
            pickup: Some(Place::address("SM Megamall")),
            dropoff: Place::address("Shangri-La Plaza"),
            vehicle_class: VehicleClass::Motorcycle,
            payment_method: PaymentMethod::Cash,
            distance_meters: 3200,
            duration_seconds: 720,
            promo_code: None,
        }
    }

    #[tokio::test]
    async fn created_request_is_priced() {
        let engine = DispatchEngine::builder().build();
        let created = engine.create_request(params(), None).await.unwrap();
        assert!(!created.replayed);
        assert_eq!(created.record.status(), RequestStatus::Created);
        assert_eq!(created.record.fare.total.to_string(), "₱77.60");
    }

    #[tokio::test]
    async fn strangers_are_told_the_request_does_not_exist() {
        let engine = DispatchEngine::builder().build();
        let created = engine.create_request(params(), None).await.unwrap();
        let id = created.record.id;
        let stranger = Actor::Requester(RequesterId::new("rider-2").unwrap());

        let err = engine.confirm(id, stranger.clone()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: "request", .. }));
        let err = engine.apply_promo(id, "SAVE10", stranger.clone()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
        let err = engine.remove_promo(id, stranger.clone()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
        let err = engine.cancel(id, stranger.clone(), None).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
        let err = engine.redispatch(id, stranger).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
        let stored = engine.get(created.record.id).await.unwrap();
        assert_eq!(stored.status(), RequestStatus::Created);
    }

    #[tokio::test]
    async fn dispatch_targets_are_refused_by_advance() {
        let engine = DispatchEngine::builder().build();
        let created = engine.create_request(params(), None).await.unwrap();
        for target in [
            RequestStatus::Confirmed,
            RequestStatus::Assigned,
            RequestStatus::Cancelled,
        ] {
            let err = engine
                .advance_status(created.record.id, target, Actor::Operator("ops".into()), None)
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)), "{target}");
        }
    }

    #[tokio::test]
    async fn requester_may_see_but_not_advance() {
        let engine = DispatchEngine::builder().build();
        let created = engine.create_request(params(), None).await.unwrap();
        let err = engine
            .advance_status(
                created.record.id,
                RequestStatus::InProgress,
                Actor::Requester(rider()),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotPermitted { action: "advance", .. }));
    }

    #[tokio::test]
    async fn failed_calls_leave_no_lock_entries() {
        let engine = DispatchEngine::builder().build();
        let ops = Actor::Operator("ops".into());
        for _ in 0..200 {
            let id = RequestId::new();
            assert!(engine.confirm(id, ops.clone()).await.is_err());
            assert!(engine.apply_promo(id, "SAVE10", ops.clone()).await.is_err());
            assert!(engine.cancel(id, ops.clone(), None).await.is_err());
            assert!(engine.redispatch(id, ops.clone()).await.is_err());
        }
        assert_eq!(engine.inner.locks.len(), 0);

        let id = engine.create_request(params(), None).await.unwrap().record.id;
        engine.cancel(id, ops.clone(), None).await.unwrap();
        for _ in 0..50 {
            let err = engine.confirm(id, ops.clone()).await.unwrap_err();
            assert!(matches!(err, EngineError::InvalidTransition { .. }));
            assert!(engine
                .advance_status(id, RequestStatus::InProgress, ops.clone(), None)
                .await
                .is_err());
        }
        assert_eq!(engine.inner.locks.len(), 0);
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let engine = DispatchEngine::builder().build();
        let err = engine.get(RequestId::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: "request", .. }));
    }
}
