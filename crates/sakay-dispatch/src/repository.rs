//! # Request Storage
//!
//! [`RequestRepository`] is the storage seam. Updates are optimistic: the
//! caller passes the version it read and the write is refused if the stored
//! version has moved on.
//!
//! [`InMemoryRequests`] keeps everything in `DashMap`s. Idempotency keys are
//! reserved through the key map's entry API, so two concurrent inserts with
//! the same key cannot both succeed.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use sakay_core::{RequestId, RequesterId};
use sakay_state::RequestStatus;

use crate::request::RequestRecord;

/// Storage failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No request with this id.
    #[error("{0} not found")]
    NotFound(RequestId),

    /// The stored version differs from the one the caller read.
    #[error("{request_id} is at version {actual}, expected {expected}")]
    Conflict {
        /// The request.
        request_id: RequestId,
        /// Version the caller read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// Another request already holds this idempotency key.
    #[error("idempotency key {key:?} belongs to {existing}")]
    DuplicateKey {
        /// The key.
        key: String,
        /// The request holding it.
        existing: RequestId,
    },

    /// The backing store could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistent storage for request records.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Load a request.
    async fn get(&self, id: RequestId) -> Result<Option<RequestRecord>, RepositoryError>;

    /// Store a new request. Fails with `DuplicateKey` if its idempotency key is taken.
    async fn insert(&self, record: RequestRecord) -> Result<(), RepositoryError>;

    /// Replace a request whose stored version is `expected_version`.
    ///
    /// Returns the stored record, with `version` set to `expected_version + 1`.
    async fn update(
        &self,
        record: RequestRecord,
        expected_version: u64,
    ) -> Result<RequestRecord, RepositoryError>;

    /// All requests made by `requester`, oldest first.
    async fn find_by_requester(
        &self,
        requester: &RequesterId,
    ) -> Result<Vec<RequestRecord>, RepositoryError>;

    /// All requests currently in `status`, oldest first.
    async fn find_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<RequestRecord>, RepositoryError>;

    /// The request created under `key`, if any.
    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<RequestRecord>, RepositoryError>;
}

/// In-memory repository.
#[derive(Debug, Default)]
pub struct InMemoryRequests {
    records: DashMap<RequestId, RequestRecord>,
    keys: DashMap<String, RequestId>,
    offline: AtomicBool,
    read_only: AtomicBool,
}

impl InMemoryRequests {
    /// An empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while set, every call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Simulate a write outage: while set, reads succeed and every insert
    /// or update fails with `Unavailable`.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of stored requests.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check_online(&self) -> Result<(), RepositoryError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RepositoryError::Unavailable("in-memory store is offline".into()))
        } else {
            Ok(())
        }
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        self.check_online()?;
        if self.read_only.load(Ordering::SeqCst) {
            Err(RepositoryError::Unavailable("in-memory store is read-only".into()))
        } else {
            Ok(())
        }
    }

    fn collect(&self, keep: impl Fn(&RequestRecord) -> bool) -> Vec<RequestRecord> {
        let mut found: Vec<RequestRecord> = self
            .records
            .iter()
            .filter(|r| keep(r.value()))
            .map(|r| r.value().clone())
            .collect();
        found.sort_by_key(|r| (r.created_at, r.id));
        found
    }
}

#[async_trait]
impl RequestRepository for InMemoryRequests {
    async fn get(&self, id: RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        self.check_online()?;
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn insert(&self, record: RequestRecord) -> Result<(), RepositoryError> {
        self.check_writable()?;
        if let Some(key) = &record.idempotency_key {
            match self.keys.entry(key.clone()) {
                Entry::Occupied(existing) => {
                    return Err(RepositoryError::DuplicateKey {
                        key: key.clone(),
                        existing: *existing.get(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(record.id);
                }
            }
        }
        self.records.insert(record.id, record);
        Ok(())
    }

    async fn update(
        &self,
        mut record: RequestRecord,
        expected_version: u64,
    ) -> Result<RequestRecord, RepositoryError> {
        self.check_writable()?;
        let mut stored = self
            .records
            .get_mut(&record.id)
            .ok_or(RepositoryError::NotFound(record.id))?;
        if stored.version != expected_version {
            return Err(RepositoryError::Conflict {
                request_id: record.id,
                expected: expected_version,
                actual: stored.version,
            });
        }
        record.version = expected_version + 1;
        *stored = record.clone();
        Ok(record)
    }

    async fn find_by_requester(
        &self,
        requester: &RequesterId,
    ) -> Result<Vec<RequestRecord>, RepositoryError> {
        self.check_online()?;
        Ok(self.collect(|r| &r.requester == requester))
    }

    async fn find_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<RequestRecord>, RepositoryError> {
        self.check_online()?;
        Ok(self.collect(|r| r.status() == status))
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<RequestRecord>, RepositoryError> {
        self.check_online()?;
        let Some(id) = self.keys.get(key).map(|r| *r.value()) else {
            return Ok(None);
        };
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }
}
