//! # Candidate Directory
//!
//! Ranking drivers and merchants is outside the engine. The coordinator asks
//! a [`CandidateDirectory`] for an ordered list and offers the request down
//! that list one candidate at a time. Each dispatch run asks again, so a
//! retry after exhaustion sees a fresh list.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sakay_core::{FulfillerId, Place, RequestId, RequestType, VehicleClass};

use crate::request::RequestRecord;

/// The directory lookup failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The ranking service could not produce a list.
    #[error("candidate directory unavailable: {0}")]
    Unavailable(String),
}

/// What the directory is told about the request being matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateQuery {
    /// The request.
    pub request_id: RequestId,
    /// Ride, food, grocery or pharmacy.
    pub request_type: RequestType,
    /// Class the candidate must drive.
    pub vehicle_class: VehicleClass,
    /// Where the candidate starts the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup: Option<Place>,
    /// Where the job ends.
    pub dropoff: Place,
}

impl From<&RequestRecord> for CandidateQuery {
    fn from(record: &RequestRecord) -> Self {
        Self {
            request_id: record.id,
            request_type: record.request_type,
            vehicle_class: record.vehicle_class,
            pickup: record.pickup.clone(),
            dropoff: record.dropoff.clone(),
        }
    }
}

/// Supplies ranked candidates for a request.
#[async_trait]
pub trait CandidateDirectory: Send + Sync {
    /// Candidates in offer order, best first.
    async fn candidates(&self, query: &CandidateQuery) -> Result<Vec<FulfillerId>, DirectoryError>;
}

/// A fixed roster, offered in order to every request.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    roster: RwLock<Vec<FulfillerId>>,
}

impl StaticDirectory {
    /// A directory returning `roster` in order.
    pub fn new(roster: Vec<FulfillerId>) -> Self {
        Self {
            roster: RwLock::new(roster),
        }
    }

    /// Swap the roster. Runs already in progress keep the list they fetched.
    pub fn replace(&self, roster: Vec<FulfillerId>) {
        *self.roster.write() = roster;
    }
}

#[async_trait]
impl CandidateDirectory for StaticDirectory {
    async fn candidates(&self, _query: &CandidateQuery) -> Result<Vec<FulfillerId>, DirectoryError> {
        Ok(self.roster.read().clone())
    }
}
