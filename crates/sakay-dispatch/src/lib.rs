//! # sakay-dispatch: Request Service and Dispatch Coordinator
//!
//! [`DispatchEngine`] is the service boundary for ride bookings and orders:
//! create, apply a promo, confirm, respond to an offer, cancel, advance,
//! redispatch, and the read queries behind them.
//!
//! ## Concurrency
//!
//! Every mutation of a request runs under that request's async lock
//! ([`LockTable`]); independent requests never contend. Transition events are
//! published while the lock is held, so a consumer sees them in lifecycle
//! order for each request.
//!
//! The coordinator offers a confirmed request to one candidate at a time.
//! Each offer is a countdown raced with `tokio::select!` against the
//! candidate's response and the request's cancellation signal. An offer's
//! outcome is a compare-and-swap on an atomic, so exactly one resolution
//! wins regardless of which side gets there first.
//!
//! ## External seams
//!
//! - [`RequestRepository`]: storage ([`InMemoryRequests`] bundled)
//! - [`CandidateDirectory`]: ranked candidates ([`StaticDirectory`] bundled)
//! - [`EventSink`]: notifications ([`TracingSink`], [`RecordingSink`] bundled)
//! - [`Clock`](sakay_core::Clock) and [`SurgeSource`](sakay_pricing::SurgeSource)

pub mod config;
mod coordinator;
pub mod directory;
pub mod error;
pub mod events;
pub mod locks;
pub mod offers;
pub mod repository;
pub mod request;
pub mod service;

pub use config::EngineConfig;
pub use directory::{CandidateDirectory, CandidateQuery, DirectoryError, StaticDirectory};
pub use error::EngineError;
pub use events::{EngineEvent, EventSink, RecordingSink, TracingSink};
pub use locks::{LockTable, RequestGuard};
pub use offers::{OfferBook, OfferCell};
pub use repository::{InMemoryRequests, RepositoryError, RequestRepository};
pub use request::{AppliedPromo, RequestParams, RequestRecord};
pub use service::{CreateOutcome, DispatchEngine, EngineBuilder};
