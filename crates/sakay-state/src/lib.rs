//! # sakay-state: Request Lifecycle State Machine
//!
//! Owns the status of a single ride booking or order and the dispatch offer
//! records that lead to its assignment.
//!
//! ## State Machines
//!
//! - **Lifecycle** (`lifecycle.rs`): `Created → Confirmed → Assigned →
//!   InProgress`, then either the ride path (`ArrivedDropoff → Completed`)
//!   or the order path (`Preparing → Ready → PickedUp → OnTheWay →
//!   Delivered`). Any non-terminal status may move to `Cancelled`.
//!
//! - **Offer** (`offer.rs`): a single `Pending` offer resolves exactly once to
//!   `Accepted`, `Declined` or `Expired`.
//!
//! ## Design
//!
//! The request status is a runtime value checked against a per-path
//! successor table rather than a typestate. Requests are loaded from storage
//! in arbitrary statuses and transitioned by id, so the status has to be
//! data. Illegal transitions return an error and leave the lifecycle
//! untouched.

pub mod lifecycle;
pub mod offer;

pub use lifecycle::{
    Assignment, CancellationRecord, FulfillmentPath, LifecycleError, RequestLifecycle,
    RequestStatus, TransitionEvidence, TransitionRecord,
};
pub use offer::{DispatchOffer, OfferError, OfferOutcome, OfferResponse};
