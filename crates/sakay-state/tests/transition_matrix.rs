//! # Lifecycle Transition Matrix
//!
//! Exhaustive 12x12 checks of both fulfillment paths, plus property tests
//! driving arbitrary transition sequences against a lifecycle.

use std::time::Duration;

use proptest::prelude::*;
use sakay_core::{Actor, FulfillerId, RequestId, RequestType, RequesterId, Timestamp};
use sakay_state::{
    DispatchOffer, FulfillmentPath, LifecycleError, OfferOutcome, RequestLifecycle, RequestStatus,
    TransitionEvidence,
};

use RequestStatus::*;

fn ride_table() -> Vec<(RequestStatus, RequestStatus)> {
    vec![
        (Created, Confirmed),
        (Created, Cancelled),
        (Confirmed, Assigned),
        (Confirmed, Cancelled),
        (Assigned, InProgress),
        (Assigned, Cancelled),
        (InProgress, ArrivedDropoff),
        (InProgress, Completed),
        (InProgress, Cancelled),
        (ArrivedDropoff, Completed),
        (ArrivedDropoff, Cancelled),
    ]
}

fn order_table() -> Vec<(RequestStatus, RequestStatus)> {
    vec![
        (Created, Confirmed),
        (Created, Cancelled),
        (Confirmed, Assigned),
        (Confirmed, Cancelled),
        (Assigned, InProgress),
        (Assigned, Cancelled),
        (InProgress, Preparing),
        (InProgress, Cancelled),
        (Preparing, Ready),
        (Preparing, Cancelled),
        (Ready, PickedUp),
        (Ready, Cancelled),
        (PickedUp, OnTheWay),
        (PickedUp, Cancelled),
        (OnTheWay, Delivered),
        (OnTheWay, Cancelled),
    ]
}

#[test]
fn ride_transition_matrix_exhaustive() {
    let expected = ride_table();
    for from in RequestStatus::ALL {
        for to in RequestStatus::ALL {
            assert_eq!(
                FulfillmentPath::Ride.is_legal(from, to),
                expected.contains(&(from, to)),
                "ride transition {from} -> {to}"
            );
        }
    }
}

#[test]
fn order_transition_matrix_exhaustive() {
    let expected = order_table();
    for from in RequestStatus::ALL {
        for to in RequestStatus::ALL {
            assert_eq!(
                FulfillmentPath::Order.is_legal(from, to),
                expected.contains(&(from, to)),
                "order transition {from} -> {to}"
            );
        }
    }
}

#[test]
fn terminal_statuses_have_no_successors() {
    for path in [FulfillmentPath::Ride, FulfillmentPath::Order] {
        for status in [Completed, Delivered, Cancelled] {
            assert!(status.is_terminal());
            assert!(path.successors(status).is_empty());
        }
    }
}

#[test]
fn every_request_type_maps_to_a_path() {
    assert_eq!(FulfillmentPath::for_request(RequestType::Ride), FulfillmentPath::Ride);
    for order in [RequestType::Food, RequestType::Grocery, RequestType::Pharmacy] {
        assert_eq!(FulfillmentPath::for_request(order), FulfillmentPath::Order);
    }
}

// ─── Property tests ──────────────────────────────────────────────────

fn t0() -> Timestamp {
    Timestamp::parse("2026-03-01T08:00:00Z").unwrap()
}

/// Evidence that satisfies every offer guard for `lc`.
fn permissive_evidence(lc: &RequestLifecycle) -> TransitionEvidence {
    let mut offer = DispatchOffer::new(
        lc.request_id,
        FulfillerId::new("driver-1").unwrap(),
        1,
        t0(),
        Duration::from_secs(30),
    );
    if let Some(assignment) = &lc.assignment {
        offer.id = assignment.offer_id;
    }
    offer.resolve(OfferOutcome::Accepted, t0()).unwrap();
    TransitionEvidence::new(Actor::Requester(RequesterId::new("rider-1").unwrap()), t0())
        .with_offer(offer)
}

fn any_status() -> impl Strategy<Value = RequestStatus> {
    (0..RequestStatus::ALL.len()).prop_map(|i| RequestStatus::ALL[i])
}

fn any_request_type() -> impl Strategy<Value = RequestType> {
    (0..RequestType::ALL.len()).prop_map(|i| RequestType::ALL[i])
}

proptest! {
    /// Any attempted target outside the table fails and leaves the lifecycle unchanged;
    /// any target inside it succeeds.
    #[test]
    fn transitions_follow_table(
        request_type in any_request_type(),
        targets in prop::collection::vec(any_status(), 1..30),
    ) {
        let mut lc = RequestLifecycle::new(RequestId::new(), request_type);
        for to in targets {
            let from = lc.status;
            let legal = lc.path.is_legal(from, to);
            let before = lc.clone();
            let evidence = permissive_evidence(&lc);
            match lc.transition(to, evidence) {
                Ok(record) => {
                    prop_assert!(legal, "{} -> {} must be rejected", from, to);
                    prop_assert_eq!(record.from_status, from);
                    prop_assert_eq!(lc.status, to);
                }
                Err(err) => {
                    prop_assert!(!legal, "{} -> {} must be accepted", from, to);
                    let expected_kind = matches!(
                        err,
                        LifecycleError::InvalidTransition { .. } | LifecycleError::TerminalState { .. }
                    );
                    prop_assert!(expected_kind);
                    prop_assert_eq!(&lc, &before);
                }
            }
        }
    }

    /// The audit log always chains: each record starts where the previous ended.
    #[test]
    fn audit_log_is_contiguous(
        request_type in any_request_type(),
        targets in prop::collection::vec(any_status(), 1..30),
    ) {
        let mut lc = RequestLifecycle::new(RequestId::new(), request_type);
        for to in targets {
            let evidence = permissive_evidence(&lc);
            let _ = lc.transition(to, evidence);
        }
        let mut expected_from = Created;
        for record in &lc.transitions {
            prop_assert_eq!(record.from_status, expected_from);
            expected_from = record.to_status;
        }
        prop_assert_eq!(expected_from, lc.status);
    }
}
