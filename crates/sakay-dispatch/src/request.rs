//! # Request Records
//!
//! What a requester submits ([`RequestParams`]) and what the engine stores
//! ([`RequestRecord`]). The identity, type, places, class and payment method
//! are fixed at creation. The fare and promo may change only while the
//! request is pre-assignment; the lifecycle changes through transitions.

use serde::{Deserialize, Serialize};

use sakay_core::{
    FulfillerId, OfferId, PaymentMethod, Place, RequestId, RequestType, RequesterId, Timestamp,
    ValidationError, VehicleClass,
};
use sakay_pricing::{DiscountDescriptor, FareQuote, QuoteInput, SurgeMultiplier};
use sakay_state::{RequestLifecycle, RequestStatus};

/// Parameters for a new ride booking or order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    /// Ride, food, grocery or pharmacy.
    pub request_type: RequestType,
    /// Who is asking.
    pub requester: RequesterId,
    /// Ride origin or merchant location. Required for rides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup: Option<Place>,
    /// Ride destination or delivery address.
    pub dropoff: Place,
    /// Vehicle or courier class.
    pub vehicle_class: VehicleClass,
    /// Declared payment method.
    pub payment_method: PaymentMethod,
    /// Routed distance from the geo provider.
    pub distance_meters: i64,
    /// Routed duration from the geo provider.
    pub duration_seconds: i64,
    /// Promo to attach at creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
}

impl RequestParams {
    /// Reject malformed parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::ensure_non_negative("distance_meters", self.distance_meters)?;
        ValidationError::ensure_non_negative("duration_seconds", self.duration_seconds)?;
        match (&self.pickup, self.request_type) {
            (Some(pickup), _) => pickup.validate("pickup")?,
            (None, RequestType::Ride) => return Err(ValidationError::Missing("pickup")),
            (None, _) => {}
        }
        self.dropoff.validate("dropoff")?;
        if let Some(code) = &self.promo_code {
            if code.trim().is_empty() {
                return Err(ValidationError::Missing("promo_code"));
            }
        }
        Ok(())
    }
}

/// A promo attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPromo {
    /// Normalized code.
    pub code: String,
    /// The discount it grants.
    pub descriptor: DiscountDescriptor,
    /// Whether the use has been counted against the promo's caps.
    pub consumed: bool,
}

/// A stored ride booking or order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Request identifier.
    pub id: RequestId,
    /// Client-supplied retry key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Ride, food, grocery or pharmacy.
    pub request_type: RequestType,
    /// Who asked.
    pub requester: RequesterId,
    /// Ride origin or merchant location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup: Option<Place>,
    /// Ride destination or delivery address.
    pub dropoff: Place,
    /// Vehicle or courier class.
    pub vehicle_class: VehicleClass,
    /// Declared payment method.
    pub payment_method: PaymentMethod,
    /// Routed distance.
    pub distance_meters: i64,
    /// Routed duration.
    pub duration_seconds: i64,
    /// Surge in effect when the request was priced.
    pub surge: SurgeMultiplier,
    /// Current fare.
    pub fare: FareQuote,
    /// Attached promo, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo: Option<AppliedPromo>,
    /// Status, assignment, cancellation and audit log.
    pub lifecycle: RequestLifecycle,
    /// The most recent dispatch offer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_offer_id: Option<OfferId>,
    /// How many offers have been made.
    pub dispatch_attempts: u32,
    /// Incremented on every stored change.
    pub version: u64,
    /// When the request was created.
    pub created_at: Timestamp,
    /// When the request last changed.
    pub updated_at: Timestamp,
}

impl RequestRecord {
    /// A new record in `created`, at version 0.
    pub fn new(
        params: RequestParams,
        idempotency_key: Option<String>,
        surge: SurgeMultiplier,
        fare: FareQuote,
        promo: Option<AppliedPromo>,
        now: Timestamp,
    ) -> Self {
        let id = RequestId::new();
        Self {
            id,
            idempotency_key,
            request_type: params.request_type,
            requester: params.requester,
            pickup: params.pickup,
            dropoff: params.dropoff,
            vehicle_class: params.vehicle_class,
            payment_method: params.payment_method,
            distance_meters: params.distance_meters,
            duration_seconds: params.duration_seconds,
            surge,
            fare,
            promo,
            lifecycle: RequestLifecycle::new(id, params.request_type),
            last_offer_id: None,
            dispatch_attempts: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current status.
    pub fn status(&self) -> RequestStatus {
        self.lifecycle.status
    }

    /// The assigned fulfiller, if any.
    pub fn fulfiller(&self) -> Option<&FulfillerId> {
        self.lifecycle.fulfiller()
    }

    /// The pricing inputs for this request.
    pub fn quote_input(&self) -> QuoteInput {
        QuoteInput {
            distance_meters: self.distance_meters,
            duration_seconds: self.duration_seconds,
            vehicle_class: self.vehicle_class,
            surge: self.surge,
        }
    }
}
