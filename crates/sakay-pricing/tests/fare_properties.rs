//! Fare invariants across arbitrary trips, and the quote-then-validate flow
//! the engine runs when a promo is attached to a request.

use proptest::prelude::*;
use sakay_core::{Money, RequestType, RequesterId, Timestamp, VehicleClass};
use sakay_pricing::{
    DiscountDescriptor, DiscountKind, PromoBook, PromoCode, PromoError, PromoScope, QuoteInput,
    SurgeMultiplier, Tariff,
};

fn any_class() -> impl Strategy<Value = VehicleClass> {
    (0..VehicleClass::ALL.len()).prop_map(|i| VehicleClass::ALL[i])
}

fn any_surge() -> impl Strategy<Value = SurgeMultiplier> {
    (10_000u32..=30_000).prop_map(|bps| SurgeMultiplier::from_bps(bps).unwrap())
}

fn any_discount() -> impl Strategy<Value = Option<DiscountDescriptor>> {
    let kind = prop_oneof![
        (1u32..=10_000).prop_map(|bps| DiscountKind::Percentage { bps }),
        (1i64..100_000).prop_map(|c| DiscountKind::Fixed {
            amount: Money::from_centavos(c)
        }),
        Just(DiscountKind::FreeDelivery),
    ];
    let max = prop::option::of((0i64..50_000).prop_map(Money::from_centavos));
    prop::option::of((kind, max).prop_map(|(discount, max_discount)| DiscountDescriptor {
        code: "PROP".into(),
        discount,
        max_discount,
    }))
}

fn trip(distance_meters: i64, duration_seconds: i64, class: VehicleClass, surge: SurgeMultiplier) -> QuoteInput {
    QuoteInput {
        distance_meters,
        duration_seconds,
        vehicle_class: class,
        surge,
    }
}

proptest! {
    /// Every component is non-negative and the total matches the formula exactly.
    #[test]
    fn fare_is_non_negative_and_consistent(
        distance in 0i64..500_000,
        duration in 0i64..36_000,
        class in any_class(),
        surge in any_surge(),
        discount in any_discount(),
    ) {
        let q = Tariff::standard().quote(&trip(distance, duration, class, surge), discount.as_ref()).unwrap();
        for component in [q.base, q.distance_portion, q.time_portion, q.surge_amount, q.discount_amount, q.total] {
            prop_assert!(component >= Money::ZERO);
        }
        prop_assert_eq!(q.total, q.subtotal().saturating_sub_floor(q.discount_amount));
        prop_assert!(q.discount_amount <= q.subtotal());
    }

    /// Longer or slower trips never cost less.
    #[test]
    fn fare_is_monotonic(
        distance in 0i64..500_000,
        duration in 0i64..36_000,
        extra_distance in 0i64..10_000,
        extra_duration in 0i64..3_600,
        class in any_class(),
        surge in any_surge(),
    ) {
        let tariff = Tariff::standard();
        let short = tariff.quote(&trip(distance, duration, class, surge), None).unwrap();
        let long = tariff
            .quote(&trip(distance + extra_distance, duration + extra_duration, class, surge), None)
            .unwrap();
        prop_assert!(long.total >= short.total);
    }

    /// Percentage discounts never exceed their cap.
    #[test]
    fn percentage_discount_is_capped(
        distance in 0i64..500_000,
        duration in 0i64..36_000,
        bps in 1u32..=10_000,
        cap in 0i64..20_000,
        class in any_class(),
    ) {
        let descriptor = DiscountDescriptor {
            code: "CAP".into(),
            discount: DiscountKind::Percentage { bps },
            max_discount: Some(Money::from_centavos(cap)),
        };
        let q = Tariff::standard()
            .quote(&trip(distance, duration, class, SurgeMultiplier::NONE), Some(&descriptor))
            .unwrap();
        prop_assert!(q.discount_amount <= Money::from_centavos(cap));
    }
}

// ─── Quote-then-validate scenarios ───────────────────────────────────

fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

fn foodie100() -> PromoCode {
    PromoCode {
        code: "FOODIE100".into(),
        discount: DiscountKind::Fixed {
            amount: Money::from_pesos(100),
        },
        valid_from: ts("2026-01-01T00:00:00Z"),
        valid_until: ts("2027-01-01T00:00:00Z"),
        min_order_value: Some(Money::from_pesos(300)),
        max_discount: None,
        usage_cap: None,
        per_user_cap: Some(1),
        scope: PromoScope::All,
    }
}

#[test]
fn reference_trip_prices_to_77_60() {
    let q = Tariff::standard()
        .quote(&trip(3200, 720, VehicleClass::Motorcycle, SurgeMultiplier::NONE), None)
        .unwrap();
    assert_eq!(q.base.to_string(), "₱40.00");
    assert_eq!(q.distance_portion.to_string(), "₱25.60");
    assert_eq!(q.time_portion.to_string(), "₱12.00");
    assert_eq!(q.total.to_string(), "₱77.60");
}

#[test]
fn reference_trip_with_foodie100_is_below_minimum() {
    let tariff = Tariff::standard();
    let book = PromoBook::with_promos([foodie100()]).unwrap();
    let rider = RequesterId::new("rider-1").unwrap();
    let undiscounted = tariff
        .quote(&trip(3200, 720, VehicleClass::Motorcycle, SurgeMultiplier::NONE), None)
        .unwrap();

    let err = book
        .validate(
            "foodie100",
            undiscounted.subtotal(),
            RequestType::Ride,
            &rider,
            ts("2026-06-01T12:00:00Z"),
        )
        .unwrap_err();

    assert_eq!(
        err,
        PromoError::BelowMinimum {
            code: "FOODIE100".into(),
            minimum: Money::from_pesos(300),
            subtotal: Money::from_centavos(7760),
        }
    );
    assert_eq!(err.to_string(), "promo FOODIE100 requires a minimum order of ₱300.00");
}

#[test]
fn validated_promo_discounts_the_quote() {
    let tariff = Tariff::standard();
    let book = PromoBook::with_promos([foodie100()]).unwrap();
    let rider = RequesterId::new("rider-1").unwrap();
    let long_trip = trip(25_000, 3_000, VehicleClass::Suv, SurgeMultiplier::NONE);
    let undiscounted = tariff.quote(&long_trip, None).unwrap();
    let descriptor = book
        .validate(
            "FOODIE100",
            undiscounted.subtotal(),
            RequestType::Ride,
            &rider,
            ts("2026-06-01T12:00:00Z"),
        )
        .unwrap();
    let discounted = tariff.quote(&long_trip, Some(&descriptor)).unwrap();
    assert_eq!(discounted.discount_amount, Money::from_pesos(100));
    assert_eq!(discounted.total, undiscounted.total - Money::from_pesos(100));
}
