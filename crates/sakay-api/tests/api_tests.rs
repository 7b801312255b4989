//! End-to-end tests of the HTTP surface, driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use sakay_api::{app, AppState};
use sakay_core::FulfillerId;
use sakay_dispatch::{DispatchEngine, RecordingSink, StaticDirectory};

const RIDER: (&str, &str) = ("rider-1", "requester");
const OTHER_RIDER: (&str, &str) = ("rider-2", "requester");
const DRIVER: (&str, &str) = ("driver-1", "fulfiller");
const OTHER_DRIVER: (&str, &str) = ("driver-9", "fulfiller");
const OPERATOR: (&str, &str) = ("ops-1", "operator");

fn test_app() -> (Router, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let roster = vec![
        FulfillerId::new("driver-1").unwrap(),
        FulfillerId::new("driver-2").unwrap(),
    ];
    let engine = DispatchEngine::builder()
        .directory(Arc::new(StaticDirectory::new(roster)))
        .sink(sink.clone())
        .build();
    (app(AppState::new(engine)), sink)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    principal: Option<(&str, &str)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, role)) = principal {
        builder = builder
            .header("x-principal-id", id)
            .header("x-principal-role", role);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn ride_body() -> Value {
    json!({
        "request_type": "ride",
        "pickup": { "address": "BGC High Street" },
        "dropoff": { "address": "Ayala Triangle" },
        "vehicle_class": "motorcycle",
        "payment_method": "cash",
        "distance_meters": 3200,
        "duration_seconds": 720
    })
}

async fn create_ride(app: &Router) -> String {
    let (status, body) = send(app, "POST", "/v1/requests", Some(RIDER), Some(ride_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

/// Poll until the request has a pending offer, returning its id.
async fn pending_offer(app: &Router, request_id: &str) -> String {
    for _ in 0..400 {
        let (_, offers) = send(
            app,
            "GET",
            &format!("/v1/requests/{request_id}/offers"),
            Some(OPERATOR),
            None,
        )
        .await;
        if let Some(offer) = offers
            .as_array()
            .and_then(|all| all.iter().find(|o| o["outcome"] == "pending"))
        {
            return offer["id"].as_str().unwrap().to_string();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no pending offer for {request_id}");
}

fn promo_body(code: &str) -> Value {
    json!({
        "code": code,
        "discount": { "type": "percentage", "bps": 1000 },
        "valid_from": "2020-01-01T00:00:00Z",
        "valid_until": "2099-01-01T00:00:00Z",
        "max_discount": "50.00",
        "per_user_cap": 1,
        "scope": "all"
    })
}

// ── Probes and documents ─────────────────────────────────────────────

#[tokio::test]
async fn test_health_probes_need_no_principal() {
    let (app, _) = test_app();
    for (uri, expected) in [("/health/liveness", "ok"), ("/health/readiness", "ready")] {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], expected.as_bytes());
    }
}

#[tokio::test]
async fn test_openapi_lists_request_routes() {
    let (app, _) = test_app();
    let (status, doc) = send(&app, "GET", "/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/v1/requests"].is_object());
    assert!(doc["paths"]["/v1/offers/{id}/respond"].is_object());
    assert!(doc["paths"]["/v1/requests/{id}/promo"]["delete"].is_object());
}

#[tokio::test]
async fn test_metrics_without_recorder_is_unavailable() {
    let (app, _) = test_app();
    let (status, _) = send(&app, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ── Principals ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_principal_is_unauthorized() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "POST", "/v1/requests", None, Some(ride_body())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_fulfillers_cannot_create_requests() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "POST", "/v1/requests", Some(DRIVER), Some(ride_body())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "NOT_PERMITTED");
}

#[tokio::test]
async fn test_requests_are_hidden_from_strangers() {
    let (app, _) = test_app();
    let id = create_ride(&app).await;
    let uri = format!("/v1/requests/{id}");

    let (status, _) = send(&app, "GET", &uri, Some(OTHER_RIDER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    for action in ["confirm", "cancel", "redispatch"] {
        let (status, body) =
            send(&app, "POST", &format!("{uri}/{action}"), Some(OTHER_RIDER), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{action}");
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
    let (status, body) = send(&app, "GET", &uri, Some(RIDER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lifecycle"]["status"], "created");
}

#[tokio::test]
async fn test_operator_booking_requires_requester() {
    let (app, _) = test_app();
    let (status, body) =
        send(&app, "POST", "/v1/requests", Some(OPERATOR), Some(ride_body())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let mut on_behalf = ride_body();
    on_behalf["requester"] = json!("rider-7");
    let (status, body) =
        send(&app, "POST", "/v1/requests", Some(OPERATOR), Some(on_behalf)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["requester"], "rider-7");
}

// ── Lifecycle ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ride_from_booking_to_completion() {
    let (app, sink) = test_app();
    let (status, created) =
        send(&app, "POST", "/v1/requests", Some(RIDER), Some(ride_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["fare"]["total"], "77.60");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, confirmed) =
        send(&app, "POST", &format!("/v1/requests/{id}/confirm"), Some(RIDER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["lifecycle"]["status"], "confirmed");

    let offer_id = pending_offer(&app, &id).await;
    let (status, offer) = send(
        &app,
        "POST",
        &format!("/v1/offers/{offer_id}/respond"),
        Some(DRIVER),
        Some(json!({ "response": "accept" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(offer["outcome"], "accepted");

    let (_, assigned) = send(&app, "GET", &format!("/v1/requests/{id}"), Some(DRIVER), None).await;
    assert_eq!(assigned["lifecycle"]["status"], "assigned");
    assert_eq!(assigned["lifecycle"]["assignment"]["fulfiller"], "driver-1");

    for target in ["in_progress", "arrived_dropoff", "completed"] {
        let (status, body) = send(
            &app,
            "POST",
            &format!("/v1/requests/{id}/status"),
            Some(DRIVER),
            Some(json!({ "status": target })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "advancing to {target}: {body}");
        assert_eq!(body["lifecycle"]["status"], target);
    }

    let request_id = id.parse().unwrap();
    assert_eq!(sink.statuses_for(request_id).len(), 5);
}

#[tokio::test]
async fn test_only_the_offered_driver_may_respond() {
    let (app, _) = test_app();
    let id = create_ride(&app).await;
    send(&app, "POST", &format!("/v1/requests/{id}/confirm"), Some(RIDER), None).await;
    let offer_id = pending_offer(&app, &id).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1/offers/{offer_id}/respond"),
        Some(OTHER_DRIVER),
        Some(json!({ "response": "accept" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "NOT_PERMITTED");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/v1/offers/{offer_id}/respond"),
        Some(RIDER),
        Some(json!({ "response": "accept" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_second_response_is_refused() {
    let (app, _) = test_app();
    let id = create_ride(&app).await;
    send(&app, "POST", &format!("/v1/requests/{id}/confirm"), Some(RIDER), None).await;
    let offer_id = pending_offer(&app, &id).await;
    let uri = format!("/v1/offers/{offer_id}/respond");

    let (status, _) = send(&app, "POST", &uri, Some(DRIVER), Some(json!({ "response": "accept" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) =
        send(&app, "POST", &uri, Some(DRIVER), Some(json!({ "response": "decline" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "OFFER_ALREADY_RESOLVED");
}

#[tokio::test]
async fn test_cancel_without_body_then_again() {
    let (app, _) = test_app();
    let id = create_ride(&app).await;
    let uri = format!("/v1/requests/{id}/cancel");

    let (status, body) = send(&app, "POST", &uri, Some(RIDER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lifecycle"]["status"], "cancelled");

    let (status, body) = send(
        &app,
        "POST",
        &uri,
        Some(RIDER),
        Some(json!({ "reason": "changed my mind" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_unknown_status_name_is_a_validation_error() {
    let (app, _) = test_app();
    let id = create_ride(&app).await;
    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1/requests/{id}/status"),
        Some(OPERATOR),
        Some(json!({ "status": "teleported" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_idempotent_create_replays_with_200() {
    let (app, _) = test_app();
    let request = || {
        Request::post("/v1/requests")
            .header("x-principal-id", RIDER.0)
            .header("x-principal-role", RIDER.1)
            .header("idempotency-key", "booking-42")
            .header("content-type", "application/json")
            .body(Body::from(ride_body().to_string()))
            .unwrap()
    };

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let first: Value =
        serde_json::from_slice(&first.into_body().collect().await.unwrap().to_bytes()).unwrap();

    let second = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second: Value =
        serde_json::from_slice(&second.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(first["id"], second["id"]);
}

#[tokio::test]
async fn test_listing_needs_a_filter_and_scopes_requesters() {
    let (app, _) = test_app();
    create_ride(&app).await;

    let (status, _) = send(&app, "GET", "/v1/requests", Some(OPERATOR), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, mine) = send(&app, "GET", "/v1/requests", Some(RIDER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "GET", "/v1/requests?requester=rider-1", Some(OTHER_RIDER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) =
        send(&app, "GET", "/v1/requests?status=created", Some(OPERATOR), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created.as_array().unwrap().len(), 1);
}

// ── Promos and quotes ────────────────────────────────────────────────

#[tokio::test]
async fn test_promo_registry_is_operator_only() {
    let (app, _) = test_app();
    let (status, _) = send(&app, "POST", "/v1/promos", Some(RIDER), Some(promo_body("SAVE10"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) =
        send(&app, "POST", "/v1/promos", Some(OPERATOR), Some(promo_body("save10"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["total_uses"], 0);

    let (status, body) =
        send(&app, "POST", "/v1/promos", Some(OPERATOR), Some(promo_body("SAVE10"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = send(&app, "GET", "/v1/promos/save10", Some(RIDER), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/v1/promos/NOPE", Some(RIDER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_quote_applies_promo_without_consuming_it() {
    let (app, _) = test_app();
    send(&app, "POST", "/v1/promos", Some(OPERATOR), Some(promo_body("SAVE10"))).await;

    let quote = json!({
        "request_type": "ride",
        "vehicle_class": "motorcycle",
        "distance_meters": 3200,
        "duration_seconds": 720,
        "promo_code": "SAVE10"
    });
    for _ in 0..2 {
        let (status, body) = send(&app, "POST", "/v1/quotes", Some(RIDER), Some(quote.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["surge"], 1.0);
        assert_eq!(body["fare"]["discount_amount"], "7.76");
        assert_eq!(body["fare"]["total"], "69.84");
    }
    let (_, promo) = send(&app, "GET", "/v1/promos/SAVE10", Some(OPERATOR), None).await;
    assert_eq!(promo["total_uses"], 0);
}

#[tokio::test]
async fn test_promo_can_be_removed_before_confirmation() {
    let (app, _) = test_app();
    send(&app, "POST", "/v1/promos", Some(OPERATOR), Some(promo_body("SAVE10"))).await;
    let mut body = ride_body();
    body["promo_code"] = json!("SAVE10");
    let (status, created) = send(&app, "POST", "/v1/requests", Some(RIDER), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["fare"]["total"], "69.84");
    let promo_uri = format!("/v1/requests/{}/promo", created["id"].as_str().unwrap());

    let (status, _) = send(&app, "DELETE", &promo_uri, Some(OTHER_RIDER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, repriced) = send(&app, "DELETE", &promo_uri, Some(RIDER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(repriced["fare"]["total"], "77.60");
    assert_eq!(repriced["fare"]["discount_amount"], "0.00");
    assert!(repriced["promo"].is_null());
}

#[tokio::test]
async fn test_unknown_promo_on_create_is_specific() {
    let (app, _) = test_app();
    let mut body = ride_body();
    body["promo_code"] = json!("MISSING");
    let (status, body) = send(&app, "POST", "/v1/requests", Some(RIDER), Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "PROMO_NOT_FOUND");
    assert_eq!(body["error"]["message"], "promo MISSING does not exist");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (app, _) = test_app();
    let request = Request::post("/v1/quotes")
        .header("x-principal-id", RIDER.0)
        .header("x-principal-role", RIDER.1)
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
