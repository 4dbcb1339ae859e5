use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use vanbook_api::middleware::Claims;
use vanbook_api::{app, AppState, AuthConfig};
use vanbook_core::memory::{InMemoryEventLog, InMemorySeatLocks, InMemoryStore};
use vanbook_core::{BookingRules, Repositories, Route};

const SECRET: &str = "integration-secret";
const DRIVER_ID: i64 = 200;
const WEB_ORIGIN: &str = "http://localhost:3000";

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
    locks: Arc<InMemorySeatLocks>,
}

async fn test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert_route(Route {
            id: 1,
            origin_station_id: 10,
            destination_station_id: 20,
            base_price: 10_000,
            estimated_duration: Some(150),
            is_active: true,
        })
        .await;
    let locks = Arc::new(InMemorySeatLocks::new());

    let state = AppState::new(
        Repositories::from_backend(store.clone()),
        locks.clone(),
        Arc::new(InMemoryEventLog::new()),
        BookingRules::default(),
        AuthConfig { secret: SECRET.to_string() },
        HeaderValue::from_static(WEB_ORIGIN),
    )
    .unwrap();

    TestApp { router: app(state), store, locks }
}

fn token(user_id: i64, role: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn send(app: &TestApp, method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

fn reserve_body(seat: i32) -> Value {
    json!({
        "route_id": 1,
        "departure_time": "2024-06-01T08:00:00",
        "seat_number": seat,
        "pickup": { "name": "Victory Monument", "lat": 13.7649, "lng": 100.5383 },
        "contact_phone": "0812345678"
    })
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_cors_allows_only_configured_origin() {
    let app = test_app().await;
    let preflight = |origin: &'static str| {
        Request::builder()
            .method("OPTIONS")
            .uri("/health")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap()
    };

    let response = app.router.clone().oneshot(preflight(WEB_ORIGIN)).await.unwrap();
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN].to_str().unwrap(), WEB_ORIGIN);

    let response = app.router.clone().oneshot(preflight("http://evil.example")).await.unwrap();
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_saturday_timetable() {
    let app = test_app().await;
    let (status, body) = send(&app, "GET", "/api/schedules?route_id=1&date=2024-06-01", None, None).await;

    assert_eq!(status, StatusCode::OK);
    let slots = body.as_array().unwrap();
    assert_eq!(slots.len(), 15);
    assert_eq!(slots[0]["departure_time"], "2024-06-01T10:00:00");
    assert_eq!(slots[14]["departure_time"], "2024-06-01T17:00:00");
    assert_eq!(app.store.schedule_count().await, 0);
}

#[tokio::test]
async fn test_reserve_confirm_reserve_flow() {
    let app = test_app().await;

    let (status, body) = send(&app, "POST", "/api/bookings/reserve", None, Some(reserve_body(5))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["status"], "PENDING");
    assert_eq!(body["booking"]["total_price"], 10_000);
    let booking_id = body["booking"]["id"].as_i64().unwrap();
    let schedule_id = body["booking"]["schedule_id"].as_i64().unwrap();

    let (status, body) = send(&app, "POST", "/api/bookings/reserve", None, Some(reserve_body(5))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Seat 5"));

    let (status, seats) = send(
        &app,
        "GET",
        "/api/bookings/booked-seats?route_id=1&departure_time=2024-06-01T08:00:00",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seats, json!([5]));

    let slip = json!({ "slip_file_name": "slips/abc.jpg", "transaction_ref": "TXN-1", "amount": 10_000 });
    let uri = format!("/api/payments/{}/confirm", booking_id);

    let (status, _) = send(&app, "POST", &uri, None, Some(slip.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "POST", &uri, Some(&token(100, "PASSENGER")), Some(slip.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let short = json!({ "slip_file_name": "slips/abc.jpg", "transaction_ref": "TXN-1", "amount": 9_999 });
    let (status, _) = send(&app, "POST", &uri, Some(&token(1, "ADMIN")), Some(short)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", &uri, Some(&token(1, "ADMIN")), Some(slip)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CONFIRMED");
    assert!(!app.locks.is_held(&vanbook_core::SeatKey::new(schedule_id, 5)).await);

    let (status, _) = send(&app, "POST", "/api/bookings/reserve", None, Some(reserve_body(5))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, metrics) = send(&app, "GET", "/metrics", None, None).await;
    let metrics = metrics.as_str().unwrap();
    assert!(metrics.contains("vanbook_reservations_total{outcome=\"reserved\"} 1"));
    assert!(metrics.contains("vanbook_reservations_total{outcome=\"seat_unavailable\"} 2"));
    assert!(metrics.contains("vanbook_booking_transitions_total{transition=\"confirmed\"} 1"));
}

#[tokio::test]
async fn test_cancel_twice_conflicts() {
    let app = test_app().await;
    let (_, body) = send(&app, "POST", "/api/bookings/reserve", None, Some(reserve_body(3))).await;
    let uri = format!("/api/bookings/{}/cancel", body["booking"]["id"].as_i64().unwrap());

    let (status, body) = send(&app, "PUT", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let (status, body) = send(&app, "PUT", &uri, None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("CANCELLED"));
}

#[tokio::test]
async fn test_reschedule_and_lookup() {
    let app = test_app().await;
    let (_, body) = send(&app, "POST", "/api/bookings/reserve", None, Some(reserve_body(4))).await;
    let booking_id = body["booking"]["id"].as_i64().unwrap();
    let old_schedule = body["booking"]["schedule_id"].as_i64().unwrap();

    let uri = format!("/api/bookings/{}/reschedule?new_departure_time=2024-06-01T09:30:00", booking_id);
    let (status, body) = send(&app, "PUT", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    let new_schedule = body["schedule_id"].as_i64().unwrap();
    assert_ne!(new_schedule, old_schedule);

    let (status, body) = send(&app, "GET", &format!("/api/schedules/{}", new_schedule), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["departure_time"], "2024-06-01T09:30:00");

    let (status, body) = send(&app, "GET", &format!("/api/bookings/{}", booking_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["seat_number"], 4);
    assert_eq!(body["contact_phone"], "0812345678");

    let (status, _) = send(&app, "GET", "/api/bookings/9999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = test_app().await;
    let mut body = reserve_body(1);
    body["route_id"] = json!(42);

    let (status, _) = send(&app, "POST", "/api/bookings/reserve", None, Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_driver_routes() {
    let app = test_app().await;
    let (_, body) = send(&app, "POST", "/api/bookings/reserve", None, Some(reserve_body(2))).await;
    let booking_id = body["booking"]["id"].as_i64().unwrap();
    let schedule_id = body["booking"]["schedule_id"].as_i64().unwrap();
    app.store.assign_driver(schedule_id, DRIVER_ID).await.unwrap();

    let driver = token(DRIVER_ID, "DRIVER");
    let pickup_uri = format!("/api/driver/verify-pickup/{}", booking_id);

    let (status, _) = send(&app, "POST", &pickup_uri, Some(&token(100, "PASSENGER")), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Not paid yet.
    let (status, _) = send(&app, "POST", &pickup_uri, Some(&driver), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let slip = json!({ "slip_file_name": "slips/x.jpg", "transaction_ref": "TXN-2", "amount": 10_000 });
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/payments/{}/confirm", booking_id),
        Some(&token(1, "ADMIN")),
        Some(slip),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "POST", &pickup_uri, Some(&driver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PICKED_UP");

    let (status, body) = send(&app, "GET", &format!("/api/driver/schedules/{}", DRIVER_ID), Some(&driver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], schedule_id);
    assert_eq!(body[0]["passenger_count"], 1);

    let (status, _) = send(&app, "GET", "/api/driver/schedules/201", Some(&driver), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/driver/schedules/{}/bookings", schedule_id),
        Some(&driver),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_lock_outage_still_books() {
    let app = test_app().await;
    app.locks.set_reachable(false);

    let (status, _) = send(&app, "POST", "/api/bookings/reserve", None, Some(reserve_body(6))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "POST", "/api/bookings/reserve", None, Some(reserve_body(6))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let active = app
        .store
        .all_bookings()
        .await
        .into_iter()
        .filter(|b| b.seat_number == 6 && b.status.is_active())
        .count();
    assert_eq!(active, 1);
}
