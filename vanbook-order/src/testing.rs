use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use vanbook_core::memory::{InMemoryEventLog, InMemorySeatLocks, InMemoryStore};
use vanbook_core::{BookingRules, Repositories, Role, Route, User, Waypoint};
use vanbook_shared::Masked;

use crate::reservation::{PassengerDetails, ReservationRequest};
use crate::BookingServices;

pub const ROUTE_ID: i64 = 1;
pub const BASE_PRICE: i32 = 10_000;
pub const PASSENGER_ID: i64 = 100;
pub const DRIVER_ID: i64 = 200;

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub locks: Arc<InMemorySeatLocks>,
    pub events: Arc<InMemoryEventLog>,
    pub services: BookingServices,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_rules(BookingRules::default()).await
    }

    pub async fn with_rules(rules: BookingRules) -> Self {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_route(Route {
                id: ROUTE_ID,
                origin_station_id: 10,
                destination_station_id: 20,
                base_price: BASE_PRICE,
                estimated_duration: Some(150),
                is_active: true,
            })
            .await;
        store
            .insert_user(User {
                id: PASSENGER_ID,
                username: "somchai".to_string(),
                full_name: Some("Somchai Jaidee".to_string()),
                email: None,
                phone_number: None,
                role: Role::Passenger,
            })
            .await;

        let locks = Arc::new(InMemorySeatLocks::new());
        let events = Arc::new(InMemoryEventLog::new());
        let services = BookingServices::new(
            Repositories::from_backend(store.clone()),
            locks.clone(),
            events.clone(),
            rules,
        );

        Self { store, locks, events, services }
    }
}

pub fn departure(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .unwrap()
}

pub fn request(departure_time: NaiveDateTime, seat_number: i32) -> ReservationRequest {
    ReservationRequest {
        route_id: ROUTE_ID,
        departure_time,
        seat_number,
        passenger: PassengerDetails {
            user_id: Some(PASSENGER_ID),
            pickup: Waypoint { name: "Victory Monument".to_string(), lat: Some(13.7649), lng: Some(100.5383) },
            dropoff: Some(Waypoint::named("Pattaya Bus Terminal")),
            contact_phone: Some(Masked::new("0812345678".to_string())),
            remark: None,
            total_price: None,
        },
    }
}
