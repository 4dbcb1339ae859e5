use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vanbook_core::events::EventPublisher;
use vanbook_core::{
    Booking, BookingRules, LockOutcome, NewBooking, Repositories, Schedule, SeatKey,
    SeatLocker, StoreError, Waypoint,
};
use vanbook_shared::{BookingEventKind, Masked};

use crate::error::BookingError;
use crate::resolver::ScheduleResolver;
use crate::{booking_event, publish_event, release_seat, seat_occupied};

/// Who is travelling and where to pick them up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerDetails {
    /// Attached only when it names an existing account; otherwise the booking
    /// is a guest booking.
    #[serde(default)]
    pub user_id: Option<i64>,
    pub pickup: Waypoint,
    #[serde(default)]
    pub dropoff: Option<Waypoint>,
    #[serde(default)]
    pub contact_phone: Option<Masked<String>>,
    #[serde(default)]
    pub remark: Option<String>,
    /// Satang. Defaults to the route's base price.
    #[serde(default)]
    pub total_price: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub route_id: i64,
    pub departure_time: NaiveDateTime,
    pub seat_number: i32,
    #[serde(flatten)]
    pub passenger: PassengerDetails,
}

#[derive(Debug, Clone)]
pub enum ReservationOutcome {
    Reserved(Booking),
    SeatUnavailable { schedule_id: i64, seat_number: i32 },
}

impl ReservationOutcome {
    fn unavailable(key: SeatKey) -> Self {
        ReservationOutcome::SeatUnavailable {
            schedule_id: key.schedule_id,
            seat_number: key.seat_number,
        }
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self, ReservationOutcome::Reserved(_))
    }

    pub fn booking(&self) -> Option<&Booking> {
        match self {
            ReservationOutcome::Reserved(booking) => Some(booking),
            ReservationOutcome::SeatUnavailable { .. } => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ReservationOutcome::Reserved(booking) => format!(
                "Seat {} reserved, booking {} awaits payment",
                booking.seat_number, booking.id
            ),
            ReservationOutcome::SeatUnavailable { seat_number, .. } => {
                format!("Seat {} is currently being booked or already taken", seat_number)
            }
        }
    }
}

/// How the attempt is serialized against concurrent requests for the same seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeatHold {
    /// We own the seat lock until it expires or is released.
    Locked,
    /// The lock backend is down; only the store's seat check and unique index
    /// stand between concurrent attempts.
    StoreOnly,
}

/// Reserves seats: resolves the schedule, takes the seat lock, then records a
/// `PENDING` booking.
///
/// The lock keeps concurrent attempts from racing each other into the store.
/// The store is still checked after the lock is won, since a confirmed
/// booking no longer holds one.
pub struct ReservationCoordinator {
    repos: Repositories,
    resolver: ScheduleResolver,
    locks: Arc<dyn SeatLocker>,
    events: Arc<dyn EventPublisher>,
    rules: BookingRules,
}

impl ReservationCoordinator {
    pub fn new(
        repos: Repositories,
        resolver: ScheduleResolver,
        locks: Arc<dyn SeatLocker>,
        events: Arc<dyn EventPublisher>,
        rules: BookingRules,
    ) -> Self {
        Self { repos, resolver, locks, events, rules }
    }

    pub async fn reserve(&self, request: ReservationRequest) -> Result<ReservationOutcome, BookingError> {
        validate(&request)?;

        let schedule = self.resolver.resolve(request.route_id, request.departure_time).await?;
        let key = SeatKey::new(schedule.id, request.seat_number);

        let hold = match self.locks.try_acquire(&key, self.rules.lock_ttl()).await {
            LockOutcome::Acquired => SeatHold::Locked,
            LockOutcome::Held => {
                info!("Seat {} is locked by another reservation", key);
                return Ok(ReservationOutcome::unavailable(key));
            }
            LockOutcome::BackendDown => {
                warn!("Seat lock backend unreachable, falling back to store check for {}", key);
                SeatHold::StoreOnly
            }
        };

        match self.place_booking(&schedule, &request).await {
            Ok(Some(booking)) => {
                info!(
                    booking_id = booking.id,
                    "Reserved seat {} on schedule {} ({:?})",
                    booking.seat_number, booking.schedule_id, hold
                );
                publish_event(self.events.as_ref(), booking_event(BookingEventKind::SeatReserved, &booking))
                    .await;
                Ok(ReservationOutcome::Reserved(booking))
            }
            Ok(None) => {
                self.release_hold(hold, &key).await;
                Ok(ReservationOutcome::unavailable(key))
            }
            Err(e) => {
                error!("Failed to record reservation for {}: {}", key, e);
                self.release_hold(hold, &key).await;
                Err(e)
            }
        }
    }

    /// `None` when the seat turns out to be taken.
    async fn place_booking(
        &self,
        schedule: &Schedule,
        request: &ReservationRequest,
    ) -> Result<Option<Booking>, BookingError> {
        let key = SeatKey::new(schedule.id, request.seat_number);
        if seat_occupied(&self.repos, self.events.as_ref(), self.rules.hold_expiry(), &key, None).await? {
            return Ok(None);
        }

        let passenger = &request.passenger;
        let total_price = match passenger.total_price {
            Some(price) => price,
            None => {
                self.repos
                    .routes
                    .get_route(schedule.route_id)
                    .await?
                    .ok_or(BookingError::RouteNotFound(schedule.route_id))?
                    .base_price
            }
        };

        let user_id = match passenger.user_id {
            Some(id) => {
                let user = self.repos.users.get_user(id).await?;
                if user.is_none() {
                    debug!("Unknown user {}, booking as guest", id);
                }
                user.map(|u| u.id)
            }
            None => None,
        };

        let new_booking = NewBooking {
            user_id,
            schedule_id: schedule.id,
            seat_number: request.seat_number,
            total_price,
            pickup: passenger.pickup.clone(),
            dropoff: passenger.dropoff.clone(),
            contact_phone: passenger.contact_phone.clone(),
            remark: passenger.remark.clone(),
        };

        match self.repos.bookings.create_booking(&new_booking).await {
            Ok(booking) => Ok(Some(booking)),
            Err(StoreError::Conflict(reason)) => {
                warn!("Seat insert rejected by store: {}", reason);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn release_hold(&self, hold: SeatHold, key: &SeatKey) {
        if hold == SeatHold::Locked {
            release_seat(self.locks.as_ref(), key).await;
        }
    }
}

fn validate(request: &ReservationRequest) -> Result<(), BookingError> {
    if request.seat_number < 1 {
        return Err(BookingError::InvalidRequest(format!(
            "seat number must be positive, got {}",
            request.seat_number
        )));
    }
    if request.passenger.total_price.is_some_and(|price| price < 0) {
        return Err(BookingError::InvalidRequest("total price cannot be negative".to_string()));
    }
    if request.passenger.pickup.name.trim().is_empty() {
        return Err(BookingError::InvalidRequest("pickup point is required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{departure, request, Harness, BASE_PRICE, PASSENGER_ID};
    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use std::sync::atomic::{AtomicBool, Ordering};
    use vanbook_core::memory::{InMemoryEventLog, InMemorySeatLocks, InMemoryStore};
    use vanbook_core::repository::{ScheduleRepository, StoreResult};
    use vanbook_core::{BookingStatus, NewSchedule, Schedule};

    fn reserved(outcome: ReservationOutcome) -> Booking {
        match outcome {
            ReservationOutcome::Reserved(booking) => booking,
            other => panic!("expected a reservation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reserve_creates_pending_booking() {
        let h = Harness::new().await;
        let booking = reserved(h.services.reservations.reserve(request(departure(8, 0), 5)).await.unwrap());

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.seat_number, 5);
        assert_eq!(booking.total_price, BASE_PRICE);
        assert_eq!(booking.user_id, Some(PASSENGER_ID));
        assert!(h.locks.is_held(&SeatKey::new(booking.schedule_id, 5)).await);
        assert_eq!(h.events.kinds().await, vec![BookingEventKind::SeatReserved]);
    }

    #[tokio::test]
    async fn test_second_attempt_on_held_seat_is_unavailable() {
        let h = Harness::new().await;
        let first = reserved(h.services.reservations.reserve(request(departure(8, 0), 5)).await.unwrap());
        let second = h.services.reservations.reserve(request(departure(8, 0), 5)).await.unwrap();

        match second {
            ReservationOutcome::SeatUnavailable { schedule_id, seat_number } => {
                assert_eq!(schedule_id, first.schedule_id);
                assert_eq!(seat_number, 5);
            }
            other => panic!("expected seat unavailable, got {:?}", other),
        }
        assert_eq!(h.store.all_bookings().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_admit_exactly_one() {
        let h = Harness::new().await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let reservations = h.services.reservations.clone();
            handles.push(tokio::spawn(async move { reservations.reserve(request(departure(9, 0), 3)).await }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_reserved() {
                wins += 1;
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(h.store.all_bookings().await.len(), 1);
        assert_eq!(h.store.schedule_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lock_outage_still_prevents_double_booking() {
        let h = Harness::new().await;
        h.locks.set_reachable(false);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let reservations = h.services.reservations.clone();
            handles.push(tokio::spawn(async move { reservations.reserve(request(departure(9, 0), 3)).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let active: Vec<_> = h
            .store
            .all_bookings()
            .await
            .into_iter()
            .filter(|b| b.seat_number == 3 && b.status.is_active())
            .collect();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_rejects_seat_already_taken() {
        let h = Harness::new().await;
        reserved(h.services.reservations.reserve(request(departure(8, 0), 5)).await.unwrap());

        h.locks.set_reachable(false);
        let outcome = h.services.reservations.reserve(request(departure(8, 0), 5)).await.unwrap();
        assert!(!outcome.is_reserved());

        let other_seat = h.services.reservations.reserve(request(departure(8, 0), 6)).await.unwrap();
        assert!(other_seat.is_reserved());
    }

    #[tokio::test]
    async fn test_distinct_seats_share_one_schedule() {
        let h = Harness::new().await;
        let a = reserved(h.services.reservations.reserve(request(departure(10, 30), 1)).await.unwrap());
        let b = reserved(h.services.reservations.reserve(request(departure(10, 30), 2)).await.unwrap());

        assert_eq!(a.schedule_id, b.schedule_id);
        assert_eq!(h.store.schedule_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_route_creates_nothing() {
        let h = Harness::new().await;
        let mut req = request(departure(8, 0), 1);
        req.route_id = 999;

        let err = h.services.reservations.reserve(req).await.unwrap_err();
        assert!(matches!(err, BookingError::RouteNotFound(999)));
        assert_eq!(h.store.schedule_count().await, 0);
        assert!(h.events.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_seat_is_rejected() {
        let h = Harness::new().await;
        let err = h.services.reservations.reserve(request(departure(8, 0), 0)).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidRequest(_)));
        assert_eq!(h.store.schedule_count().await, 0);
    }

    #[tokio::test]
    async fn test_store_failure_releases_lock() {
        let h = Harness::new().await;
        h.store.set_fail_booking_writes(true);

        let err = h.services.reservations.reserve(request(departure(8, 0), 4)).await.unwrap_err();
        assert!(matches!(err, BookingError::Store(StoreError::Backend(_))));

        let schedule = h.store.find_schedule(crate::testing::ROUTE_ID, departure(8, 0)).await.unwrap().unwrap();
        assert!(!h.locks.is_held(&SeatKey::new(schedule.id, 4)).await);

        h.store.set_fail_booking_writes(false);
        assert!(h.services.reservations.reserve(request(departure(8, 0), 4)).await.unwrap().is_reserved());
    }

    #[tokio::test]
    async fn test_unknown_user_books_as_guest() {
        let h = Harness::new().await;
        let mut req = request(departure(8, 0), 2);
        req.passenger.user_id = Some(4242);
        req.passenger.total_price = Some(12_500);

        let booking = reserved(h.services.reservations.reserve(req).await.unwrap());
        assert_eq!(booking.user_id, None);
        assert_eq!(booking.total_price, 12_500);
    }

    #[tokio::test]
    async fn test_abandoned_pending_booking_frees_seat() {
        let h = Harness::with_rules(BookingRules { lock_ttl_seconds: 0, ..BookingRules::default() }).await;
        let stale = reserved(h.services.reservations.reserve(request(departure(8, 0), 7)).await.unwrap());
        let fresh = reserved(h.services.reservations.reserve(request(departure(8, 0), 7)).await.unwrap());

        assert_ne!(stale.id, fresh.id);
        let stale = h.store.all_bookings().await.into_iter().find(|b| b.id == stale.id).unwrap();
        assert_eq!(stale.status, BookingStatus::Rejected);
        assert_eq!(
            h.events.kinds().await,
            vec![
                BookingEventKind::SeatReserved,
                BookingEventKind::BookingRejected,
                BookingEventKind::SeatReserved
            ]
        );
    }

    /// Misses the first lookup of every departure, as if a concurrent request
    /// created the schedule between our lookup and our insert.
    struct RacingSchedules {
        inner: Arc<InMemoryStore>,
        missed: AtomicBool,
    }

    #[async_trait]
    impl ScheduleRepository for RacingSchedules {
        async fn find_schedule(
            &self,
            route_id: i64,
            departure_time: NaiveDateTime,
        ) -> StoreResult<Option<Schedule>> {
            if !self.missed.swap(true, Ordering::SeqCst) {
                self.inner.create_schedule(&NewSchedule::new(route_id, departure_time)).await?;
                return Ok(None);
            }
            self.inner.find_schedule(route_id, departure_time).await
        }

        async fn get_schedule(&self, id: i64) -> StoreResult<Option<Schedule>> {
            self.inner.get_schedule(id).await
        }

        async fn create_schedule(&self, schedule: &NewSchedule) -> StoreResult<Schedule> {
            self.inner.create_schedule(schedule).await
        }

        async fn list_driver_schedules(&self, driver_id: i64) -> StoreResult<Vec<Schedule>> {
            self.inner.list_driver_schedules(driver_id).await
        }
    }

    #[tokio::test]
    async fn test_lost_schedule_race_reuses_winner() {
        let h = Harness::new().await;
        let mut repos = Repositories::from_backend(h.store.clone());
        repos.schedules = Arc::new(RacingSchedules { inner: h.store.clone(), missed: AtomicBool::new(false) });

        let coordinator = ReservationCoordinator::new(
            repos.clone(),
            ScheduleResolver::new(repos, 3),
            Arc::new(InMemorySeatLocks::new()),
            Arc::new(InMemoryEventLog::new()),
            BookingRules::default(),
        );

        let booking = reserved(coordinator.reserve(request(departure(11, 0), 1)).await.unwrap());
        assert_eq!(h.store.schedule_count().await, 1);
        let schedule = h.store.find_schedule(crate::testing::ROUTE_ID, departure(11, 0)).await.unwrap().unwrap();
        assert_eq!(booking.schedule_id, schedule.id);
    }

    #[test]
    fn test_request_accepts_flat_passenger_fields() {
        let req: ReservationRequest = serde_json::from_value(serde_json::json!({
            "route_id": 1,
            "departure_time": "2024-06-01T08:00:00",
            "seat_number": 5,
            "pickup": { "name": "Mo Chit" },
            "contact_phone": "0812345678"
        }))
        .unwrap();

        assert_eq!(req.seat_number, 5);
        assert_eq!(req.passenger.pickup.name, "Mo Chit");
        assert_eq!(req.passenger.user_id, None);
        assert_eq!(req.passenger.contact_phone.as_ref().map(|p| p.expose().as_str()), Some("0812345678"));
    }
}
