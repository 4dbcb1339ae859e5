//! In-process backends for the store, the seat lock and the event channel.
//!
//! They enforce the same uniqueness rules as the Postgres schema (one schedule
//! per route and departure, one active booking per seat) so the booking
//! services behave identically against them. Used by tests and local runs
//! without infrastructure.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use vanbook_shared::{BookingEvent, BookingEventKind};

use crate::events::EventPublisher;
use crate::identity::User;
use crate::lock::{LockError, LockOutcome, SeatKey, SeatLocker};
use crate::model::{Booking, BookingStatus, NewBooking, NewSchedule, Route, Schedule, ScheduleStatus};
use crate::repository::{
    BookingRepository, RouteRepository, ScheduleRepository, StoreError, StoreResult, UserRepository,
};

#[derive(Default)]
struct MemoryState {
    routes: HashMap<i64, Route>,
    users: HashMap<i64, User>,
    schedules: BTreeMap<i64, Schedule>,
    bookings: BTreeMap<i64, Booking>,
    last_schedule_id: i64,
    last_booking_id: i64,
}

impl MemoryState {
    fn seat_taken(&self, schedule_id: i64, seat_number: i32, except: Option<i64>) -> bool {
        self.bookings.values().any(|b| {
            b.schedule_id == schedule_id
                && b.seat_number == seat_number
                && b.status.is_active()
                && Some(b.id) != except
        })
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    fail_booking_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_route(&self, route: Route) {
        self.state.write().await.routes.insert(route.id, route);
    }

    pub async fn insert_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn assign_driver(&self, schedule_id: i64, driver_id: i64) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let schedule = state
            .schedules
            .get_mut(&schedule_id)
            .ok_or_else(|| StoreError::NotFound(format!("schedule {}", schedule_id)))?;
        schedule.driver_id = Some(driver_id);
        Ok(())
    }

    /// Makes every subsequent booking insert fail with a backend error.
    pub fn set_fail_booking_writes(&self, fail: bool) {
        self.fail_booking_writes.store(fail, Ordering::SeqCst);
    }

    /// Shifts a booking's timestamps into the past, as if it had been made
    /// `age` ago.
    pub async fn backdate_booking(&self, id: i64, age: chrono::Duration) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", id)))?;
        booking.created_at -= age;
        booking.updated_at -= age;
        Ok(())
    }

    pub async fn schedule_count(&self) -> usize {
        self.state.read().await.schedules.len()
    }

    pub async fn all_bookings(&self) -> Vec<Booking> {
        self.state.read().await.bookings.values().cloned().collect()
    }
}

#[async_trait]
impl RouteRepository for InMemoryStore {
    async fn get_route(&self, id: i64) -> StoreResult<Option<Route>> {
        Ok(self.state.read().await.routes.get(&id).cloned())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryStore {
    async fn find_schedule(
        &self,
        route_id: i64,
        departure_time: NaiveDateTime,
    ) -> StoreResult<Option<Schedule>> {
        let state = self.state.read().await;
        Ok(state
            .schedules
            .values()
            .find(|s| s.route_id == route_id && s.departure_time == departure_time)
            .cloned())
    }

    async fn get_schedule(&self, id: i64) -> StoreResult<Option<Schedule>> {
        Ok(self.state.read().await.schedules.get(&id).cloned())
    }

    async fn create_schedule(&self, schedule: &NewSchedule) -> StoreResult<Schedule> {
        let mut state = self.state.write().await;
        let exists = state
            .schedules
            .values()
            .any(|s| s.route_id == schedule.route_id && s.departure_time == schedule.departure_time);
        if exists {
            return Err(StoreError::Conflict(format!(
                "schedule for route {} at {} already exists",
                schedule.route_id, schedule.departure_time
            )));
        }

        state.last_schedule_id += 1;
        let created = Schedule {
            id: state.last_schedule_id,
            route_id: schedule.route_id,
            driver_id: None,
            vehicle_id: None,
            departure_time: schedule.departure_time,
            status: ScheduleStatus::Available,
            created_at: Utc::now(),
        };
        state.schedules.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_driver_schedules(&self, driver_id: i64) -> StoreResult<Vec<Schedule>> {
        let state = self.state.read().await;
        let mut schedules: Vec<Schedule> = state
            .schedules
            .values()
            .filter(|s| s.driver_id == Some(driver_id))
            .cloned()
            .collect();
        schedules.sort_by_key(|s| s.departure_time);
        Ok(schedules)
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn create_booking(&self, booking: &NewBooking) -> StoreResult<Booking> {
        if self.fail_booking_writes.load(Ordering::SeqCst) {
            return Err(StoreError::backend(std::io::Error::other("booking writes disabled")));
        }

        let mut state = self.state.write().await;
        if state.seat_taken(booking.schedule_id, booking.seat_number, None) {
            return Err(StoreError::Conflict(format!(
                "seat {} on schedule {} already held",
                booking.seat_number, booking.schedule_id
            )));
        }

        state.last_booking_id += 1;
        let now = Utc::now();
        let created = Booking {
            id: state.last_booking_id,
            user_id: booking.user_id,
            schedule_id: booking.schedule_id,
            seat_number: booking.seat_number,
            status: BookingStatus::Pending,
            total_price: booking.total_price,
            pickup: booking.pickup.clone(),
            dropoff: booking.dropoff.clone(),
            contact_phone: booking.contact_phone.clone(),
            remark: booking.remark.clone(),
            slip_image_ref: None,
            transaction_ref: None,
            created_at: now,
            updated_at: now,
        };
        state.bookings.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_booking(&self, id: i64) -> StoreResult<Option<Booking>> {
        Ok(self.state.read().await.bookings.get(&id).cloned())
    }

    async fn list_schedule_bookings(&self, schedule_id: i64) -> StoreResult<Vec<Booking>> {
        let state = self.state.read().await;
        Ok(state.bookings.values().filter(|b| b.schedule_id == schedule_id).cloned().collect())
    }

    async fn list_user_bookings(&self, user_id: i64) -> StoreResult<Vec<Booking>> {
        let state = self.state.read().await;
        Ok(state.bookings.values().filter(|b| b.user_id == Some(user_id)).cloned().collect())
    }

    async fn transition_status(
        &self,
        id: i64,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> StoreResult<Option<Booking>> {
        let mut state = self.state.write().await;
        match state.bookings.get_mut(&id) {
            Some(booking) if from.contains(&booking.status) => {
                booking.status = to;
                booking.updated_at = Utc::now();
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn confirm_payment(
        &self,
        id: i64,
        slip_image_ref: &str,
        transaction_ref: &str,
    ) -> StoreResult<Option<Booking>> {
        let mut state = self.state.write().await;
        match state.bookings.get_mut(&id) {
            Some(booking) if booking.status == BookingStatus::Pending => {
                booking.status = BookingStatus::Confirmed;
                booking.slip_image_ref = Some(slip_image_ref.to_string());
                booking.transaction_ref = Some(transaction_ref.to_string());
                booking.updated_at = Utc::now();
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn move_booking(
        &self,
        id: i64,
        from_schedule_id: i64,
        to_schedule_id: i64,
    ) -> StoreResult<Option<Booking>> {
        let mut state = self.state.write().await;
        let seat_number = match state.bookings.get(&id) {
            Some(b) if b.schedule_id == from_schedule_id && b.status.is_active() => b.seat_number,
            _ => return Ok(None),
        };
        if state.seat_taken(to_schedule_id, seat_number, Some(id)) {
            return Err(StoreError::Conflict(format!(
                "seat {} on schedule {} already held",
                seat_number, to_schedule_id
            )));
        }

        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", id)))?;
        booking.schedule_id = to_schedule_id;
        booking.updated_at = Utc::now();
        Ok(Some(booking.clone()))
    }
}

/// TTL-bound seat holds kept in a map, with a switch that simulates the
/// backend becoming unreachable. A hold without an expiry never lapses.
pub struct InMemorySeatLocks {
    holds: Mutex<HashMap<SeatKey, Option<Instant>>>,
    reachable: AtomicBool,
}

impl Default for InMemorySeatLocks {
    fn default() -> Self {
        Self {
            holds: Mutex::new(HashMap::new()),
            reachable: AtomicBool::new(true),
        }
    }
}

fn live(expires_at: &Option<Instant>, now: Instant) -> bool {
    expires_at.map_or(true, |at| at > now)
}

impl InMemorySeatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub async fn is_held(&self, key: &SeatKey) -> bool {
        let holds = self.holds.lock().await;
        holds.get(key).is_some_and(|expires_at| live(expires_at, Instant::now()))
    }

    /// Entries still in the map, live or not yet evicted.
    pub async fn tracked(&self) -> usize {
        self.holds.lock().await.len()
    }
}

#[async_trait]
impl SeatLocker for InMemorySeatLocks {
    async fn try_acquire(&self, key: &SeatKey, ttl: Duration) -> LockOutcome {
        if !self.reachable.load(Ordering::SeqCst) {
            return LockOutcome::BackendDown;
        }

        let mut holds = self.holds.lock().await;
        let now = Instant::now();
        holds.retain(|_, expires_at| live(expires_at, now));

        if holds.contains_key(key) {
            return LockOutcome::Held;
        }
        holds.insert(*key, now.checked_add(ttl));
        LockOutcome::Acquired
    }

    async fn release(&self, key: &SeatKey) -> Result<(), LockError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(LockError::Unavailable(format!("cannot release {}", key)));
        }
        self.holds.lock().await.remove(key);
        Ok(())
    }
}

/// Keeps every published event for inspection.
#[derive(Default)]
pub struct InMemoryEventLog {
    events: Mutex<Vec<BookingEvent>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<BookingEvent> {
        self.events.lock().await.clone()
    }

    pub async fn kinds(&self) -> Vec<BookingEventKind> {
        self.events.lock().await.iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventLog {
    async fn publish(
        &self,
        event: &BookingEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
