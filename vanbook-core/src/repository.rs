use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;

use crate::identity::User;
use crate::model::{Booking, BookingStatus, NewBooking, NewSchedule, Route, Schedule};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint rejected the write: a schedule already exists for
    /// the (route, departure time), or an active booking already holds the seat.
    #[error("Uniqueness constraint violated: {0}")]
    Conflict(String),
    #[error("Store backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

/// Read access to routes owned by administration
#[async_trait]
pub trait RouteRepository: Send + Sync {
    async fn get_route(&self, id: i64) -> StoreResult<Option<Route>>;
}

/// Read access to accounts owned by the registration service
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: i64) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn find_schedule(
        &self,
        route_id: i64,
        departure_time: NaiveDateTime,
    ) -> StoreResult<Option<Schedule>>;

    async fn get_schedule(&self, id: i64) -> StoreResult<Option<Schedule>>;

    /// Fails with `StoreError::Conflict` when a schedule already exists for the
    /// same (route, departure time).
    async fn create_schedule(&self, schedule: &NewSchedule) -> StoreResult<Schedule>;

    async fn list_driver_schedules(&self, driver_id: i64) -> StoreResult<Vec<Schedule>>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Inserts a `PENDING` booking. Fails with `StoreError::Conflict` when another
    /// active booking already holds the same (schedule, seat).
    async fn create_booking(&self, booking: &NewBooking) -> StoreResult<Booking>;

    async fn get_booking(&self, id: i64) -> StoreResult<Option<Booking>>;

    async fn list_schedule_bookings(&self, schedule_id: i64) -> StoreResult<Vec<Booking>>;

    async fn list_user_bookings(&self, user_id: i64) -> StoreResult<Vec<Booking>>;

    /// Single-row compare-and-set. Returns `None` when the booking is missing or
    /// its status is not one of `from`.
    async fn transition_status(
        &self,
        id: i64,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> StoreResult<Option<Booking>>;

    /// `PENDING` → `CONFIRMED`, recording the verified slip. `None` if not pending.
    async fn confirm_payment(
        &self,
        id: i64,
        slip_image_ref: &str,
        transaction_ref: &str,
    ) -> StoreResult<Option<Booking>>;

    /// Moves an active booking from one schedule to another, keeping its seat.
    /// `None` if the booking is no longer active on `from_schedule_id`;
    /// `StoreError::Conflict` if the seat is taken on the target schedule.
    async fn move_booking(
        &self,
        id: i64,
        from_schedule_id: i64,
        to_schedule_id: i64,
    ) -> StoreResult<Option<Booking>>;
}

/// The persistent store as seen by the booking services.
#[derive(Clone)]
pub struct Repositories {
    pub routes: Arc<dyn RouteRepository>,
    pub users: Arc<dyn UserRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub bookings: Arc<dyn BookingRepository>,
}

impl Repositories {
    /// Wires all four repositories to a single backend.
    pub fn from_backend<S>(store: Arc<S>) -> Self
    where
        S: RouteRepository + UserRepository + ScheduleRepository + BookingRepository + 'static,
    {
        Self {
            routes: store.clone(),
            users: store.clone(),
            schedules: store.clone(),
            bookings: store,
        }
    }
}
