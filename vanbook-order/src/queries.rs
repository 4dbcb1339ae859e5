use chrono::NaiveDateTime;
use serde::Serialize;
use vanbook_core::{Booking, Repositories, Schedule};

use crate::error::BookingError;

/// A driver's assigned departure with how many passengers hold a seat on it.
#[derive(Debug, Clone, Serialize)]
pub struct DriverSchedule {
    #[serde(flatten)]
    pub schedule: Schedule,
    pub passenger_count: usize,
}

/// Read-only views over bookings and schedules. Nothing here touches the seat
/// lock.
pub struct BookingQueries {
    repos: Repositories,
}

impl BookingQueries {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Seats shown as taken on the seat map, ascending. A departure nobody
    /// has booked yet has no schedule row and therefore no taken seats.
    pub async fn list_booked_seats(
        &self,
        route_id: i64,
        departure_time: NaiveDateTime,
    ) -> Result<Vec<i32>, BookingError> {
        let Some(schedule) = self.repos.schedules.find_schedule(route_id, departure_time).await? else {
            return Ok(Vec::new());
        };

        let mut seats: Vec<i32> = self
            .repos
            .bookings
            .list_schedule_bookings(schedule.id)
            .await?
            .into_iter()
            .filter(|b| b.status.occupies_seat())
            .map(|b| b.seat_number)
            .collect();
        seats.sort_unstable();
        seats.dedup();
        Ok(seats)
    }

    pub async fn get_booking(&self, booking_id: i64) -> Result<Booking, BookingError> {
        self.repos
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    /// Passenger history, newest first.
    pub async fn list_user_bookings(&self, user_id: i64) -> Result<Vec<Booking>, BookingError> {
        let mut bookings = self.repos.bookings.list_user_bookings(user_id).await?;
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(bookings)
    }

    pub async fn get_schedule(&self, schedule_id: i64) -> Result<Schedule, BookingError> {
        self.repos
            .schedules
            .get_schedule(schedule_id)
            .await?
            .ok_or(BookingError::ScheduleNotFound(schedule_id))
    }

    pub async fn driver_schedules(&self, driver_id: i64) -> Result<Vec<DriverSchedule>, BookingError> {
        let schedules = self.repos.schedules.list_driver_schedules(driver_id).await?;

        let mut dashboard = Vec::with_capacity(schedules.len());
        for schedule in schedules {
            let passenger_count = self
                .repos
                .bookings
                .list_schedule_bookings(schedule.id)
                .await?
                .iter()
                .filter(|b| b.status.occupies_seat())
                .count();
            dashboard.push(DriverSchedule { schedule, passenger_count });
        }
        Ok(dashboard)
    }

    /// Passenger manifest for one departure, by seat.
    pub async fn schedule_bookings(&self, schedule_id: i64) -> Result<Vec<Booking>, BookingError> {
        let schedule = self.get_schedule(schedule_id).await?;
        let mut bookings = self.repos.bookings.list_schedule_bookings(schedule.id).await?;
        bookings.sort_by_key(|b| (b.seat_number, b.id));
        Ok(bookings)
    }
}
