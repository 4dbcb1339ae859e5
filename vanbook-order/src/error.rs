use vanbook_core::{BookingStatus, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Route not found: {0}")]
    RouteNotFound(i64),

    #[error("Schedule not found: {0}")]
    ScheduleNotFound(i64),

    #[error("Booking not found: {0}")]
    BookingNotFound(i64),

    #[error("Seat {seat_number} is not available on schedule {schedule_id}")]
    SeatUnavailable { schedule_id: i64, seat_number: i32 },

    #[error("Booking {booking_id} is {status} and cannot be {action}")]
    InvalidState {
        booking_id: i64,
        status: BookingStatus,
        action: &'static str,
    },

    #[error("Invalid booking request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BookingError::RouteNotFound(_)
                | BookingError::ScheduleNotFound(_)
                | BookingError::BookingNotFound(_)
                | BookingError::Store(StoreError::NotFound(_))
        )
    }
}
