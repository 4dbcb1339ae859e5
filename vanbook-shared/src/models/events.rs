use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Topic every booking lifecycle event is published to, keyed by booking id.
pub const BOOKING_EVENTS_TOPIC: &str = "bookings.events";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEventKind {
    SeatReserved,
    BookingConfirmed,
    BookingRejected,
    BookingCancelled,
    BookingRescheduled,
    PassengerPickedUp,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BookingEvent {
    pub event_id: Uuid,
    pub kind: BookingEventKind,
    pub booking_id: i64,
    pub schedule_id: i64,
    /// Only set for `BookingRescheduled`.
    pub previous_schedule_id: Option<i64>,
    pub seat_number: i32,
    pub status: String,
    pub user_id: Option<i64>,
    pub timestamp: i64,
}

impl BookingEvent {
    pub fn new(
        kind: BookingEventKind,
        booking_id: i64,
        schedule_id: i64,
        seat_number: i32,
        status: impl Into<String>,
        user_id: Option<i64>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            kind,
            booking_id,
            schedule_id,
            previous_schedule_id: None,
            seat_number,
            status: status.into(),
            user_id,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn with_previous_schedule(mut self, schedule_id: i64) -> Self {
        self.previous_schedule_id = Some(schedule_id);
        self
    }

    pub fn partition_key(&self) -> String {
        self.booking_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_wire_format() {
        let event = BookingEvent::new(BookingEventKind::SeatReserved, 7, 3, 5, "PENDING", None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "SEAT_RESERVED");
        assert_eq!(json["previous_schedule_id"], serde_json::Value::Null);
        assert_eq!(event.partition_key(), "7");
    }
}
