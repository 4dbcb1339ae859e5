use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vanbook_shared::Masked;

use crate::CoreError;

/// Origin/destination pair owned by administration. The core only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    pub id: i64,
    pub origin_station_id: i64,
    pub destination_station_id: i64,
    /// Satang.
    pub base_price: i32,
    /// Minutes.
    pub estimated_duration: Option<i32>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Available,
    Full,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleStatus::Available => "AVAILABLE",
            ScheduleStatus::Full => "FULL",
            ScheduleStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(ScheduleStatus::Available),
            "FULL" => Ok(ScheduleStatus::Full),
            "CANCELLED" => Ok(ScheduleStatus::Cancelled),
            other => Err(CoreError::UnknownVariant { kind: "schedule status", value: other.to_string() }),
        }
    }
}

/// One departure of one route. At most one row exists per (route, departure time).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub id: i64,
    pub route_id: i64,
    pub driver_id: Option<i64>,
    pub vehicle_id: Option<i64>,
    pub departure_time: NaiveDateTime,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a lazily created schedule; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSchedule {
    pub route_id: i64,
    pub departure_time: NaiveDateTime,
}

impl NewSchedule {
    pub fn new(route_id: i64, departure_time: NaiveDateTime) -> Self {
        Self { route_id, departure_time }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Rejected,
    PickedUp,
}

impl BookingStatus {
    /// Statuses that hold the seat exclusively. At most one booking per
    /// (schedule, seat) may be in one of these.
    pub const ACTIVE: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Confirmed];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    /// Whether the seat shows as booked on the seat map. Picked-up passengers
    /// still sit in the seat even though the booking is no longer active.
    pub fn occupies_seat(self) -> bool {
        !matches!(self, BookingStatus::Cancelled | BookingStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::PickedUp => "PICKED_UP",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "REJECTED" => Ok(BookingStatus::Rejected),
            "PICKED_UP" => Ok(BookingStatus::PickedUp),
            other => Err(CoreError::UnknownVariant { kind: "booking status", value: other.to_string() }),
        }
    }
}

/// Named pickup or dropoff point, optionally pinned on the map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Waypoint {
    pub name: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl Waypoint {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), lat: None, lng: None }
    }
}

/// One passenger's claim on one seat of one schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: Option<i64>,
    pub schedule_id: i64,
    pub seat_number: i32,
    pub status: BookingStatus,
    /// Satang.
    pub total_price: i32,
    pub pickup: Waypoint,
    pub dropoff: Option<Waypoint>,
    pub contact_phone: Option<Masked<String>>,
    pub remark: Option<String>,
    pub slip_image_ref: Option<String>,
    pub transaction_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a reservation. New bookings always start `PENDING`.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Option<i64>,
    pub schedule_id: i64,
    pub seat_number: i32,
    pub total_price: i32,
    pub pickup: Waypoint,
    pub dropoff: Option<Waypoint>,
    pub contact_phone: Option<Masked<String>>,
    pub remark: Option<String>,
}
