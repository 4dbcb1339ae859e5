use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Daily operating hours, both ends inclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatingWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl OperatingWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    fn hours(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start: NaiveTime::from_hms_opt(start_hour, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(end_hour, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingRules {
    /// How long an unpaid reservation may hold a seat.
    #[serde(default = "default_lock_ttl_seconds")]
    pub lock_ttl_seconds: u64,
    #[serde(default = "default_weekday_window")]
    pub weekday_window: OperatingWindow,
    #[serde(default = "default_weekend_window")]
    pub weekend_window: OperatingWindow,
    #[serde(default = "default_slot_interval_minutes")]
    pub slot_interval_minutes: u32,
    /// Lookups after losing a schedule-creation race before giving up.
    #[serde(default = "default_schedule_resolve_attempts")]
    pub schedule_resolve_attempts: u32,
}

fn default_lock_ttl_seconds() -> u64 { 600 }
fn default_weekday_window() -> OperatingWindow { OperatingWindow::hours(8, 18) }
fn default_weekend_window() -> OperatingWindow { OperatingWindow::hours(10, 17) }
fn default_slot_interval_minutes() -> u32 { 30 }
fn default_schedule_resolve_attempts() -> u32 { 3 }

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            lock_ttl_seconds: default_lock_ttl_seconds(),
            weekday_window: default_weekday_window(),
            weekend_window: default_weekend_window(),
            slot_interval_minutes: default_slot_interval_minutes(),
            schedule_resolve_attempts: default_schedule_resolve_attempts(),
        }
    }
}

impl BookingRules {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_seconds)
    }

    /// The lock TTL as a calendar duration, for ageing `PENDING` bookings.
    pub fn hold_expiry(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.lock_ttl()).unwrap_or(chrono::Duration::MAX)
    }

    pub fn slot_interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.slot_interval_minutes))
    }

    /// Saturdays and Sundays run the shorter weekend window.
    pub fn window_for(&self, date: NaiveDate) -> OperatingWindow {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => self.weekend_window,
            _ => self.weekday_window,
        }
    }
}
