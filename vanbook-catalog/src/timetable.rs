use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vanbook_core::repository::{RouteRepository, StoreResult};
use vanbook_core::{BookingRules, ScheduleStatus};

/// A departure offered on the timetable but not (necessarily) persisted.
///
/// `slot` numbers the day's departures from 1 and is never a store id; a
/// schedule row only exists once someone books a seat on that departure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VirtualSchedule {
    pub slot: u32,
    pub route_id: i64,
    pub departure_time: NaiveDateTime,
    pub status: ScheduleStatus,
}

/// Builds a route's daily timetable from the operating windows in [`BookingRules`].
pub struct ScheduleGenerator {
    routes: Arc<dyn RouteRepository>,
    rules: BookingRules,
}

impl ScheduleGenerator {
    pub fn new(routes: Arc<dyn RouteRepository>, rules: BookingRules) -> Self {
        Self { routes, rules }
    }

    /// Departures for `route_id` on `date`, in time order. Unknown routes get an
    /// empty timetable rather than an error.
    pub async fn generate(&self, route_id: i64, date: NaiveDate) -> StoreResult<Vec<VirtualSchedule>> {
        if self.routes.get_route(route_id).await?.is_none() {
            tracing::debug!("No timetable for unknown route {}", route_id);
            return Ok(Vec::new());
        }

        let schedules = departure_slots(date, &self.rules)
            .into_iter()
            .zip(1u32..)
            .map(|(departure_time, slot)| VirtualSchedule {
                slot,
                route_id,
                departure_time,
                status: ScheduleStatus::Available,
            })
            .collect();

        Ok(schedules)
    }
}

/// Departure times for one day: window start, then every slot interval up to
/// and including the window end. Never wraps past midnight.
pub fn departure_slots(date: NaiveDate, rules: &BookingRules) -> Vec<NaiveDateTime> {
    let window = rules.window_for(date);
    let interval = rules.slot_interval();
    let mut slots = Vec::new();

    let mut current = window.start;
    while current <= window.end {
        slots.push(date.and_time(current));

        let (next, wrapped) = current.overflowing_add_signed(interval);
        if wrapped != 0 || next <= current {
            break;
        }
        current = next;
    }

    slots
}
