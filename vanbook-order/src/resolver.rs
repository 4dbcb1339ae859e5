use chrono::NaiveDateTime;
use tracing::{debug, info};
use vanbook_core::{NewSchedule, Repositories, Schedule, StoreError};

use crate::error::BookingError;

/// Finds the persisted schedule for a (route, departure time), creating it on
/// first use.
///
/// Lookup and insert are separate statements, so two requests for a
/// never-booked departure can both miss and both insert. The store's unique
/// index rejects the second insert and the loser looks the row up again.
#[derive(Clone)]
pub struct ScheduleResolver {
    repos: Repositories,
    attempts: u32,
}

impl ScheduleResolver {
    pub fn new(repos: Repositories, attempts: u32) -> Self {
        Self { repos, attempts: attempts.max(1) }
    }

    pub async fn resolve(
        &self,
        route_id: i64,
        departure_time: NaiveDateTime,
    ) -> Result<Schedule, BookingError> {
        for attempt in 1..=self.attempts {
            if let Some(schedule) = self.repos.schedules.find_schedule(route_id, departure_time).await? {
                return Ok(schedule);
            }

            if self.repos.routes.get_route(route_id).await?.is_none() {
                return Err(BookingError::RouteNotFound(route_id));
            }

            match self.repos.schedules.create_schedule(&NewSchedule::new(route_id, departure_time)).await {
                Ok(schedule) => {
                    info!("Created schedule {} for route {} at {}", schedule.id, route_id, departure_time);
                    return Ok(schedule);
                }
                Err(StoreError::Conflict(reason)) => {
                    debug!(attempt, "Lost schedule creation race ({}), looking up again", reason);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Conflict(format!(
            "schedule for route {} at {} still unresolved after {} attempts",
            route_id, departure_time, self.attempts
        ))
        .into())
    }
}
