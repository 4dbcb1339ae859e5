use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use vanbook_catalog::VirtualSchedule;
use vanbook_core::Schedule;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TimetableQuery {
    pub route_id: i64,
    pub date: NaiveDate,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/schedules", get(get_timetable))
        .route("/api/schedules/{id}", get(get_schedule))
}

/// GET /api/schedules?route_id=&date=
/// The day's departures for a route; nothing is persisted until a seat is booked
async fn get_timetable(
    State(state): State<AppState>,
    Query(query): Query<TimetableQuery>,
) -> Result<Json<Vec<VirtualSchedule>>, AppError> {
    let slots = state.timetable.generate(query.route_id, query.date).await?;
    Ok(Json(slots))
}

/// GET /api/schedules/{id}
async fn get_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<i64>,
) -> Result<Json<Schedule>, AppError> {
    Ok(Json(state.services.queries.get_schedule(schedule_id).await?))
}
