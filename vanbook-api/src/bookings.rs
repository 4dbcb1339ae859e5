use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;
use vanbook_core::Booking;
use vanbook_order::{ReservationOutcome, ReservationRequest};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ReserveResponse {
    pub message: String,
    pub booking: Booking,
}

#[derive(Debug, Deserialize)]
pub struct BookedSeatsQuery {
    pub route_id: i64,
    pub departure_time: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleQuery {
    pub new_departure_time: NaiveDateTime,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/bookings/reserve", post(reserve_seat))
        .route("/api/bookings/booked-seats", get(list_booked_seats))
        .route("/api/bookings/user/{id}", get(list_user_bookings))
        .route("/api/bookings/{id}", get(get_booking))
        .route("/api/bookings/{id}/cancel", put(cancel_booking))
        .route("/api/bookings/{id}/reschedule", put(reschedule_booking))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/bookings/reserve
/// Hold a seat for a departure; the booking stays PENDING until the slip is verified
async fn reserve_seat(
    State(state): State<AppState>,
    Json(req): Json<ReservationRequest>,
) -> Result<Json<ReserveResponse>, AppError> {
    let outcome = match state.services.reservations.reserve(req).await {
        Ok(outcome) => outcome,
        Err(e) => {
            state.metrics.record_reservation("error");
            return Err(e.into());
        }
    };

    let message = outcome.message();
    match outcome {
        ReservationOutcome::Reserved(booking) => {
            state.metrics.record_reservation("reserved");
            Ok(Json(ReserveResponse { message, booking }))
        }
        ReservationOutcome::SeatUnavailable { .. } => {
            state.metrics.record_reservation("seat_unavailable");
            Err(AppError::ConflictError(message))
        }
    }
}

/// GET /api/bookings/booked-seats?route_id=&departure_time=
async fn list_booked_seats(
    State(state): State<AppState>,
    Query(query): Query<BookedSeatsQuery>,
) -> Result<Json<Vec<i32>>, AppError> {
    let seats = state
        .services
        .queries
        .list_booked_seats(query.route_id, query.departure_time)
        .await?;
    Ok(Json(seats))
}

/// GET /api/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<i64>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.services.queries.get_booking(booking_id).await?))
}

/// GET /api/bookings/user/{id}
/// Booking history for one passenger, newest first
async fn list_user_bookings(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.services.queries.list_user_bookings(user_id).await?))
}

/// PUT /api/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<i64>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.services.lifecycle.cancel(booking_id).await?;
    state.metrics.record_transition("cancelled");
    info!("Booking {} cancelled via API", booking_id);
    Ok(Json(booking))
}

/// PUT /api/bookings/{id}/reschedule?new_departure_time=
async fn reschedule_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<i64>,
    Query(query): Query<RescheduleQuery>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .services
        .lifecycle
        .reschedule(booking_id, query.new_departure_time)
        .await?;
    state.metrics.record_transition("rescheduled");
    Ok(Json(booking))
}
