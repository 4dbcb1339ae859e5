use axum::{
    extract::{Path, State},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use vanbook_core::Booking;
use vanbook_order::DriverSchedule;

use crate::error::AppError;
use crate::middleware::{driver_auth_middleware, AuthUser};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/driver/verify-pickup/{id}", post(verify_pickup))
        // Both take `{id}`: a driver id on the first, a schedule id on the second.
        .route("/api/driver/schedules/{id}", get(driver_schedules))
        .route("/api/driver/schedules/{id}/bookings", get(schedule_bookings))
        .route_layer(middleware::from_fn_with_state(state, driver_auth_middleware))
}

/// POST /api/driver/verify-pickup/{id}
async fn verify_pickup(
    State(state): State<AppState>,
    Path(booking_id): Path<i64>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.services.lifecycle.verify_pickup(booking_id).await?;
    state.metrics.record_transition("picked_up");
    Ok(Json(booking))
}

/// GET /api/driver/schedules/{id}
/// Drivers see their own assignments; admins may look at anyone's
async fn driver_schedules(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(driver_id): Path<i64>,
) -> Result<Json<Vec<DriverSchedule>>, AppError> {
    if !user.is_admin() && user.user_id != driver_id {
        return Err(AppError::AuthorizationError("Drivers may only view their own schedules".to_string()));
    }
    Ok(Json(state.services.queries.driver_schedules(driver_id).await?))
}

/// GET /api/driver/schedules/{id}/bookings
/// Passenger manifest for one departure
async fn schedule_bookings(
    State(state): State<AppState>,
    Path(schedule_id): Path<i64>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.services.queries.schedule_bookings(schedule_id).await?))
}
