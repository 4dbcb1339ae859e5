use axum::{
    extract::{Path, State},
    middleware,
    routing::post,
    Json, Router,
};
use tracing::info;
use vanbook_core::payment::SlipVerification;
use vanbook_core::Booking;

use crate::error::AppError;
use crate::middleware::admin_auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/payments/{id}/confirm", post(confirm_payment))
        .route("/api/payments/{id}/reject", post(reject_payment))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}

/// POST /api/payments/{id}/confirm
/// Called by the slip-verification service once a transfer slip checks out
async fn confirm_payment(
    State(state): State<AppState>,
    Path(booking_id): Path<i64>,
    Json(slip): Json<SlipVerification>,
) -> Result<Json<Booking>, AppError> {
    if slip.slip_file_name.trim().is_empty() || slip.transaction_ref.trim().is_empty() {
        return Err(AppError::ValidationError("slip_file_name and transaction_ref are required".to_string()));
    }

    let booking = state.services.lifecycle.confirm_payment(booking_id, &slip).await?;
    state.metrics.record_transition("confirmed");
    info!("Booking {} paid with transaction {}", booking_id, slip.transaction_ref);
    Ok(Json(booking))
}

/// POST /api/payments/{id}/reject
async fn reject_payment(
    State(state): State<AppState>,
    Path(booking_id): Path<i64>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.services.lifecycle.reject_payment(booking_id).await?;
    state.metrics.record_transition("rejected");
    Ok(Json(booking))
}
