use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use vanbook_core::StoreError;
use vanbook_order::BookingError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    ConflictError(String),
    #[error("{0}")]
    InternalServerError(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::RouteNotFound(_)
            | BookingError::ScheduleNotFound(_)
            | BookingError::BookingNotFound(_)
            | BookingError::Store(StoreError::NotFound(_)) => AppError::NotFoundError(message),
            BookingError::SeatUnavailable { .. } | BookingError::InvalidState { .. } => {
                AppError::ConflictError(message)
            }
            BookingError::InvalidRequest(_) => AppError::ValidationError(message),
            BookingError::Store(e) => AppError::Anyhow(anyhow::Error::new(e)),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        BookingError::Store(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanbook_core::BookingStatus;

    fn status_of(err: BookingError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_booking_errors_map_to_http_status() {
        assert_eq!(status_of(BookingError::BookingNotFound(1)), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(BookingError::SeatUnavailable { schedule_id: 1, seat_number: 5 }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(BookingError::InvalidState {
                booking_id: 1,
                status: BookingStatus::Cancelled,
                action: "cancelled"
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(BookingError::InvalidRequest("bad".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(BookingError::Store(StoreError::Conflict("uq".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
