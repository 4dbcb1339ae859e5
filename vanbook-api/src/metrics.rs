use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

/// Counters scraped from `GET /metrics`. Each state owns its registry so test
/// apps do not share counts.
pub struct ApiMetrics {
    registry: Registry,
    reservations: IntCounterVec,
    transitions: IntCounterVec,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reservations = IntCounterVec::new(
            Opts::new("vanbook_reservations_total", "Seat reservation attempts by outcome"),
            &["outcome"],
        )?;
        let transitions = IntCounterVec::new(
            Opts::new("vanbook_booking_transitions_total", "Booking lifecycle transitions"),
            &["transition"],
        )?;

        registry.register(Box::new(reservations.clone()))?;
        registry.register(Box::new(transitions.clone()))?;

        Ok(Self { registry, reservations, transitions })
    }

    /// `reserved`, `seat_unavailable` or `error`.
    pub fn record_reservation(&self, outcome: &str) {
        self.reservations.with_label_values(&[outcome]).inc();
    }

    pub fn record_transition(&self, transition: &str) {
        self.transitions.with_label_values(&[transition]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
