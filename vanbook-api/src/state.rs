use axum::http::HeaderValue;
use std::sync::Arc;
use vanbook_catalog::ScheduleGenerator;
use vanbook_core::events::EventPublisher;
use vanbook_core::{BookingRules, Repositories, SeatLocker};
use vanbook_order::BookingServices;

use crate::metrics::ApiMetrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub services: BookingServices,
    pub timetable: Arc<ScheduleGenerator>,
    pub metrics: Arc<ApiMetrics>,
    pub auth: AuthConfig,
    pub allowed_origin: HeaderValue,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        locks: Arc<dyn SeatLocker>,
        events: Arc<dyn EventPublisher>,
        rules: BookingRules,
        auth: AuthConfig,
        allowed_origin: HeaderValue,
    ) -> Result<Self, prometheus::Error> {
        Ok(Self {
            timetable: Arc::new(ScheduleGenerator::new(repos.routes.clone(), rules.clone())),
            services: BookingServices::new(repos, locks, events, rules),
            metrics: Arc::new(ApiMetrics::new()?),
            auth,
            allowed_origin,
        })
    }
}
