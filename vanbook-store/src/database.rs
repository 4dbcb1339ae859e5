use chrono::NaiveTime;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use vanbook_core::{BookingRules, Repositories};

use crate::app_config::DatabaseConfig;
use crate::booking_repo::PgBookingRepository;
use crate::route_repo::PgRouteRepository;
use crate::schedule_repo::PgScheduleRepository;
use crate::user_repo::PgUserRepository;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    rule_key: String,
    rule_value: Value,
}

impl DbClient {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            routes: Arc::new(PgRouteRepository::new(self.pool.clone())),
            users: Arc::new(PgUserRepository::new(self.pool.clone())),
            schedules: Arc::new(PgScheduleRepository::new(self.pool.clone())),
            bookings: Arc::new(PgBookingRepository::new(self.pool.clone())),
        }
    }

    /// Overlays rows of the `business_rules` table onto the configured rules.
    pub async fn fetch_business_rules(&self, defaults: BookingRules) -> Result<BookingRules, sqlx::Error> {
        let rows: Vec<RuleRow> = sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        let mut rules = defaults;
        for row in rows {
            // Expected format: {"value": <number/string>}
            match row.rule_value.get("value") {
                Some(v) if apply_rule(&mut rules, &row.rule_key, v) => {
                    info!("Business rule {} overridden from database", row.rule_key);
                }
                _ => warn!("Ignoring business rule {} = {}", row.rule_key, row.rule_value),
            }
        }

        Ok(rules)
    }
}

/// Returns false for unknown keys and values of the wrong shape.
fn apply_rule(rules: &mut BookingRules, key: &str, v: &Value) -> bool {
    let as_u32 = |v: &Value| v.as_u64().and_then(|u| u32::try_from(u).ok());
    let as_time = |v: &Value| {
        v.as_str().and_then(|s| {
            NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .ok()
        })
    };

    match key {
        "lock_ttl_seconds" => v.as_u64().map(|u| rules.lock_ttl_seconds = u).is_some(),
        "slot_interval_minutes" => as_u32(v).map(|u| rules.slot_interval_minutes = u).is_some(),
        "schedule_resolve_attempts" => as_u32(v).map(|u| rules.schedule_resolve_attempts = u).is_some(),
        "weekday_start" => as_time(v).map(|t| rules.weekday_window.start = t).is_some(),
        "weekday_end" => as_time(v).map(|t| rules.weekday_window.end = t).is_some(),
        "weekend_start" => as_time(v).map(|t| rules.weekend_window.start = t).is_some(),
        "weekend_end" => as_time(v).map(|t| rules.weekend_window.end = t).is_some(),
        _ => false,
    }
}
