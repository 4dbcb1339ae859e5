use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::PgPool;
use vanbook_core::repository::{ScheduleRepository, StoreError, StoreResult};
use vanbook_core::{NewSchedule, Schedule, ScheduleStatus};

use crate::map_db_error;

const SCHEDULE_COLUMNS: &str = "id, route_id, driver_id, vehicle_id, departure_time, status, created_at";

pub struct PgScheduleRepository {
    pool: PgPool,
}

impl PgScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: i64,
    route_id: i64,
    driver_id: Option<i64>,
    vehicle_id: Option<i64>,
    departure_time: NaiveDateTime,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ScheduleRow> for Schedule {
    type Error = StoreError;

    fn try_from(row: ScheduleRow) -> Result<Self, Self::Error> {
        Ok(Schedule {
            id: row.id,
            route_id: row.route_id,
            driver_id: row.driver_id,
            vehicle_id: row.vehicle_id,
            departure_time: row.departure_time,
            status: row.status.parse::<ScheduleStatus>().map_err(StoreError::backend)?,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl ScheduleRepository for PgScheduleRepository {
    async fn find_schedule(
        &self,
        route_id: i64,
        departure_time: NaiveDateTime,
    ) -> StoreResult<Option<Schedule>> {
        let row: Option<ScheduleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM schedules WHERE route_id = $1 AND departure_time = $2",
            SCHEDULE_COLUMNS
        ))
        .bind(route_id)
        .bind(departure_time)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(Schedule::try_from).transpose()
    }

    async fn get_schedule(&self, id: i64) -> StoreResult<Option<Schedule>> {
        let row: Option<ScheduleRow> =
            sqlx::query_as(&format!("SELECT {} FROM schedules WHERE id = $1", SCHEDULE_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_db_error)?;

        row.map(Schedule::try_from).transpose()
    }

    async fn create_schedule(&self, schedule: &NewSchedule) -> StoreResult<Schedule> {
        // A concurrent insert for the same departure trips uq_schedules_route_departure.
        let row: ScheduleRow = sqlx::query_as(&format!(
            "INSERT INTO schedules (route_id, departure_time, status) VALUES ($1, $2, $3) RETURNING {}",
            SCHEDULE_COLUMNS
        ))
        .bind(schedule.route_id)
        .bind(schedule.departure_time)
        .bind(ScheduleStatus::Available.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Schedule::try_from(row)
    }

    async fn list_driver_schedules(&self, driver_id: i64) -> StoreResult<Vec<Schedule>> {
        let rows: Vec<ScheduleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM schedules WHERE driver_id = $1 ORDER BY departure_time",
            SCHEDULE_COLUMNS
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(Schedule::try_from).collect()
    }
}
