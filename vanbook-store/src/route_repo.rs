use async_trait::async_trait;
use sqlx::PgPool;
use vanbook_core::repository::{RouteRepository, StoreResult};
use vanbook_core::Route;

use crate::map_db_error;

pub struct PgRouteRepository {
    pool: PgPool,
}

impl PgRouteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: i64,
    origin_station_id: i64,
    destination_station_id: i64,
    base_price: i32,
    estimated_duration: Option<i32>,
    is_active: bool,
}

impl From<RouteRow> for Route {
    fn from(row: RouteRow) -> Self {
        Route {
            id: row.id,
            origin_station_id: row.origin_station_id,
            destination_station_id: row.destination_station_id,
            base_price: row.base_price,
            estimated_duration: row.estimated_duration,
            is_active: row.is_active,
        }
    }
}

#[async_trait]
impl RouteRepository for PgRouteRepository {
    async fn get_route(&self, id: i64) -> StoreResult<Option<Route>> {
        let row: Option<RouteRow> = sqlx::query_as(
            "SELECT id, origin_station_id, destination_station_id, base_price, estimated_duration, is_active \
             FROM routes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(row.map(Route::from))
    }
}
