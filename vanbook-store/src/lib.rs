pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod events;
pub mod redis_repo;
pub mod route_repo;
pub mod schedule_repo;
pub mod user_repo;

pub use database::DbClient;
pub use events::EventProducer;
pub use redis_repo::RedisClient;

use vanbook_core::StoreError;

/// Unique violations become `Conflict` so callers can tell a lost race from
/// a broken database.
pub(crate) fn map_db_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.constraint().unwrap_or("unique constraint").to_string())
        }
        other => StoreError::backend(other),
    }
}
