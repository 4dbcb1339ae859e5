use async_trait::async_trait;
use sqlx::PgPool;
use vanbook_core::repository::{StoreError, StoreResult, UserRepository};
use vanbook_core::{Role, User};
use vanbook_shared::Masked;

use crate::map_db_error;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    full_name: Option<String>,
    email: Option<String>,
    phone_number: Option<String>,
    role: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            email: row.email.map(Masked::new),
            phone_number: row.phone_number.map(Masked::new),
            role: row.role.parse::<Role>().map_err(StoreError::backend)?,
        })
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, full_name, email, phone_number, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(User::try_from).transpose()
    }
}
