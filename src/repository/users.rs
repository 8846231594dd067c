//! Users repository: principal and member lookups

use async_trait::async_trait;
use sqlx::{FromRow, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::{AccountTypeSlug, Principal, UserStatus},
    services::ports::UserDirectory,
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PrincipalRow {
    id: i32,
    account_type: String,
    status: Option<i16>,
}

#[async_trait]
impl UserDirectory for UsersRepository {
    async fn principal(&self, user_id: i32) -> AppResult<Principal> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            "SELECT id, account_type, status FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::Authentication("Unknown user".to_string()))?;

        let account_type: AccountTypeSlug =
            row.account_type.parse().map_err(AppError::Internal)?;

        Ok(Principal {
            id: row.id,
            account_type,
            status: row.status.into(),
        })
    }

    async fn member_status(&self, member_id: i32) -> AppResult<UserStatus> {
        let status: Option<Option<i16>> =
            sqlx::query_scalar("SELECT status FROM users WHERE id = $1")
                .bind(member_id)
                .fetch_optional(&self.pool)
                .await?;

        status
            .map(UserStatus::from)
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", member_id)))
    }
}
