//! Book copies repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult, LoanError},
    models::copy::BookCopy,
    services::ports::CopyInventory,
};

#[derive(Clone)]
pub struct CopiesRepository {
    pool: Pool<Postgres>,
}

impl CopiesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn exists(&self, copy_id: i32) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM book_copies WHERE id = $1)")
                .bind(copy_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

fn copy_not_found(copy_id: i32) -> AppError {
    AppError::NotFound(format!("Copy with id {} not found", copy_id))
}

#[async_trait]
impl CopyInventory for CopiesRepository {
    async fn is_available(&self, copy_id: i32) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT borrowable AND NOT on_loan FROM book_copies WHERE id = $1",
        )
        .bind(copy_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| copy_not_found(copy_id))
    }

    /// Single conditional UPDATE, so concurrent reservations serialize on the row
    async fn reserve(&self, copy_id: i32) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE book_copies
            SET on_loan = TRUE, modif_date = NOW()
            WHERE id = $1 AND borrowable AND NOT on_loan
            "#,
        )
        .bind(copy_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(())
        } else if self.exists(copy_id).await? {
            Err(LoanError::CopyUnavailable(copy_id).into())
        } else {
            Err(copy_not_found(copy_id))
        }
    }

    async fn release(&self, copy_id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE book_copies SET on_loan = FALSE, modif_date = NOW() WHERE id = $1",
        )
        .bind(copy_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(copy_not_found(copy_id));
        }
        Ok(())
    }

    async fn describe(&self, copy_id: i32) -> AppResult<BookCopy> {
        sqlx::query_as::<_, BookCopy>(
            r#"
            SELECT c.id, t.title, c.borrowable, c.on_loan
            FROM book_copies c
            JOIN titles t ON c.title_id = t.id
            WHERE c.id = $1
            "#,
        )
        .bind(copy_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| copy_not_found(copy_id))
    }
}
