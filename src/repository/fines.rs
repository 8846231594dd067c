//! Fines ledger repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::fine::{Fine, FineRow, NewFine},
    services::ports::FineLedger,
};

#[derive(Clone)]
pub struct FinesRepository {
    pool: Pool<Postgres>,
}

impl FinesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn to_fine(row: FineRow) -> AppResult<Fine> {
    Fine::try_from(row).map_err(AppError::Internal)
}

#[async_trait]
impl FineLedger for FinesRepository {
    async fn create_fine(&self, fine: NewFine) -> AppResult<Fine> {
        let inserted = sqlx::query_as::<_, FineRow>(
            r#"
            INSERT INTO fines (member_id, loan_id, fine_type, amount, description, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (loan_id, fine_type) WHERE fine_type IN ('damaged', 'lost') DO NOTHING
            RETURNING *
            "#,
        )
        .bind(fine.member_id)
        .bind(fine.loan_id)
        .bind(fine.fine_type.as_str())
        .bind(fine.amount)
        .bind(&fine.description)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return to_fine(row);
        }

        // Already recorded by an earlier attempt
        let existing = sqlx::query_as::<_, FineRow>(
            "SELECT * FROM fines WHERE loan_id = $1 AND fine_type = $2",
        )
        .bind(fine.loan_id)
        .bind(fine.fine_type.as_str())
        .fetch_one(&self.pool)
        .await?;
        to_fine(existing)
    }

    /// Queue the loan for the overdue calculator. The rate schedule lives with
    /// the calculator, so no fine is known at this point.
    async fn calculate_overdue_fine(&self, loan_id: i32) -> AppResult<Option<Fine>> {
        sqlx::query(
            r#"
            INSERT INTO overdue_fine_requests (loan_id, requested_at)
            VALUES ($1, NOW())
            "#,
        )
        .bind(loan_id)
        .execute(&self.pool)
        .await?;

        Ok(None)
    }
}
