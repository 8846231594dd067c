//! Loans repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult, LoanError},
    models::loan::{Loan, LoanRow, NewLoan},
    services::ports::LoanStore,
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn to_loan(row: LoanRow) -> AppResult<Loan> {
    Loan::try_from(row).map_err(AppError::Internal)
}

fn to_loans(rows: Vec<LoanRow>) -> AppResult<Vec<Loan>> {
    rows.into_iter().map(to_loan).collect()
}

#[async_trait]
impl LoanStore for LoansRepository {
    /// Get loan by ID
    async fn get(&self, loan_id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = $1")
            .bind(loan_id)
            .fetch_optional(&self.pool)
            .await?
            .map(to_loan)
            .unwrap_or_else(|| Err(LoanError::NotFound(loan_id).into()))
    }

    /// Create a new loan. The member row is locked for the transaction, so
    /// concurrent checkouts for one member count open loans one at a time.
    /// The partial unique index on open loans per copy backs up the copy
    /// reservation.
    async fn insert(&self, loan: NewLoan, max_open_for_member: i64) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let member: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(loan.member_id)
            .fetch_optional(&mut *tx)
            .await?;
        if member.is_none() {
            return Err(AppError::NotFound(format!(
                "Member with id {} not found",
                loan.member_id
            )));
        }

        let current: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE member_id = $1 AND return_date IS NULL",
        )
        .bind(loan.member_id)
        .fetch_one(&mut *tx)
        .await?;
        if current >= max_open_for_member {
            return Err(LoanError::LoanLimitReached {
                current,
                max: max_open_for_member,
            }
            .into());
        }

        let result = sqlx::query_as::<_, LoanRow>(
            r#"
            INSERT INTO loans (copy_id, member_id, staff_id, checkout_date, due_date,
                               renewal_count, declared_lost)
            VALUES ($1, $2, $3, $4, $5, 0, FALSE)
            RETURNING *
            "#,
        )
        .bind(loan.copy_id)
        .bind(loan.member_id)
        .bind(loan.staff_id)
        .bind(loan.checkout_date)
        .bind(loan.due_date)
        .fetch_one(&mut *tx)
        .await;

        let row = match result {
            Ok(row) => row,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(LoanError::CopyUnavailable(loan.copy_id).into())
            }
            Err(e) => return Err(AppError::Database(e)),
        };

        tx.commit().await?;
        to_loan(row)
    }

    /// Conditional update: only applies if the row still matches `previous`
    async fn save_if_unchanged(&self, previous: &Loan, updated: &Loan) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET due_date = $2,
                return_date = $3,
                return_condition = $4,
                renewal_count = $5,
                last_renewed_at = $6,
                declared_lost = $7
            WHERE id = $1
              AND due_date = $8
              AND return_date IS NOT DISTINCT FROM $9
              AND renewal_count = $10
              AND declared_lost = $11
            "#,
        )
        .bind(updated.id)
        .bind(updated.due_date)
        .bind(updated.return_date)
        .bind(updated.return_condition.map(|c| c.as_str()))
        .bind(updated.renewal_count)
        .bind(updated.last_renewed_at)
        .bind(updated.declared_lost)
        .bind(previous.due_date)
        .bind(previous.return_date)
        .bind(previous.renewal_count)
        .bind(previous.declared_lost)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Get loans for a member
    async fn list_for_member(&self, member_id: i32) -> AppResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, LoanRow>(
            "SELECT * FROM loans WHERE member_id = $1 ORDER BY checkout_date DESC, id DESC",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        to_loans(rows)
    }

    async fn list_open(&self) -> AppResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, LoanRow>(
            "SELECT * FROM loans WHERE return_date IS NULL ORDER BY due_date",
        )
        .fetch_all(&self.pool)
        .await?;

        to_loans(rows)
    }

    /// Count a member's open loans
    async fn count_open_for_member(&self, member_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE member_id = $1 AND return_date IS NULL",
        )
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn find_open_for_copy(&self, copy_id: i32) -> AppResult<Option<Loan>> {
        sqlx::query_as::<_, LoanRow>(
            "SELECT * FROM loans WHERE copy_id = $1 AND return_date IS NULL",
        )
        .bind(copy_id)
        .fetch_optional(&self.pool)
        .await?
        .map(to_loan)
        .transpose()
    }
}
