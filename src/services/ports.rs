//! Collaborator interfaces used by the circulation services.
//!
//! Each port returns `AppResult`; the services never rely on panics or
//! sentinel values to detect failure. PostgreSQL implementations live in
//! [`crate::repository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{BookCopy, Fine, Loan, NewFine, NewLoan, Principal, UserStatus},
};

/// Physical copy inventory
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CopyInventory: Send + Sync {
    /// Whether the copy exists, is borrowable and is not on loan
    async fn is_available(&self, copy_id: i32) -> AppResult<bool>;

    /// Atomically mark the copy as on loan.
    ///
    /// Fails with `LoanError::CopyUnavailable` if the copy is already on loan
    /// or not borrowable, and with `AppError::NotFound` if it does not exist.
    async fn reserve(&self, copy_id: i32) -> AppResult<()>;

    /// Put the copy back on the shelf
    async fn release(&self, copy_id: i32) -> AppResult<()>;

    async fn describe(&self, copy_id: i32) -> AppResult<BookCopy>;
}

/// Loan persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Fails with `LoanError::NotFound` for an unknown id
    async fn get(&self, loan_id: i32) -> AppResult<Loan>;

    /// Insert an open loan. Counting the member's open loans and inserting
    /// happen as one unit: fails with `LoanError::LoanLimitReached` when the
    /// member already holds `max_open_for_member` open loans, and with
    /// `LoanError::CopyUnavailable` when the copy already has an open loan.
    async fn insert(&self, loan: NewLoan, max_open_for_member: i64) -> AppResult<Loan>;

    /// Write `updated` only if the stored loan still equals `previous`.
    /// Returns `false` when another writer got there first.
    async fn save_if_unchanged(&self, previous: &Loan, updated: &Loan) -> AppResult<bool>;

    /// All loans of a member, newest first
    async fn list_for_member(&self, member_id: i32) -> AppResult<Vec<Loan>>;

    /// Loans without a return date
    async fn list_open(&self) -> AppResult<Vec<Loan>>;

    async fn count_open_for_member(&self, member_id: i32) -> AppResult<i64>;

    /// The open loan holding this copy, if any
    async fn find_open_for_copy(&self, copy_id: i32) -> AppResult<Option<Loan>>;
}

/// External fine ledger
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FineLedger: Send + Sync {
    /// Record a fixed fine. Idempotent per `(loan_id, fine_type)`: a repeated
    /// request returns the fine already on record.
    async fn create_fine(&self, fine: NewFine) -> AppResult<Fine>;

    /// Ask the overdue calculator to assess this loan. Returns the fine it
    /// produced, if the computed amount was not zero.
    async fn calculate_overdue_fine(&self, loan_id: i32) -> AppResult<Option<Fine>>;
}

/// User and role lookups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve the acting user. Unknown ids fail with `AppError::Authentication`.
    async fn principal(&self, user_id: i32) -> AppResult<Principal>;

    /// Fails with `AppError::NotFound` for an unknown member
    async fn member_status(&self, member_id: i32) -> AppResult<UserStatus>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
