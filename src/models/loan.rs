//! Loan model and lifecycle transitions
//!
//! Transitions are pure: each takes the current snapshot and returns the next
//! one or the rule that forbids it. Persisting the result is the caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::config::LoanPolicyConfig;
use crate::error::LoanError;

/// Loan status. Never stored: see [`Loan::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Returned,
    Overdue,
    Lost,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Returned => "returned",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Lost => "lost",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Condition of the copy when it comes back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReturnCondition {
    Good,
    Damaged,
    Lost,
}

impl ReturnCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnCondition::Good => "good",
            ReturnCondition::Damaged => "damaged",
            ReturnCondition::Lost => "lost",
        }
    }
}

impl std::fmt::Display for ReturnCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReturnCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "good" => Ok(ReturnCondition::Good),
            "damaged" => Ok(ReturnCondition::Damaged),
            "lost" => Ok(ReturnCondition::Lost),
            _ => Err(format!("Invalid return condition: {}", s)),
        }
    }
}

/// A member borrowing one copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: i32,
    pub copy_id: i32,
    pub member_id: i32,
    /// Staff member who checked the copy out
    pub staff_id: i32,
    pub checkout_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub return_condition: Option<ReturnCondition>,
    pub renewal_count: i16,
    pub last_renewed_at: Option<DateTime<Utc>>,
    pub declared_lost: bool,
}

/// Loan to be inserted by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoan {
    pub copy_id: i32,
    pub member_id: i32,
    pub staff_id: i32,
    pub checkout_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

impl NewLoan {
    pub fn new(
        copy_id: i32,
        member_id: i32,
        staff_id: i32,
        now: DateTime<Utc>,
        policy: &LoanPolicyConfig,
    ) -> Self {
        Self {
            copy_id,
            member_id,
            staff_id,
            checkout_date: now,
            due_date: now + policy.loan_period(),
        }
    }
}

/// `true` while the loan is open and `as_of` is past its due date
pub fn is_overdue(loan: &Loan, as_of: DateTime<Utc>) -> bool {
    loan.return_date.is_none() && as_of > loan.due_date
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }

    pub fn is_overdue(&self, as_of: DateTime<Utc>) -> bool {
        is_overdue(self, as_of)
    }

    pub fn status(&self, as_of: DateTime<Utc>) -> LoanStatus {
        if self.return_date.is_some() {
            LoanStatus::Returned
        } else if self.declared_lost {
            LoanStatus::Lost
        } else if self.is_overdue(as_of) {
            LoanStatus::Overdue
        } else {
            LoanStatus::Active
        }
    }

    /// Whether the recorded return came after the due date
    pub fn returned_late(&self) -> bool {
        matches!(self.return_date, Some(returned) if returned > self.due_date)
    }

    /// Close the loan
    pub fn close(
        &self,
        returned_at: DateTime<Utc>,
        condition: ReturnCondition,
    ) -> Result<Loan, LoanError> {
        if self.return_date.is_some() {
            return Err(LoanError::AlreadyReturned(self.id));
        }

        Ok(Loan {
            return_date: Some(returned_at),
            return_condition: Some(condition),
            ..self.clone()
        })
    }

    /// Extend the due date
    pub fn renew(
        &self,
        now: DateTime<Utc>,
        requested_due_date: Option<DateTime<Utc>>,
        policy: &LoanPolicyConfig,
    ) -> Result<Loan, LoanError> {
        let status = self.status(now);
        match status {
            LoanStatus::Active => {}
            LoanStatus::Overdue if self.within_renewal_grace(now, policy) => {}
            _ => {
                return Err(LoanError::NotActive {
                    loan_id: self.id,
                    status,
                })
            }
        }

        if self.renewal_count >= policy.max_renewals {
            return Err(LoanError::RenewalLimitExceeded {
                count: self.renewal_count,
                max: policy.max_renewals,
            });
        }

        let due_date = match requested_due_date {
            Some(requested) if requested <= self.due_date => {
                return Err(LoanError::InvalidDueDate {
                    current: self.due_date.to_rfc3339(),
                })
            }
            Some(requested) => requested,
            None => self.due_date.max(now) + policy.loan_period(),
        };

        Ok(Loan {
            due_date,
            renewal_count: self.renewal_count + 1,
            last_renewed_at: Some(now),
            ..self.clone()
        })
    }

    /// Flag an open loan as lost
    pub fn mark_lost(&self) -> Result<Loan, LoanError> {
        if self.return_date.is_some() {
            return Err(LoanError::AlreadyReturned(self.id));
        }
        if self.declared_lost {
            return Err(LoanError::NotActive {
                loan_id: self.id,
                status: LoanStatus::Lost,
            });
        }

        Ok(Loan {
            declared_lost: true,
            ..self.clone()
        })
    }

    fn within_renewal_grace(&self, now: DateTime<Utc>, policy: &LoanPolicyConfig) -> bool {
        now <= self.due_date + chrono::Duration::days(policy.renewal_grace_days)
    }

    pub fn view(&self, as_of: DateTime<Utc>) -> LoanView {
        LoanView {
            id: self.id,
            copy_id: self.copy_id,
            member_id: self.member_id,
            staff_id: self.staff_id,
            checkout_date: self.checkout_date,
            due_date: self.due_date,
            return_date: self.return_date,
            return_condition: self.return_condition,
            renewal_count: self.renewal_count,
            status: self.status(as_of),
            is_overdue: self.is_overdue(as_of),
        }
    }
}

/// Loan as shown to clients, with its status evaluated at read time
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanView {
    pub id: i32,
    pub copy_id: i32,
    pub member_id: i32,
    pub staff_id: i32,
    pub checkout_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub return_condition: Option<ReturnCondition>,
    pub renewal_count: i16,
    pub status: LoanStatus,
    pub is_overdue: bool,
}

/// Internal row structure for database queries
#[derive(Debug, Clone, FromRow)]
pub struct LoanRow {
    id: i32,
    copy_id: i32,
    member_id: i32,
    staff_id: i32,
    checkout_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    return_date: Option<DateTime<Utc>>,
    return_condition: Option<String>,
    renewal_count: i16,
    last_renewed_at: Option<DateTime<Utc>>,
    declared_lost: bool,
}

impl TryFrom<LoanRow> for Loan {
    type Error = String;

    fn try_from(row: LoanRow) -> Result<Self, Self::Error> {
        let return_condition = row
            .return_condition
            .as_deref()
            .map(str::parse)
            .transpose()?;

        Ok(Loan {
            id: row.id,
            copy_id: row.copy_id,
            member_id: row.member_id,
            staff_id: row.staff_id,
            checkout_date: row.checkout_date,
            due_date: row.due_date,
            return_date: row.return_date,
            return_condition,
            renewal_count: row.renewal_count,
            last_renewed_at: row.last_renewed_at,
            declared_lost: row.declared_lost,
        })
    }
}
