//! Fine model and fine requests

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FineType {
    Overdue,
    Damaged,
    Lost,
}

impl FineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FineType::Overdue => "overdue",
            FineType::Damaged => "damaged",
            FineType::Lost => "lost",
        }
    }
}

impl std::fmt::Display for FineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "overdue" => Ok(FineType::Overdue),
            "damaged" => Ok(FineType::Damaged),
            "lost" => Ok(FineType::Lost),
            _ => Err(format!("Invalid fine type: {}", s)),
        }
    }
}

/// Fine recorded in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Fine {
    pub id: i32,
    pub member_id: i32,
    pub loan_id: Option<i32>,
    pub fine_type: FineType,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Fixed-amount fine to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFine {
    pub member_id: i32,
    pub loan_id: i32,
    pub fine_type: FineType,
    pub amount: Decimal,
    pub description: String,
}

/// What the fine assessor asks the ledger to do after a return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FineRequest {
    Fixed(NewFine),
    /// Run the external overdue calculation for this loan
    OverdueCalculation { loan_id: i32, member_id: i32 },
}

impl FineRequest {
    pub fn fine_type(&self) -> FineType {
        match self {
            FineRequest::Fixed(fine) => fine.fine_type,
            FineRequest::OverdueCalculation { .. } => FineType::Overdue,
        }
    }
}

/// Internal row structure for database queries
#[derive(Debug, Clone, FromRow)]
pub struct FineRow {
    id: i32,
    member_id: i32,
    loan_id: Option<i32>,
    fine_type: String,
    amount: Decimal,
    description: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<FineRow> for Fine {
    type Error = String;

    fn try_from(row: FineRow) -> Result<Self, Self::Error> {
        Ok(Fine {
            id: row.id,
            member_id: row.member_id,
            loan_id: row.loan_id,
            fine_type: row.fine_type.parse()?,
            amount: row.amount,
            description: row.description,
            created_at: row.created_at,
        })
    }
}
