//! Error types for the Elidune circulation server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::loan::LoanStatus;

/// Application error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchData = 5,
    ItemNotAvailable = 7,
    MaxBorrowsReached = 11,
    BadValue = 18,
    LoanAlreadyReturned = 22,
    LoanNotActive = 23,
    MaxRenewsReached = 24,
    BorrowerBlocked = 25,
    DependencyFailure = 26,
}

/// Broad category of an error, independent of the concrete variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Forbidden,
    Validation,
    DependencyFailure,
    Unauthorized,
    Internal,
}

/// Loan lifecycle rule violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoanError {
    #[error("Loan with id {0} not found")]
    NotFound(i32),

    #[error("Loan {0} has already been returned")]
    AlreadyReturned(i32),

    #[error("Loan {loan_id} is not active (status: {status})")]
    NotActive { loan_id: i32, status: LoanStatus },

    #[error("Copy {0} is not available for loan")]
    CopyUnavailable(i32),

    #[error("Requested due date must be after the current due date ({current})")]
    InvalidDueDate { current: String },

    #[error("Maximum renewals reached ({count}/{max})")]
    RenewalLimitExceeded { count: i16, max: i16 },

    #[error("Member {member_id} cannot borrow: {reason}")]
    MemberIneligible { member_id: i32, reason: String },

    #[error("Maximum loans reached ({current}/{max})")]
    LoanLimitReached { current: i64, max: i64 },

    #[error("Loan {0} is not overdue")]
    NotOverdue(i32),
}

impl LoanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoanError::NotFound(_) => ErrorKind::NotFound,
            LoanError::InvalidDueDate { .. } => ErrorKind::Validation,
            LoanError::AlreadyReturned(_)
            | LoanError::NotActive { .. }
            | LoanError::CopyUnavailable(_)
            | LoanError::RenewalLimitExceeded { .. }
            | LoanError::MemberIneligible { .. }
            | LoanError::LoanLimitReached { .. }
            | LoanError::NotOverdue(_) => ErrorKind::Conflict,
        }
    }

    fn code(&self) -> ErrorCode {
        match self {
            LoanError::NotFound(_) => ErrorCode::NoSuchData,
            LoanError::AlreadyReturned(_) => ErrorCode::LoanAlreadyReturned,
            LoanError::NotActive { .. } | LoanError::NotOverdue(_) => ErrorCode::LoanNotActive,
            LoanError::CopyUnavailable(_) => ErrorCode::ItemNotAvailable,
            LoanError::InvalidDueDate { .. } => ErrorCode::BadValue,
            LoanError::RenewalLimitExceeded { .. } => ErrorCode::MaxRenewsReached,
            LoanError::MemberIneligible { .. } => ErrorCode::BorrowerBlocked,
            LoanError::LoanLimitReached { .. } => ErrorCode::MaxBorrowsReached,
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Dependency failure: {0}")]
    DependencyFailure(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Loan(#[from] LoanError),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Authentication(_) => ErrorKind::Unauthorized,
            AppError::Authorization(_) => ErrorKind::Forbidden,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::DependencyFailure(_) => ErrorKind::DependencyFailure,
            AppError::Database(_) | AppError::Internal(_) => ErrorKind::Internal,
            AppError::Loan(e) => e.kind(),
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::DependencyFailure(_))
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchData, msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Failure, msg.clone())
            }
            AppError::DependencyFailure(msg) => {
                tracing::warn!("Dependency failure: {}", msg);
                (StatusCode::BAD_GATEWAY, ErrorCode::DependencyFailure, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
            AppError::Loan(e) => {
                let status = match e.kind() {
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Validation => StatusCode::BAD_REQUEST,
                    _ => StatusCode::CONFLICT,
                };
                (status, e.code(), e.to_string())
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
