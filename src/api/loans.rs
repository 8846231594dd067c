//! Loan management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::loan::{LoanView, ReturnCondition},
    services::{fines::FineDispatchReport, loans::ReturnOutcome},
};

use super::{validate_request, AuthenticatedUser};

/// Checkout request
#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateLoanRequest {
    /// Copy to lend
    #[validate(range(min = 1, message = "copy_id must be positive"))]
    pub copy_id: i32,
    /// Borrowing member
    #[validate(range(min = 1, message = "member_id must be positive"))]
    pub member_id: i32,
}

/// Return request
#[derive(Deserialize, ToSchema)]
pub struct ReturnLoanRequest {
    /// Condition of the returned copy (defaults to "good")
    pub condition: Option<ReturnCondition>,
}

/// Renewal request
#[derive(Deserialize, ToSchema)]
pub struct RenewLoanRequest {
    /// New due date; omitted means one standard loan period
    pub due_date: Option<DateTime<Utc>>,
}

/// Create a new loan (check out a copy)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoanRequest,
    responses(
        (status = 201, description = "Loan created", body = LoanView),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Staff privileges required"),
        (status = 404, description = "Member or copy not found"),
        (status = 409, description = "Copy unavailable, member blocked or max loans reached")
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateLoanRequest>,
) -> AppResult<(StatusCode, Json<LoanView>)> {
    validate_request(&request)?;

    let loan = state
        .services
        .loans
        .checkout(claims.user_id, request.copy_id, request.member_id)
        .await?;

    Ok((StatusCode::CREATED, Json(state.services.loans.view(&loan))))
}

/// Get a loan
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanView),
        (status = 403, description = "Not your loan"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<LoanView>> {
    let loan = state.services.loans.get_loan(claims.user_id, loan_id).await?;
    Ok(Json(loan))
}

/// Return a borrowed copy
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = ReturnLoanRequest,
    responses(
        (status = 200, description = "Copy returned", body = ReturnOutcome),
        (status = 403, description = "Staff privileges required"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    Json(request): Json<ReturnLoanRequest>,
) -> AppResult<Json<ReturnOutcome>> {
    let condition = request.condition.unwrap_or(ReturnCondition::Good);
    let outcome = state
        .services
        .loans
        .return_loan(claims.user_id, loan_id, condition)
        .await?;

    Ok(Json(outcome))
}

/// Renew a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/renew",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = RenewLoanRequest,
    responses(
        (status = 200, description = "Loan renewed", body = LoanView),
        (status = 400, description = "Due date does not advance"),
        (status = 403, description = "Not your loan"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Max renewals reached, overdue or already returned")
    )
)]
pub async fn renew_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    Json(request): Json<RenewLoanRequest>,
) -> AppResult<Json<LoanView>> {
    let loan = state
        .services
        .loans
        .renew(claims.user_id, loan_id, request.due_date)
        .await?;

    Ok(Json(state.services.loans.view(&loan)))
}

/// Declare a borrowed copy lost
#[utoipa::path(
    post,
    path = "/loans/{id}/lost",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan marked lost", body = LoanView),
        (status = 403, description = "Staff privileges required"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned or already lost")
    )
)]
pub async fn declare_lost(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<LoanView>> {
    let loan = state
        .services
        .loans
        .declare_lost(claims.user_id, loan_id)
        .await?;

    Ok(Json(state.services.loans.view(&loan)))
}

/// Retry fine assessment for a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/fines/reassess",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Fines submitted", body = FineDispatchReport),
        (status = 403, description = "Staff privileges required"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Open loan that is not overdue")
    )
)]
pub async fn reassess_fines(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<FineDispatchReport>> {
    let report = state
        .services
        .loans
        .reassess_fines(claims.user_id, loan_id)
        .await?;

    Ok(Json(report))
}

/// List overdue loans
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Open loans past their due date", body = Vec<LoanView>),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn list_overdue(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanView>>> {
    let loans = state.services.loans.list_overdue(claims.user_id).await?;
    Ok(Json(loans))
}

/// Get loan history for a specific user
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's loans, newest first", body = Vec<LoanView>),
        (status = 403, description = "Not your loan history")
    )
)]
pub async fn get_user_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<LoanView>>> {
    let loans = state
        .services
        .loans
        .member_history(claims.user_id, user_id)
        .await?;
    Ok(Json(loans))
}
