//! Loan management service
//!
//! Every state change follows the same shape: load the loan, check access,
//! compute the next state with the pure transitions in `models::loan`, then
//! commit it with a compare-and-set. Losing a race means reloading and
//! re-evaluating, so the loser sees the winner's outcome.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::{FinePolicyConfig, LoanPolicyConfig},
    error::{AppError, AppResult, LoanError},
    models::{
        AccountTypeSlug, Fine, FineRequest, Loan, LoanView, NewLoan, Principal, ReturnCondition,
        UserStatus,
    },
    services::{
        access::{AccessPolicy, LoanAction},
        availability::AvailabilityGate,
        fines::{FineAssessor, FineDispatchReport},
        ports::{Clock, LoanStore, UserDirectory},
        with_deadline, Collaborators,
    },
};

const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Returned loan with the side effects of the return
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnOutcome {
    pub loan: LoanView,
    pub fines: Vec<Fine>,
    pub overdue_calculation_requested: bool,
    /// Steps that failed after the return was committed
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct LoansService {
    store: Arc<dyn LoanStore>,
    users: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
    availability: AvailabilityGate,
    fines: FineAssessor,
    access: AccessPolicy,
    policy: LoanPolicyConfig,
}

impl LoansService {
    pub fn new(
        collaborators: Collaborators,
        policy: LoanPolicyConfig,
        fine_policy: FinePolicyConfig,
    ) -> Self {
        let timeout = policy.dependency_timeout();
        Self {
            store: collaborators.loans,
            users: collaborators.users,
            clock: collaborators.clock,
            availability: AvailabilityGate::new(collaborators.copies, timeout),
            fines: FineAssessor::new(fine_policy, collaborators.fines, timeout),
            access: AccessPolicy::new(),
            policy,
        }
    }

    /// Lend a copy to a member
    pub async fn checkout(&self, actor_id: i32, copy_id: i32, member_id: i32) -> AppResult<Loan> {
        let principal = self.principal(actor_id).await?;
        self.access.authorize_checkout(&principal).into_result()?;

        self.ensure_member_eligible(member_id).await?;
        self.ensure_copy_free(copy_id).await?;
        self.availability.reserve(copy_id).await?;

        let new_loan = NewLoan::new(copy_id, member_id, principal.id, self.clock.now(), &self.policy);
        let insert = self.store.insert(new_loan, self.policy.max_active_loans);
        match self.call("loan store", insert).await {
            Ok(loan) => {
                tracing::info!(
                    loan_id = loan.id,
                    copy_id,
                    member_id,
                    staff_id = principal.id,
                    due_date = %loan.due_date,
                    "Copy checked out"
                );
                Ok(loan)
            }
            Err(e) => {
                // A timed-out insert may still have committed, and CopyUnavailable
                // means another loan holds the copy: keep the reservation in both cases.
                let copy_taken = matches!(e, AppError::Loan(LoanError::CopyUnavailable(_)));
                if !e.is_retryable() && !copy_taken {
                    if let Err(release_err) = self.availability.release(copy_id).await {
                        tracing::error!(
                            copy_id,
                            error = %release_err,
                            "Failed to release copy after aborted checkout"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Close a loan, free its copy and assess fines
    pub async fn return_loan(
        &self,
        actor_id: i32,
        loan_id: i32,
        condition: ReturnCondition,
    ) -> AppResult<ReturnOutcome> {
        let principal = self.principal(actor_id).await?;
        let returned = self
            .transition(&principal, loan_id, LoanAction::Return, |loan, now| {
                loan.close(now, condition)
            })
            .await?;

        tracing::info!(
            loan_id,
            copy_id = returned.copy_id,
            condition = %condition,
            late = returned.returned_late(),
            "Loan returned"
        );

        // The return is committed; nothing below may undo it.
        let mut warnings = Vec::new();
        if let Err(e) = self.availability.release(returned.copy_id).await {
            tracing::warn!(copy_id = returned.copy_id, error = %e, "Failed to release returned copy");
            warnings.push(format!("copy {} could not be released: {}", returned.copy_id, e));
        }

        let report = self.assess_and_dispatch(&returned, condition).await;
        warnings.extend(report.warnings);

        Ok(ReturnOutcome {
            loan: returned.view(self.clock.now()),
            fines: report.fines,
            overdue_calculation_requested: report.overdue_calculation_requested,
            warnings,
        })
    }

    /// Extend a loan's due date
    pub async fn renew(
        &self,
        actor_id: i32,
        loan_id: i32,
        requested_due_date: Option<DateTime<Utc>>,
    ) -> AppResult<Loan> {
        let principal = self.principal(actor_id).await?;
        let renewed = self
            .transition(&principal, loan_id, LoanAction::Renew, |loan, now| {
                loan.renew(now, requested_due_date, &self.policy)
            })
            .await?;

        tracing::info!(
            loan_id,
            due_date = %renewed.due_date,
            renewal_count = renewed.renewal_count,
            "Loan renewed"
        );
        Ok(renewed)
    }

    /// Flag an open loan as lost
    pub async fn declare_lost(&self, actor_id: i32, loan_id: i32) -> AppResult<Loan> {
        let principal = self.principal(actor_id).await?;
        let lost = self
            .transition(&principal, loan_id, LoanAction::DeclareLost, |loan, _| {
                loan.mark_lost()
            })
            .await?;

        tracing::info!(loan_id, copy_id = lost.copy_id, "Loan declared lost");
        Ok(lost)
    }

    /// Client view of a loan, evaluated against the service clock
    pub fn view(&self, loan: &Loan) -> LoanView {
        loan.view(self.clock.now())
    }

    pub async fn get_loan(&self, actor_id: i32, loan_id: i32) -> AppResult<LoanView> {
        let principal = self.principal(actor_id).await?;
        let loan = self.load(loan_id).await?;
        self.access
            .authorize_loan(&principal, &loan, LoanAction::View)
            .into_result()?;
        Ok(self.view(&loan))
    }

    /// All loans of a member, newest first
    pub async fn member_history(&self, actor_id: i32, member_id: i32) -> AppResult<Vec<LoanView>> {
        let principal = self.principal(actor_id).await?;
        self.access
            .authorize_history(&principal, member_id)
            .into_result()?;

        let now = self.clock.now();
        let loans = self
            .call("loan store", self.store.list_for_member(member_id))
            .await?;
        Ok(loans.iter().map(|loan| loan.view(now)).collect())
    }

    pub async fn list_overdue(&self, actor_id: i32) -> AppResult<Vec<LoanView>> {
        let principal = self.principal(actor_id).await?;
        self.access
            .require_role(&principal, AccountTypeSlug::Librarian)
            .into_result()?;

        let now = self.clock.now();
        let loans = self.call("loan store", self.store.list_open()).await?;
        Ok(loans
            .iter()
            .filter(|loan| loan.is_overdue(now))
            .map(|loan| loan.view(now))
            .collect())
    }

    /// Re-run fine assessment for a loan.
    ///
    /// For a returned loan this replays the return assessment from the stored
    /// condition; the ledger ignores fines it already holds. For an open loan
    /// past its due date it requests an overdue calculation.
    pub async fn reassess_fines(&self, actor_id: i32, loan_id: i32) -> AppResult<FineDispatchReport> {
        let principal = self.principal(actor_id).await?;
        let loan = self.load(loan_id).await?;
        self.access
            .authorize_loan(&principal, &loan, LoanAction::AssessFines)
            .into_result()?;

        if loan.is_open() {
            if !loan.is_overdue(self.clock.now()) {
                return Err(LoanError::NotOverdue(loan_id).into());
            }
            let request = FineRequest::OverdueCalculation {
                loan_id,
                member_id: loan.member_id,
            };
            return Ok(self.fines.dispatch(vec![request]).await);
        }

        let condition = loan.return_condition.unwrap_or(ReturnCondition::Good);
        Ok(self.assess_and_dispatch(&loan, condition).await)
    }

    async fn assess_and_dispatch(&self, loan: &Loan, condition: ReturnCondition) -> FineDispatchReport {
        let title = match self.availability.describe(loan.copy_id).await {
            Ok(copy) => copy.title,
            Err(e) => {
                tracing::warn!(copy_id = loan.copy_id, error = %e, "Could not look up copy title");
                format!("copy #{}", loan.copy_id)
            }
        };

        let requests = self.fines.assess_return(loan, condition, &title);
        self.fines.dispatch(requests).await
    }

    async fn transition<F>(
        &self,
        principal: &Principal,
        loan_id: i32,
        action: LoanAction,
        apply: F,
    ) -> AppResult<Loan>
    where
        F: Fn(&Loan, DateTime<Utc>) -> Result<Loan, LoanError>,
    {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let current = self.load(loan_id).await?;
            self.access
                .authorize_loan(principal, &current, action)
                .into_result()?;

            let updated = apply(&current, self.clock.now())?;
            let committed = self
                .call("loan store", self.store.save_if_unchanged(&current, &updated))
                .await?;
            if committed {
                return Ok(updated);
            }
            tracing::debug!(loan_id, attempt, "Loan modified concurrently, re-evaluating");
        }

        Err(AppError::Conflict(format!(
            "Loan {} is being modified concurrently, try again",
            loan_id
        )))
    }

    async fn ensure_member_eligible(&self, member_id: i32) -> AppResult<()> {
        let status = self
            .call("user directory", self.users.member_status(member_id))
            .await?;
        match status {
            UserStatus::Active => {}
            UserStatus::Blocked => {
                return Err(LoanError::MemberIneligible {
                    member_id,
                    reason: "account is blocked".to_string(),
                }
                .into())
            }
            UserStatus::Deleted => {
                return Err(AppError::NotFound(format!("Member {} not found", member_id)))
            }
        }

        let current = self
            .call("loan store", self.store.count_open_for_member(member_id))
            .await?;
        if current >= self.policy.max_active_loans {
            return Err(LoanError::LoanLimitReached {
                current,
                max: self.policy.max_active_loans,
            }
            .into());
        }
        Ok(())
    }

    /// Like `ensure_available`, but the loan store has the last word: a copy
    /// flagged on loan without an open loan is left over from an interrupted
    /// checkout or a failed release, and is put back on the shelf.
    async fn ensure_copy_free(&self, copy_id: i32) -> AppResult<()> {
        match self.availability.ensure_available(copy_id).await {
            Err(AppError::Loan(LoanError::CopyUnavailable(_))) => {}
            other => return other,
        }

        let copy = self.availability.describe(copy_id).await?;
        let holder = self
            .call("loan store", self.store.find_open_for_copy(copy_id))
            .await?;
        if !copy.borrowable || holder.is_some() {
            return Err(LoanError::CopyUnavailable(copy_id).into());
        }

        tracing::warn!(copy_id, "Copy flagged on loan without an open loan, releasing it");
        self.availability.release(copy_id).await
    }

    async fn principal(&self, actor_id: i32) -> AppResult<Principal> {
        self.call("user directory", self.users.principal(actor_id))
            .await
    }

    async fn load(&self, loan_id: i32) -> AppResult<Loan> {
        self.call("loan store", self.store.get(loan_id)).await
    }

    async fn call<T, F>(&self, dependency: &'static str, call: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        with_deadline(self.policy.dependency_timeout(), dependency, call).await
    }
}
