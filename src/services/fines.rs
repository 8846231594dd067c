//! Fine assessment after a return
//!
//! Assessment is pure; dispatch to the ledger is best-effort and runs only
//! after the return has been committed, so a ledger failure never undoes it.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::FinePolicyConfig,
    models::{Fine, FineRequest, FineType, Loan, NewFine, ReturnCondition},
    services::{ports::FineLedger, with_deadline},
};

const DEPENDENCY: &str = "fine ledger";

/// Result of submitting fine requests
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct FineDispatchReport {
    /// Fines the ledger recorded
    pub fines: Vec<Fine>,
    /// Whether an overdue calculation was requested
    pub overdue_calculation_requested: bool,
    /// Failures that did not affect the return itself
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct FineAssessor {
    policy: FinePolicyConfig,
    ledger: Arc<dyn FineLedger>,
    timeout: Duration,
}

impl FineAssessor {
    pub fn new(policy: FinePolicyConfig, ledger: Arc<dyn FineLedger>, timeout: Duration) -> Self {
        Self {
            policy,
            ledger,
            timeout,
        }
    }

    /// Fine requests raised by a committed return
    pub fn assess_return(
        &self,
        loan: &Loan,
        condition: ReturnCondition,
        title: &str,
    ) -> Vec<FineRequest> {
        let mut requests = Vec::new();

        match condition {
            ReturnCondition::Damaged => requests.push(FineRequest::Fixed(NewFine {
                member_id: loan.member_id,
                loan_id: loan.id,
                fine_type: FineType::Damaged,
                amount: self.policy.damaged_amount,
                description: format!("Damaged book: {}", title),
            })),
            ReturnCondition::Lost => requests.push(FineRequest::Fixed(NewFine {
                member_id: loan.member_id,
                loan_id: loan.id,
                fine_type: FineType::Lost,
                amount: self.policy.lost_amount,
                description: format!("Lost book: {}", title),
            })),
            ReturnCondition::Good => {}
        }

        if loan.returned_late() {
            requests.push(FineRequest::OverdueCalculation {
                loan_id: loan.id,
                member_id: loan.member_id,
            });
        }

        requests
    }

    /// Submit requests to the ledger, collecting failures as warnings
    pub async fn dispatch(&self, requests: Vec<FineRequest>) -> FineDispatchReport {
        let mut report = FineDispatchReport::default();

        for request in requests {
            let fine_type = request.fine_type();
            let result = match request {
                FineRequest::Fixed(fine) => {
                    let loan_id = fine.loan_id;
                    with_deadline(self.timeout, DEPENDENCY, self.ledger.create_fine(fine))
                        .await
                        .map(|fine| (loan_id, Some(fine)))
                }
                FineRequest::OverdueCalculation { loan_id, .. } => {
                    report.overdue_calculation_requested = true;
                    with_deadline(
                        self.timeout,
                        DEPENDENCY,
                        self.ledger.calculate_overdue_fine(loan_id),
                    )
                    .await
                    .map(|fine| (loan_id, fine))
                }
            };

            match result {
                Ok((loan_id, Some(fine))) => {
                    tracing::info!(
                        loan_id,
                        fine_id = fine.id,
                        fine_type = %fine.fine_type,
                        amount = %fine.amount,
                        "Fine recorded"
                    );
                    report.fines.push(fine);
                }
                Ok((loan_id, None)) => {
                    tracing::debug!(loan_id, fine_type = %fine_type, "No fine due");
                }
                Err(e) => {
                    tracing::warn!(fine_type = %fine_type, error = %e, "Fine submission failed");
                    report
                        .warnings
                        .push(format!("{} fine could not be recorded: {}", fine_type, e));
                }
            }
        }

        report
    }
}
