//! Business logic services

pub mod access;
pub mod availability;
pub mod fines;
pub mod loans;
pub mod ports;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::{FinePolicyConfig, LoanPolicyConfig},
    error::{AppError, AppResult},
};

use ports::{Clock, CopyInventory, FineLedger, LoanStore, UserDirectory};

/// External collaborators the circulation services depend on
#[derive(Clone)]
pub struct Collaborators {
    pub loans: Arc<dyn LoanStore>,
    pub copies: Arc<dyn CopyInventory>,
    pub fines: Arc<dyn FineLedger>,
    pub users: Arc<dyn UserDirectory>,
    pub clock: Arc<dyn Clock>,
}

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub loans: loans::LoansService,
}

impl Services {
    /// Create all services over the given collaborators
    pub fn new(
        collaborators: Collaborators,
        loan_policy: LoanPolicyConfig,
        fine_policy: FinePolicyConfig,
    ) -> Self {
        Self {
            loans: loans::LoansService::new(collaborators, loan_policy, fine_policy),
        }
    }
}

/// Run a collaborator call under a deadline. An elapsed deadline becomes a
/// retryable `DependencyFailure`.
pub(crate) async fn with_deadline<T, F>(
    deadline: Duration,
    dependency: &'static str,
    call: F,
) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::DependencyFailure(format!(
            "{} did not respond within {}ms",
            dependency,
            deadline.as_millis()
        ))),
    }
}
