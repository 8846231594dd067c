//! Access policy for loan and account operations.
//!
//! Pure decisions over an already-resolved [`Principal`]; looking the
//! principal up is the user directory's job.

use crate::{
    error::{AppError, AppResult},
    models::{AccountTypeSlug, Loan, Principal},
};

/// Operations on an existing loan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanAction {
    View,
    Renew,
    Return,
    DeclareLost,
    AssessFines,
}

/// Operations on a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountAction {
    View,
    Update,
    Delete,
    Create { account_type: AccountTypeSlug },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(String),
}

impl Decision {
    fn deny(reason: impl Into<String>) -> Self {
        Decision::Denied(reason.into())
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn into_result(self) -> AppResult<()> {
        match self {
            Decision::Allowed => Ok(()),
            Decision::Denied(reason) => {
                tracing::debug!(reason = %reason, "Access denied");
                Err(AppError::Authorization(reason))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn authorize_loan(&self, principal: &Principal, loan: &Loan, action: LoanAction) -> Decision {
        if let Some(denied) = Self::inactive(principal) {
            return denied;
        }
        if principal.is_staff() {
            return Decision::Allowed;
        }

        match action {
            LoanAction::View | LoanAction::Renew if loan.member_id == principal.id => {
                Decision::Allowed
            }
            LoanAction::View | LoanAction::Renew => Decision::deny("not your loan"),
            LoanAction::Return | LoanAction::DeclareLost | LoanAction::AssessFines => {
                Decision::deny("staff privileges required")
            }
        }
    }

    /// Only staff lend copies, to any member
    pub fn authorize_checkout(&self, principal: &Principal) -> Decision {
        if let Some(denied) = Self::inactive(principal) {
            return denied;
        }
        if principal.is_staff() {
            Decision::Allowed
        } else {
            Decision::deny("staff privileges required to check out copies")
        }
    }

    /// Loan history of `member_id`: staff or the member themself
    pub fn authorize_history(&self, principal: &Principal, member_id: i32) -> Decision {
        if let Some(denied) = Self::inactive(principal) {
            return denied;
        }
        if principal.is_staff() || principal.id == member_id {
            Decision::Allowed
        } else {
            Decision::deny("not your loan history")
        }
    }

    pub fn authorize_account(
        &self,
        principal: &Principal,
        target_user_id: i32,
        target_account_type: AccountTypeSlug,
        action: AccountAction,
    ) -> Decision {
        if let Some(denied) = Self::inactive(principal) {
            return denied;
        }
        if action == AccountAction::Delete && target_user_id == principal.id {
            return Decision::deny("you cannot delete your own account");
        }

        match action {
            AccountAction::Create { account_type } if account_type.is_staff() => {
                self.require_role(principal, AccountTypeSlug::Admin)
            }
            AccountAction::Create { .. } => {
                self.require_role(principal, AccountTypeSlug::Librarian)
            }
            AccountAction::View | AccountAction::Update if target_user_id == principal.id => {
                Decision::Allowed
            }
            _ if target_account_type.is_staff() => {
                self.require_role(principal, AccountTypeSlug::Admin)
            }
            _ => self.require_role(principal, AccountTypeSlug::Librarian),
        }
    }

    pub fn require_role(&self, principal: &Principal, minimum: AccountTypeSlug) -> Decision {
        if let Some(denied) = Self::inactive(principal) {
            return denied;
        }
        if principal.account_type.tier() >= minimum.tier() {
            Decision::Allowed
        } else {
            Decision::Denied(format!("{} privileges required", minimum))
        }
    }

    fn inactive(principal: &Principal) -> Option<Decision> {
        (!principal.is_active()).then(|| Decision::deny("account is not active"))
    }
}
