//! Data models for Elidune circulation

pub mod copy;
pub mod fine;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use copy::BookCopy;
pub use fine::{Fine, FineRequest, FineType, NewFine};
pub use loan::{Loan, LoanStatus, LoanView, NewLoan, ReturnCondition};
pub use user::{AccountTypeSlug, Principal, UserClaims, UserStatus};
