//! Book copy (physical item) as seen by circulation

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A physical copy of a title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookCopy {
    pub id: i32,
    pub title: String,
    /// Whether this copy may leave the library at all
    pub borrowable: bool,
    pub on_loan: bool,
}

impl BookCopy {
    pub fn is_available(&self) -> bool {
        self.borrowable && !self.on_loan
    }
}
