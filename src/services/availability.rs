//! Copy availability gate

use std::sync::Arc;
use std::time::Duration;

use crate::{
    error::{AppResult, LoanError},
    models::BookCopy,
    services::{ports::CopyInventory, with_deadline},
};

const DEPENDENCY: &str = "copy inventory";

#[derive(Clone)]
pub struct AvailabilityGate {
    inventory: Arc<dyn CopyInventory>,
    timeout: Duration,
}

impl AvailabilityGate {
    pub fn new(inventory: Arc<dyn CopyInventory>, timeout: Duration) -> Self {
        Self { inventory, timeout }
    }

    /// Fails with `CopyUnavailable` unless the copy can be lent right now
    pub async fn ensure_available(&self, copy_id: i32) -> AppResult<()> {
        let available =
            with_deadline(self.timeout, DEPENDENCY, self.inventory.is_available(copy_id)).await?;
        if available {
            Ok(())
        } else {
            Err(LoanError::CopyUnavailable(copy_id).into())
        }
    }

    /// Take the copy off the shelf. Of two concurrent calls at most one wins.
    pub async fn reserve(&self, copy_id: i32) -> AppResult<()> {
        with_deadline(self.timeout, DEPENDENCY, self.inventory.reserve(copy_id)).await
    }

    pub async fn release(&self, copy_id: i32) -> AppResult<()> {
        with_deadline(self.timeout, DEPENDENCY, self.inventory.release(copy_id)).await
    }

    pub async fn describe(&self, copy_id: i32) -> AppResult<BookCopy> {
        with_deadline(self.timeout, DEPENDENCY, self.inventory.describe(copy_id)).await
    }
}
