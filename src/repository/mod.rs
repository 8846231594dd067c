//! Repository layer for database operations
//!
//! Each repository implements one of the collaborator ports over PostgreSQL.

pub mod copies;
pub mod fines;
pub mod loans;
pub mod users;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::services::{ports::SystemClock, Collaborators};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub loans: loans::LoansRepository,
    pub copies: copies::CopiesRepository,
    pub fines: fines::FinesRepository,
    pub users: users::UsersRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            loans: loans::LoansRepository::new(pool.clone()),
            copies: copies::CopiesRepository::new(pool.clone()),
            fines: fines::FinesRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            pool,
        }
    }

    /// Wire the repositories as the services' collaborators
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            loans: Arc::new(self.loans.clone()),
            copies: Arc::new(self.copies.clone()),
            fines: Arc::new(self.fines.clone()),
            users: Arc::new(self.users.clone()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Check database connectivity
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
