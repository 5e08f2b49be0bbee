//! User repository.

use anyhow::Result;
use sqlx::PgPool;

use crate::models::UserRow;

/// Repository for `users`.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Looks a user up by exchange account.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_by_account(&self, account: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, account FROM users WHERE account = $1")
            .bind(account)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// Gets a user by ID.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, account FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }
}
