//! Database operations against the users table.
//!
//! Soft-deleted accounts are filtered explicitly (`deleted_at IS NULL`)
//! in every query rather than through any implicit scope.

use crate::error::{Result, SafetyError};
use crate::models::{UserAccount, UserStatus};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct UsersDb {
    pool: Arc<PgPool>,
}

impl UsersDb {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get a live account by ID
    pub async fn get_account(&self, user_id: Uuid) -> Result<UserAccount> {
        let account = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT id, username, role, status, created_at, deleted_at
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or_else(|| SafetyError::NotFound(format!("User {} not found", user_id)))?;

        Ok(account)
    }

    /// Current denormalized status for a live account
    pub async fn get_status(&self, user_id: Uuid) -> Result<UserStatus> {
        let status: UserStatus = sqlx::query_scalar(
            "SELECT status FROM users WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or_else(|| SafetyError::NotFound(format!("User {} not found", user_id)))?;

        Ok(status)
    }
}
