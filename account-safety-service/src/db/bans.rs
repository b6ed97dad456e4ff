//! Read-side database operations for the ban ledger.
//!
//! Every "currently banned" predicate checks expiry lazily:
//! `expires_at IS NULL OR expires_at > NOW()`. An expired ban may still
//! carry `is_active = true` until a sync pass clears it, but it never
//! counts here. Writes that must move users.status in lockstep live in
//! the ban service, inside a transaction.

use crate::error::{Result, SafetyError};
use crate::models::UserBan;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct BansDb {
    pool: Arc<PgPool>,
}

impl BansDb {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get ban by ID
    pub async fn get_ban(&self, ban_id: Uuid) -> Result<UserBan> {
        let ban = sqlx::query_as::<_, UserBan>(
            r#"
            SELECT id, user_id, ip_address, ip_ban, reason, admin_notes, banned_by,
                   banned_at, expires_at, is_active, is_irrevocable, appeal_url_token,
                   appeal_url_token_rotated_at, appeal_url_token_expires_at, created_at
            FROM user_bans
            WHERE id = $1
            "#,
        )
        .bind(ban_id)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or_else(|| SafetyError::NotFound(format!("Ban {} not found", ban_id)))?;

        Ok(ban)
    }

    /// Latest active, non-expired ban for a user, if any
    pub async fn get_active_ban(&self, user_id: Uuid) -> Result<Option<UserBan>> {
        let ban = sqlx::query_as::<_, UserBan>(
            r#"
            SELECT id, user_id, ip_address, ip_ban, reason, admin_notes, banned_by,
                   banned_at, expires_at, is_active, is_irrevocable, appeal_url_token,
                   appeal_url_token_rotated_at, appeal_url_token_expires_at, created_at
            FROM user_bans
            WHERE user_id = $1
              AND is_active
              AND (expires_at IS NULL OR expires_at > NOW())
            ORDER BY banned_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(ban)
    }

    /// Whether the user is currently banned (simple boolean check)
    pub async fn is_user_banned(&self, user_id: Uuid) -> Result<bool> {
        let is_banned: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM user_bans
                WHERE user_id = $1
                  AND is_active
                  AND (expires_at IS NULL OR expires_at > NOW())
            )
            "#,
        )
        .bind(user_id)
        .fetch_one(&*self.pool)
        .await?;

        Ok(is_banned)
    }

    /// Whether an IP address is currently blocked
    pub async fn is_ip_banned(&self, ip_address: &str) -> Result<bool> {
        let is_banned: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM user_bans
                WHERE ip_address = $1
                  AND ip_ban
                  AND is_active
                  AND (expires_at IS NULL OR expires_at > NOW())
            )
            "#,
        )
        .bind(ip_address)
        .fetch_one(&*self.pool)
        .await?;

        Ok(is_banned)
    }

    /// Look up a ban by the hash of its appeal URL token. Misses and
    /// expired tokens are indistinguishable to the caller.
    pub async fn find_by_appeal_url_token_hash(&self, token_hash: &str) -> Result<Option<UserBan>> {
        let ban = sqlx::query_as::<_, UserBan>(
            r#"
            SELECT id, user_id, ip_address, ip_ban, reason, admin_notes, banned_by,
                   banned_at, expires_at, is_active, is_irrevocable, appeal_url_token,
                   appeal_url_token_rotated_at, appeal_url_token_expires_at, created_at
            FROM user_bans
            WHERE appeal_url_token = $1
              AND appeal_url_token_expires_at > NOW()
              AND is_active
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(ban)
    }

    /// Ban history for a user, newest first
    pub async fn list_user_bans(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserBan>> {
        let bans = sqlx::query_as::<_, UserBan>(
            r#"
            SELECT id, user_id, ip_address, ip_ban, reason, admin_notes, banned_by,
                   banned_at, expires_at, is_active, is_irrevocable, appeal_url_token,
                   appeal_url_token_rotated_at, appeal_url_token_expires_at, created_at
            FROM user_bans
            WHERE user_id = $1
            ORDER BY banned_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await?;

        Ok(bans)
    }
}
