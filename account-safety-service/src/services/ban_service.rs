//! Ban ledger operations.
//!
//! Every mutation that can change whether a user counts as banned runs
//! in one transaction with the per-user status sync, so users.status is
//! never observable out of step with the ledger.

use crate::config::Config;
use crate::db::BansDb;
use crate::error::{Result, SafetyError};
use crate::models::{CreateBanInput, UserBan};
use crate::security::tokens;
use crate::services::status_sync;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub struct BanService {
    pool: Arc<PgPool>,
    bans: BansDb,
    config: Arc<Config>,
}

impl BanService {
    pub fn new(pool: Arc<PgPool>, config: Arc<Config>) -> Self {
        let bans = BansDb::new(pool.clone());
        Self { pool, bans, config }
    }

    /// Create a ban and flip the subject's status in the same transaction
    pub async fn create_ban(&self, input: CreateBanInput) -> Result<UserBan> {
        input.validate()?;
        input
            .check_invariants()
            .map_err(SafetyError::Validation)?;

        let mut tx = self.pool.begin().await?;

        let ban = sqlx::query_as::<_, UserBan>(
            r#"
            INSERT INTO user_bans (
                user_id, ip_address, ip_ban, reason, admin_notes, banned_by,
                banned_at, expires_at, is_active, is_irrevocable, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), $7, TRUE, $8, NOW(), NOW())
            RETURNING id, user_id, ip_address, ip_ban, reason, admin_notes, banned_by,
                      banned_at, expires_at, is_active, is_irrevocable, appeal_url_token,
                      appeal_url_token_rotated_at, appeal_url_token_expires_at, created_at
            "#,
        )
        .bind(input.user_id)
        .bind(&input.ip_address)
        .bind(input.ip_ban)
        .bind(&input.reason)
        .bind(&input.admin_notes)
        .bind(input.actor_id)
        .bind(input.expires_at)
        .bind(input.is_irrevocable)
        .fetch_one(&mut *tx)
        .await?;

        // IP-only bans have no user row to flip
        if let Some(user_id) = input.user_id {
            status_sync::reconcile_user(&mut *tx, user_id).await?;
        }

        tx.commit().await?;

        tracing::warn!(
            ban_id = %ban.id,
            user_id = ?input.user_id,
            ip_ban = input.ip_ban,
            banned_by = %input.actor_id,
            expires_at = ?input.expires_at,
            irrevocable = input.is_irrevocable,
            "User banned"
        );

        Ok(ban)
    }

    /// Deactivate a ban. Irrevocable bans cannot be revoked.
    pub async fn revoke_ban(&self, ban_id: Uuid, actor_id: Uuid) -> Result<UserBan> {
        let mut tx = self.pool.begin().await?;

        let revoked = sqlx::query_as::<_, UserBan>(
            r#"
            UPDATE user_bans
            SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1 AND NOT is_irrevocable AND is_active
            RETURNING id, user_id, ip_address, ip_ban, reason, admin_notes, banned_by,
                      banned_at, expires_at, is_active, is_irrevocable, appeal_url_token,
                      appeal_url_token_rotated_at, appeal_url_token_expires_at, created_at
            "#,
        )
        .bind(ban_id)
        .fetch_optional(&mut *tx)
        .await?;

        let ban = match revoked {
            Some(ban) => ban,
            None => {
                // Distinguish why the guarded update matched nothing
                let existing = sqlx::query_as::<_, UserBan>(
                    r#"
                    SELECT id, user_id, ip_address, ip_ban, reason, admin_notes, banned_by,
                           banned_at, expires_at, is_active, is_irrevocable, appeal_url_token,
                           appeal_url_token_rotated_at, appeal_url_token_expires_at, created_at
                    FROM user_bans
                    WHERE id = $1
                    "#,
                )
                .bind(ban_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| SafetyError::NotFound(format!("Ban {} not found", ban_id)))?;

                if existing.is_irrevocable {
                    return Err(SafetyError::Conflict(format!(
                        "Ban {} is irrevocable and cannot be revoked",
                        ban_id
                    )));
                }
                return Err(SafetyError::Conflict(format!(
                    "Ban {} is already inactive",
                    ban_id
                )));
            }
        };

        if let Some(user_id) = ban.user_id {
            status_sync::reconcile_user(&mut *tx, user_id).await?;
        }

        tx.commit().await?;

        tracing::info!(
            ban_id = %ban_id,
            user_id = ?ban.user_id,
            revoked_by = %actor_id,
            "Ban revoked"
        );

        Ok(ban)
    }

    /// Whether the user is restricted right now (lazy expiry check)
    pub async fn is_user_currently_banned(&self, user_id: Uuid) -> Result<bool> {
        self.bans.is_user_banned(user_id).await
    }

    /// Issue a fresh appeal URL token for a ban, invalidating whatever
    /// token existed before. The new hash, rotation stamp and expiry land
    /// in one row write, so there is no window with two valid tokens.
    /// Rotation is rate-limited by a minimum interval.
    ///
    /// Returns the plaintext token and its expiry; the plaintext cannot
    /// be recovered later.
    pub async fn issue_appeal_url_token(
        &self,
        ban_id: Uuid,
    ) -> Result<(String, DateTime<Utc>)> {
        let ban = self.bans.get_ban(ban_id).await?;

        if !ban.is_appealable(Utc::now()) {
            return Err(SafetyError::Conflict(format!(
                "Ban {} cannot be appealed",
                ban_id
            )));
        }

        let raw_token = tokens::generate_token();
        let token_hash = tokens::hash_token(&raw_token);
        let expires_at = Utc::now() + Duration::hours(self.config.appeal_url_token_ttl_hours);

        // The rotation interval guard rides on the same UPDATE: a
        // too-early rotation matches no row instead of racing.
        let rotated = sqlx::query(
            r#"
            UPDATE user_bans
            SET appeal_url_token = $2,
                appeal_url_token_rotated_at = NOW(),
                appeal_url_token_expires_at = $3,
                updated_at = NOW()
            WHERE id = $1
              AND (appeal_url_token_rotated_at IS NULL
                   OR appeal_url_token_rotated_at <= NOW() - make_interval(secs => $4))
            "#,
        )
        .bind(ban_id)
        .bind(&token_hash)
        .bind(expires_at)
        .bind(self.config.appeal_url_rotation_min_secs as f64)
        .execute(&*self.pool)
        .await?
        .rows_affected();

        if rotated == 0 {
            return Err(SafetyError::Conflict(format!(
                "Appeal URL for ban {} was rotated too recently",
                ban_id
            )));
        }

        tracing::info!(ban_id = %ban_id, "Appeal URL token rotated");

        Ok((raw_token, expires_at))
    }

    /// Resolve an appeal URL token to its ban. Never-existed, rotated
    /// away and expired all collapse to NotFound for the caller.
    pub async fn validate_appeal_url_token(&self, raw_token: &str) -> Result<UserBan> {
        let token_hash = tokens::hash_token(raw_token);
        let ban = self.bans.find_by_appeal_url_token_hash(&token_hash).await?;

        match ban {
            Some(ban) => Ok(ban),
            None => {
                tracing::debug!("Appeal URL token validation failed");
                Err(SafetyError::NotFound("Invalid or expired token".into()))
            }
        }
    }
}
