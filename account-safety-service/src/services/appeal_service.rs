//! Appeal workflow for handling ban contest requests.

use crate::error::{Result, SafetyError};
use crate::models::{AppealStatus, BanAppeal, SubmitAppealInput, UserBan};
use crate::security::tokens;
use crate::services::status_sync;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub struct AppealService {
    pool: Arc<PgPool>,
}

impl AppealService {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Submit an appeal against an active, revocable ban.
    ///
    /// One appeal per ban, enforced by the unique constraint on
    /// user_ban_id rather than check-then-insert: of two concurrent
    /// submissions, exactly one insert wins and the loser surfaces as a
    /// Conflict. Returns the appeal and the plaintext security token,
    /// which is shown once and only stored hashed.
    pub async fn submit_appeal(&self, input: SubmitAppealInput) -> Result<(BanAppeal, String)> {
        input.validate()?;

        if !input.terms_accepted {
            return Err(SafetyError::Validation(
                "Appeal terms must be accepted".into(),
            ));
        }

        let ban = sqlx::query_as::<_, UserBan>(
            r#"
            SELECT id, user_id, ip_address, ip_ban, reason, admin_notes, banned_by,
                   banned_at, expires_at, is_active, is_irrevocable, appeal_url_token,
                   appeal_url_token_rotated_at, appeal_url_token_expires_at, created_at
            FROM user_bans
            WHERE id = $1
            "#,
        )
        .bind(input.ban_id)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or_else(|| SafetyError::NotFound(format!("Ban {} not found", input.ban_id)))?;

        if ban.user_id != Some(input.user_id) {
            return Err(SafetyError::Unauthorized(
                "Only the banned user may appeal this ban".into(),
            ));
        }

        if ban.is_irrevocable {
            return Err(SafetyError::Conflict(format!(
                "Ban {} is irrevocable and cannot be appealed",
                input.ban_id
            )));
        }

        if !ban.is_currently_banning(chrono::Utc::now()) {
            return Err(SafetyError::Conflict(format!(
                "Ban {} is not currently active",
                input.ban_id
            )));
        }

        let raw_token = tokens::generate_token();
        let token_hash = tokens::hash_token(&raw_token);

        let appeal = sqlx::query_as::<_, BanAppeal>(
            r#"
            INSERT INTO ban_appeals (
                user_ban_id, user_id, reason, evidence_path, status, appeal_token,
                request_ip, request_user_agent, terms_accepted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $8, NOW(), NOW())
            RETURNING id, user_ban_id, user_id, reason, evidence_path, status,
                      admin_response, reviewed_by, reviewed_at, appeal_token,
                      appeal_token_rotated_at, request_ip, request_user_agent,
                      terms_accepted, created_at
            "#,
        )
        .bind(input.ban_id)
        .bind(input.user_id)
        .bind(&input.reason)
        .bind(&input.evidence_path)
        .bind(&token_hash)
        .bind(&input.request_ip)
        .bind(&input.request_user_agent)
        .bind(input.terms_accepted)
        .fetch_one(&*self.pool)
        .await
        .map_err(|err| match SafetyError::from(err) {
            SafetyError::Conflict(_) => SafetyError::Conflict(format!(
                "An appeal already exists for ban {}",
                input.ban_id
            )),
            other => other,
        })?;

        tracing::info!(
            appeal_id = %appeal.id,
            ban_id = %input.ban_id,
            user_id = %input.user_id,
            "Appeal submitted"
        );

        Ok((appeal, raw_token))
    }

    /// Review an appeal (admin action). Approval lifts the ban and
    /// resynchronizes the user's status inside the same transaction.
    pub async fn review_appeal(
        &self,
        appeal_id: Uuid,
        reviewer_id: Uuid,
        decision: AppealStatus,
        admin_response: Option<&str>,
    ) -> Result<BanAppeal> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, BanAppeal>(
            r#"
            SELECT id, user_ban_id, user_id, reason, evidence_path, status,
                   admin_response, reviewed_by, reviewed_at, appeal_token,
                   appeal_token_rotated_at, request_ip, request_user_agent,
                   terms_accepted, created_at
            FROM ban_appeals
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(appeal_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| SafetyError::NotFound(format!("Appeal {} not found", appeal_id)))?;

        if !current.status.can_transition_to(decision) {
            return Err(SafetyError::Conflict(format!(
                "Invalid appeal status transition: {} -> {}",
                current.status.as_str(),
                decision.as_str()
            )));
        }

        // Repeated clarification requests overwrite admin_response;
        // nothing else about the row moves until a terminal decision.
        let updated = sqlx::query_as::<_, BanAppeal>(
            r#"
            UPDATE ban_appeals
            SET status = $2,
                reviewed_by = $3,
                reviewed_at = NOW(),
                admin_response = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_ban_id, user_id, reason, evidence_path, status,
                      admin_response, reviewed_by, reviewed_at, appeal_token,
                      appeal_token_rotated_at, request_ip, request_user_agent,
                      terms_accepted, created_at
            "#,
        )
        .bind(appeal_id)
        .bind(decision)
        .bind(reviewer_id)
        .bind(admin_response)
        .fetch_one(&mut *tx)
        .await?;

        if decision == AppealStatus::Approved {
            sqlx::query(
                r#"
                UPDATE user_bans
                SET is_active = FALSE, updated_at = NOW()
                WHERE id = $1 AND is_active
                "#,
            )
            .bind(updated.user_ban_id)
            .execute(&mut *tx)
            .await?;

            status_sync::reconcile_user(&mut *tx, updated.user_id).await?;

            tracing::info!(
                ban_id = %updated.user_ban_id,
                user_id = %updated.user_id,
                "Ban lifted by approved appeal"
            );
        }

        tx.commit().await?;

        tracing::info!(
            appeal_id = %appeal_id,
            reviewed_by = %reviewer_id,
            decision = %decision.as_str(),
            "Appeal reviewed"
        );

        Ok(updated)
    }

    /// Resolve a raw appeal token to its appeal. The caller cannot tell
    /// a token that never existed from one that was rotated away.
    pub async fn validate_appeal_token(&self, raw_token: &str) -> Result<BanAppeal> {
        let token_hash = tokens::hash_token(raw_token);

        let appeal = sqlx::query_as::<_, BanAppeal>(
            r#"
            SELECT id, user_ban_id, user_id, reason, evidence_path, status,
                   admin_response, reviewed_by, reviewed_at, appeal_token,
                   appeal_token_rotated_at, request_ip, request_user_agent,
                   terms_accepted, created_at
            FROM ban_appeals
            WHERE appeal_token = $1
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&*self.pool)
        .await?;

        match appeal {
            Some(appeal) => Ok(appeal),
            None => {
                tracing::debug!("Appeal token validation failed");
                Err(SafetyError::NotFound("Invalid or expired token".into()))
            }
        }
    }

    /// Replace the appeal's security token. Hash and rotation stamp land
    /// in one row write; the previous token stops validating immediately.
    pub async fn rotate_appeal_token(&self, appeal_id: Uuid) -> Result<(BanAppeal, String)> {
        let raw_token = tokens::generate_token();
        let token_hash = tokens::hash_token(&raw_token);

        let appeal = sqlx::query_as::<_, BanAppeal>(
            r#"
            UPDATE ban_appeals
            SET appeal_token = $2,
                appeal_token_rotated_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'more_info_requested')
            RETURNING id, user_ban_id, user_id, reason, evidence_path, status,
                      admin_response, reviewed_by, reviewed_at, appeal_token,
                      appeal_token_rotated_at, request_ip, request_user_agent,
                      terms_accepted, created_at
            "#,
        )
        .bind(appeal_id)
        .bind(&token_hash)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or_else(|| {
            SafetyError::Conflict(format!(
                "Appeal {} not found or already closed",
                appeal_id
            ))
        })?;

        tracing::info!(appeal_id = %appeal_id, "Appeal token rotated");

        Ok((appeal, raw_token))
    }
}
