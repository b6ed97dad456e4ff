//! Read-side database operations for ban appeals.

use crate::error::{Result, SafetyError};
use crate::models::{AppealStatus, BanAppeal};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct AppealsDb {
    pool: Arc<PgPool>,
}

impl AppealsDb {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get appeal by ID
    pub async fn get_appeal(&self, appeal_id: Uuid) -> Result<BanAppeal> {
        let appeal = sqlx::query_as::<_, BanAppeal>(
            r#"
            SELECT id, user_ban_id, user_id, reason, evidence_path, status,
                   admin_response, reviewed_by, reviewed_at, appeal_token,
                   appeal_token_rotated_at, request_ip, request_user_agent,
                   terms_accepted, created_at
            FROM ban_appeals
            WHERE id = $1
            "#,
        )
        .bind(appeal_id)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or_else(|| SafetyError::NotFound(format!("Appeal {} not found", appeal_id)))?;

        Ok(appeal)
    }

    /// The appeal filed against a ban, if one exists
    pub async fn get_appeal_for_ban(&self, ban_id: Uuid) -> Result<Option<BanAppeal>> {
        let appeal = sqlx::query_as::<_, BanAppeal>(
            r#"
            SELECT id, user_ban_id, user_id, reason, evidence_path, status,
                   admin_response, reviewed_by, reviewed_at, appeal_token,
                   appeal_token_rotated_at, request_ip, request_user_agent,
                   terms_accepted, created_at
            FROM ban_appeals
            WHERE user_ban_id = $1
            "#,
        )
        .bind(ban_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(appeal)
    }

    /// Look up an appeal by the hash of its security token
    pub async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<BanAppeal>> {
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
        .bind(token_hash)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(appeal)
    }

    /// List appeals for the review queue, oldest first
    pub async fn list_appeals(
        &self,
        status: Option<AppealStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<BanAppeal>> {
        let appeals = if let Some(status) = status {
            sqlx::query_as::<_, BanAppeal>(
                r#"
                SELECT id, user_ban_id, user_id, reason, evidence_path, status,
                       admin_response, reviewed_by, reviewed_at, appeal_token,
                       appeal_token_rotated_at, request_ip, request_user_agent,
                       terms_accepted, created_at
                FROM ban_appeals
                WHERE status = $1
                ORDER BY created_at ASC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&*self.pool)
            .await?
        } else {
            sqlx::query_as::<_, BanAppeal>(
                r#"
                SELECT id, user_ban_id, user_id, reason, evidence_path, status,
                       admin_response, reviewed_by, reviewed_at, appeal_token,
                       appeal_token_rotated_at, request_ip, request_user_agent,
                       terms_accepted, created_at
                FROM ban_appeals
                ORDER BY created_at ASC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&*self.pool)
            .await?
        };

        Ok(appeals)
    }
}
