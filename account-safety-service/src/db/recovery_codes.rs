//! Append-only audit trail of 2FA recovery-code consumption.
//!
//! There is deliberately no update or delete here: rows are immutable
//! once written so the anomaly review can trust them.

use crate::error::Result;
use crate::models::RecoveryCodeUsage;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct RecoveryCodesDb {
    pool: Arc<PgPool>,
}

impl RecoveryCodesDb {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Record one recovery-code use
    pub async fn record_usage(
        &self,
        user_id: Uuid,
        code_hash: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<RecoveryCodeUsage> {
        let usage = sqlx::query_as::<_, RecoveryCodeUsage>(
            r#"
            INSERT INTO recovery_code_usages (user_id, code_hash, ip_address, user_agent, used_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, user_id, code_hash, ip_address, user_agent, used_at
            "#,
        )
        .bind(user_id)
        .bind(code_hash)
        .bind(ip_address)
        .bind(user_agent)
        .fetch_one(&*self.pool)
        .await?;

        tracing::info!(
            usage_id = %usage.id,
            user_id = %user_id,
            "Recovery code consumed"
        );

        Ok(usage)
    }

    /// Usage history for a user, newest first
    pub async fn list_usages(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RecoveryCodeUsage>> {
        let usages = sqlx::query_as::<_, RecoveryCodeUsage>(
            r#"
            SELECT id, user_id, code_hash, ip_address, user_agent, used_at
            FROM recovery_code_usages
            WHERE user_id = $1
            ORDER BY used_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await?;

        Ok(usages)
    }
}
