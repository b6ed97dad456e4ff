//! Database operations for impersonation session audit records.

use crate::error::Result;
use crate::models::{ImpersonationEndReason, ImpersonationSession};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct ImpersonationDb {
    pool: Arc<PgPool>,
}

impl ImpersonationDb {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Open a new impersonation session
    pub async fn insert_session(
        &self,
        impersonator_id: Uuid,
        target_user_id: Uuid,
        token_hash: &str,
    ) -> Result<ImpersonationSession> {
        let session = sqlx::query_as::<_, ImpersonationSession>(
            r#"
            INSERT INTO impersonation_sessions (
                impersonator_id, target_user_id, token_hash, started_at, created_at
            )
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id, impersonator_id, target_user_id, token_hash,
                      started_at, ended_at, end_reason, created_at
            "#,
        )
        .bind(impersonator_id)
        .bind(target_user_id)
        .bind(token_hash)
        .fetch_one(&*self.pool)
        .await?;

        Ok(session)
    }

    /// Close a session exactly once. The WHERE guard makes the close
    /// idempotent at the row level; a second attempt matches nothing.
    pub async fn end_session(
        &self,
        token_hash: &str,
        end_reason: ImpersonationEndReason,
    ) -> Result<Option<ImpersonationSession>> {
        let session = sqlx::query_as::<_, ImpersonationSession>(
            r#"
            UPDATE impersonation_sessions
            SET ended_at = NOW(), end_reason = $2
            WHERE token_hash = $1 AND ended_at IS NULL
            RETURNING id, impersonator_id, target_user_id, token_hash,
                      started_at, ended_at, end_reason, created_at
            "#,
        )
        .bind(token_hash)
        .bind(end_reason)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(session)
    }

    /// Fetch a session by token hash regardless of state
    pub async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<ImpersonationSession>> {
        let session = sqlx::query_as::<_, ImpersonationSession>(
            r#"
            SELECT id, impersonator_id, target_user_id, token_hash,
                   started_at, ended_at, end_reason, created_at
            FROM impersonation_sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(session)
    }

    /// Audit listing for one admin, newest first
    pub async fn list_for_impersonator(
        &self,
        impersonator_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ImpersonationSession>> {
        let sessions = sqlx::query_as::<_, ImpersonationSession>(
            r#"
            SELECT id, impersonator_id, target_user_id, token_hash,
                   started_at, ended_at, end_reason, created_at
            FROM impersonation_sessions
            WHERE impersonator_id = $1
            ORDER BY started_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(impersonator_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await?;

        Ok(sessions)
    }
}
