//! Impersonation session auditing for admin "log in as user" actions.

use crate::db::{BansDb, ImpersonationDb, UsersDb};
use crate::error::{Result, SafetyError};
use crate::models::{ImpersonationEndReason, ImpersonationSession};
use crate::security::tokens;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct ImpersonationService {
    sessions: ImpersonationDb,
    users: UsersDb,
    bans: BansDb,
}

impl ImpersonationService {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            sessions: ImpersonationDb::new(pool.clone()),
            users: UsersDb::new(pool.clone()),
            bans: BansDb::new(pool),
        }
    }

    /// Open an impersonation session. The plaintext session token is
    /// returned exactly once; only its hash is stored.
    pub async fn start(
        &self,
        admin_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<(ImpersonationSession, String)> {
        if admin_id == target_user_id {
            return Err(SafetyError::Validation(
                "Admins cannot impersonate themselves".into(),
            ));
        }

        // Both accounts must exist and the target must not be banned
        self.users.get_account(admin_id).await?;
        self.users.get_account(target_user_id).await?;

        if self.bans.is_user_banned(target_user_id).await? {
            return Err(SafetyError::Conflict(format!(
                "User {} is banned and cannot be impersonated",
                target_user_id
            )));
        }

        let raw_token = tokens::generate_token();
        let token_hash = tokens::hash_token(&raw_token);

        let session = self
            .sessions
            .insert_session(admin_id, target_user_id, &token_hash)
            .await?;

        tracing::warn!(
            session_id = %session.id,
            impersonator_id = %admin_id,
            target_user_id = %target_user_id,
            "Impersonation started"
        );

        Ok((session, raw_token))
    }

    /// Close an impersonation session exactly once
    pub async fn end(
        &self,
        raw_token: &str,
        end_reason: ImpersonationEndReason,
    ) -> Result<ImpersonationSession> {
        let token_hash = tokens::hash_token(raw_token);

        if let Some(session) = self.sessions.end_session(&token_hash, end_reason).await? {
            tracing::info!(
                session_id = %session.id,
                impersonator_id = %session.impersonator_id,
                end_reason = %end_reason.as_str(),
                "Impersonation ended"
            );
            return Ok(session);
        }

        // The guarded update matched nothing: already closed, or no such token
        match self.sessions.find_by_token_hash(&token_hash).await? {
            Some(_) => Err(SafetyError::Conflict(
                "Impersonation session already ended".into(),
            )),
            None => Err(SafetyError::NotFound("Invalid or expired token".into())),
        }
    }

    /// Audit listing for one admin, newest first
    pub async fn list_for_impersonator(
        &self,
        impersonator_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ImpersonationSession>> {
        self.sessions
            .list_for_impersonator(impersonator_id, limit, offset)
            .await
    }
}
