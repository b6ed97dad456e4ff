//! Status synchronizer.
//!
//! The ban ledger is the source of truth; users.status is a read
//! optimization. This pass reconciles the two in both directions and is
//! idempotent: a second run over unchanged data writes nothing. It only
//! ever corrects drift, never creates bans.
//!
//! Ban mutations call the per-user variant inside their own transaction
//! so the status column cannot be observed stale; the full pass backs
//! the RunStatusSync operation and the optional background sweep.

use crate::error::Result;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

/// Rows corrected by one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Users flipped to banned because an active, non-expired ban exists
    pub marked_banned: u64,
    /// Users reset to active because no such ban exists anymore
    pub reactivated: u64,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.marked_banned == 0 && self.reactivated == 0
    }
}

pub struct StatusSynchronizer {
    pool: Arc<PgPool>,
}

impl StatusSynchronizer {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Full two-direction reconciliation pass
    pub async fn reconcile(&self) -> Result<SyncReport> {
        let mut conn = self.pool.acquire().await?;
        let report = reconcile_all(&mut *conn).await?;

        if report.is_clean() {
            tracing::debug!("Status sync pass found no drift");
        } else {
            tracing::warn!(
                marked_banned = report.marked_banned,
                reactivated = report.reactivated,
                "Status sync corrected drift"
            );
        }

        Ok(report)
    }
}

/// Reconcile every user. Safe to re-run at any time.
pub async fn reconcile_all(conn: &mut PgConnection) -> Result<SyncReport> {
    // Direction 1: every user with an active, non-expired ban is banned.
    let marked_banned = sqlx::query(
        r#"
        UPDATE users
        SET status = 'banned', updated_at = NOW()
        WHERE deleted_at IS NULL
          AND status <> 'banned'
          AND EXISTS (
              SELECT 1 FROM user_bans b
              WHERE b.user_id = users.id
                AND b.is_active
                AND (b.expires_at IS NULL OR b.expires_at > NOW())
          )
        "#,
    )
    .execute(&mut *conn)
    .await?
    .rows_affected();

    // Direction 2: a banned status with no backing ban is drift; reset it.
    let reactivated = sqlx::query(
        r#"
        UPDATE users
        SET status = 'active', updated_at = NOW()
        WHERE deleted_at IS NULL
          AND status = 'banned'
          AND NOT EXISTS (
              SELECT 1 FROM user_bans b
              WHERE b.user_id = users.id
                AND b.is_active
                AND (b.expires_at IS NULL OR b.expires_at > NOW())
          )
        "#,
    )
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(SyncReport {
        marked_banned,
        reactivated,
    })
}

/// Reconcile a single user, for use inside a ban-mutation transaction
pub async fn reconcile_user(conn: &mut PgConnection, user_id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET status = CASE
                WHEN EXISTS (
                    SELECT 1 FROM user_bans b
                    WHERE b.user_id = users.id
                      AND b.is_active
                      AND (b.expires_at IS NULL OR b.expires_at > NOW())
                ) THEN 'banned'::user_status
                WHEN status = 'banned' THEN 'active'::user_status
                ELSE status
            END,
            updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_report() {
        assert!(SyncReport::default().is_clean());
        assert!(!SyncReport {
            marked_banned: 1,
            reactivated: 0
        }
        .is_clean());
        assert!(!SyncReport {
            marked_banned: 0,
            reactivated: 2
        }
        .is_clean());
    }
}
