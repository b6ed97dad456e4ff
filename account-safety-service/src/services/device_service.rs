//! Device trust registry: login recording, trusted-device remember
//! tokens and per-role session limits.

use crate::config::Config;
use crate::db::DevicesDb;
use crate::error::{Result, SafetyError};
use crate::models::{RecordLoginInput, TrustedDevice, UserDevice};
use crate::security::tokens;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// The fields the eviction policy looks at
#[derive(Debug, Clone, Copy)]
pub struct SessionStamp {
    pub id: Uuid,
    pub last_used_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Pick which sessions to evict to get back under `limit`: strictly
/// least-recently-used by last_used_at, ties broken by creation order
/// (oldest first).
pub fn select_evictions(sessions: &[SessionStamp], limit: usize) -> Vec<Uuid> {
    if sessions.len() <= limit {
        return Vec::new();
    }

    let mut ordered: Vec<&SessionStamp> = sessions.iter().collect();
    ordered.sort_by(|a, b| {
        a.last_used_at
            .cmp(&b.last_used_at)
            .then(a.created_at.cmp(&b.created_at))
    });

    ordered[..sessions.len() - limit]
        .iter()
        .map(|s| s.id)
        .collect()
}

pub struct DeviceService {
    pool: Arc<PgPool>,
    devices: DevicesDb,
    config: Arc<Config>,
}

impl DeviceService {
    pub fn new(pool: Arc<PgPool>, config: Arc<Config>) -> Self {
        let devices = DevicesDb::new(pool.clone());
        Self {
            pool,
            devices,
            config,
        }
    }

    /// Record a login, creating or refreshing the (user, device) row
    pub async fn record_login(&self, input: RecordLoginInput) -> Result<UserDevice> {
        let device = self.devices.upsert_login(&input).await?;

        tracing::info!(
            device_record_id = %device.id,
            user_id = %input.user_id,
            device_id = %input.device_id,
            "Login recorded"
        );

        Ok(device)
    }

    /// Trust a device: issue a hashed remember-token with expiry. Any
    /// previous remember-token for the device is dropped in the same
    /// transaction, so at most one is valid at a time.
    ///
    /// Returns the plaintext token exactly once.
    pub async fn mark_trusted(
        &self,
        device_record_id: Uuid,
    ) -> Result<(UserDevice, TrustedDevice, String)> {
        let raw_token = tokens::generate_token();
        let token_hash = tokens::hash_token(&raw_token);
        let expires_at = Utc::now() + Duration::days(self.config.trusted_device_ttl_days);

        let mut tx = self.pool.begin().await?;

        let device = sqlx::query_as::<_, UserDevice>(
            r#"
            UPDATE user_devices
            SET is_trusted = TRUE,
                verified_at = COALESCE(verified_at, NOW()),
                updated_at = NOW()
            WHERE id = $1 AND revoked_at IS NULL
            RETURNING id, user_id, device_id, device_name, browser_name, browser_version,
                      os_name, os_version, ip_address, location_country, location_city,
                      is_trusted, last_used_at, verified_at, revoked_at, created_at
            "#,
        )
        .bind(device_record_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            SafetyError::NotFound(format!(
                "Device record {} not found or revoked",
                device_record_id
            ))
        })?;

        sqlx::query("DELETE FROM trusted_devices WHERE user_device_id = $1")
            .bind(device_record_id)
            .execute(&mut *tx)
            .await?;

        let trusted = sqlx::query_as::<_, TrustedDevice>(
            r#"
            INSERT INTO trusted_devices (user_device_id, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, user_device_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(device_record_id)
        .bind(&token_hash)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            device_record_id = %device_record_id,
            user_id = %device.user_id,
            expires_at = %expires_at,
            "Device marked trusted"
        );

        Ok((device, trusted, raw_token))
    }

    /// Whether this device may skip the second-factor challenge
    pub async fn is_device_trusted(
        &self,
        user_id: Uuid,
        device_id: &str,
        raw_token: &str,
    ) -> Result<bool> {
        let token_hash = tokens::hash_token(raw_token);
        self.devices
            .is_device_trusted(user_id, device_id, &token_hash)
            .await
    }

    /// Trim a user's active sessions down to their role's limit.
    ///
    /// Read-then-evict: two concurrent logins may both see a free slot
    /// and briefly exceed the limit; the next pass trims the excess, so
    /// no stronger guarantee is needed here.
    pub async fn enforce_session_limit(&self, user_id: Uuid, role: &str) -> Result<Vec<Uuid>> {
        let limit = self.config.session_limit_for_role(role);

        let sessions = self.devices.list_active_devices(user_id).await?;
        let stamps: Vec<SessionStamp> = sessions
            .iter()
            .map(|d| SessionStamp {
                id: d.id,
                last_used_at: d.last_used_at,
                created_at: d.created_at,
            })
            .collect();

        let evicted = select_evictions(&stamps, limit);
        if evicted.is_empty() {
            return Ok(evicted);
        }

        self.devices.revoke_devices(&evicted).await?;

        tracing::warn!(
            user_id = %user_id,
            role = %role,
            limit = limit,
            evicted = evicted.len(),
            "Session limit enforced"
        );

        Ok(evicted)
    }

    /// Immediately invalidate one session
    pub async fn revoke_device(&self, device_record_id: Uuid) -> Result<u64> {
        let revoked = self.devices.revoke_devices(&[device_record_id]).await?;
        if revoked == 0 {
            return Err(SafetyError::NotFound(format!(
                "Device record {} not found or already revoked",
                device_record_id
            )));
        }

        tracing::info!(device_record_id = %device_record_id, "Device revoked");
        Ok(revoked)
    }

    /// Invalidate every session for a user except, optionally, the
    /// current one
    pub async fn revoke_all_except_current(
        &self,
        user_id: Uuid,
        current_device_record_id: Option<Uuid>,
    ) -> Result<u64> {
        let revoked = self
            .devices
            .revoke_all_devices(user_id, current_device_record_id)
            .await?;

        tracing::info!(
            user_id = %user_id,
            kept = ?current_device_record_id,
            revoked = revoked,
            "Sessions revoked"
        );

        Ok(revoked)
    }

    /// Active sessions for a user, most recently used first
    pub async fn list_devices(&self, user_id: Uuid) -> Result<Vec<UserDevice>> {
        self.devices.list_active_devices(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(id: Uuid, last_used_secs_ago: i64, created_secs_ago: i64) -> SessionStamp {
        let now = Utc::now();
        SessionStamp {
            id,
            last_used_at: now - Duration::seconds(last_used_secs_ago),
            created_at: now - Duration::seconds(created_secs_ago),
        }
    }

    #[test]
    fn test_under_limit_evicts_nothing() {
        let sessions = vec![stamp(Uuid::new_v4(), 10, 100), stamp(Uuid::new_v4(), 20, 200)];
        assert!(select_evictions(&sessions, 2).is_empty());
        assert!(select_evictions(&sessions, 5).is_empty());
    }

    #[test]
    fn test_evicts_exactly_the_least_recently_used() {
        let a = Uuid::new_v4(); // most recent
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let d = Uuid::new_v4(); // least recent
        let sessions = vec![
            stamp(a, 10, 400),
            stamp(b, 20, 300),
            stamp(c, 30, 200),
            stamp(d, 40, 100),
        ];

        let evicted = select_evictions(&sessions, 2);
        assert_eq!(evicted.len(), 2);
        assert!(evicted.contains(&d));
        assert!(evicted.contains(&c));
        assert!(!evicted.contains(&a));
        assert!(!evicted.contains(&b));
    }

    #[test]
    fn test_ties_broken_by_creation_order() {
        let now = Utc::now();
        let same_use = now - Duration::seconds(60);
        let older = Uuid::new_v4();
        let newer = Uuid::new_v4();
        let sessions = vec![
            SessionStamp {
                id: newer,
                last_used_at: same_use,
                created_at: now - Duration::seconds(100),
            },
            SessionStamp {
                id: older,
                last_used_at: same_use,
                created_at: now - Duration::seconds(500),
            },
        ];

        let evicted = select_evictions(&sessions, 1);
        assert_eq!(evicted, vec![older]);
    }

    #[test]
    fn test_eviction_count_restores_limit() {
        let sessions: Vec<SessionStamp> = (0..7)
            .map(|i| stamp(Uuid::new_v4(), i * 10, i * 10))
            .collect();
        let evicted = select_evictions(&sessions, 3);
        assert_eq!(evicted.len(), 4);
    }
}
