//! Database operations for the device / session registry.
//!
//! Sessions are soft-revoked: revoked_at stays on the row and every
//! "active" query filters it explicitly.

use crate::error::Result;
use crate::models::{RecordLoginInput, UserDevice};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct DevicesDb {
    pool: Arc<PgPool>,
}

impl DevicesDb {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Upsert a login by (user_id, device_id). A returning device reuses
    /// its row: fingerprint, IP and geolocation are refreshed, the
    /// last-used clock advances, and any prior revocation is cleared
    /// because this is a fresh session.
    pub async fn upsert_login(&self, input: &RecordLoginInput) -> Result<UserDevice> {
        let device = sqlx::query_as::<_, UserDevice>(
            r#"
            INSERT INTO user_devices (
                user_id, device_id, device_name, browser_name, browser_version,
                os_name, os_version, ip_address, location_country, location_city,
                last_used_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW(), NOW())
            ON CONFLICT (user_id, device_id) DO UPDATE
            SET device_name = EXCLUDED.device_name,
                browser_name = EXCLUDED.browser_name,
                browser_version = EXCLUDED.browser_version,
                os_name = EXCLUDED.os_name,
                os_version = EXCLUDED.os_version,
                ip_address = EXCLUDED.ip_address,
                location_country = EXCLUDED.location_country,
                location_city = EXCLUDED.location_city,
                last_used_at = NOW(),
                revoked_at = NULL,
                updated_at = NOW()
            RETURNING id, user_id, device_id, device_name, browser_name, browser_version,
                      os_name, os_version, ip_address, location_country, location_city,
                      is_trusted, last_used_at, verified_at, revoked_at, created_at
            "#,
        )
        .bind(input.user_id)
        .bind(&input.device_id)
        .bind(&input.device_name)
        .bind(&input.browser_name)
        .bind(&input.browser_version)
        .bind(&input.os_name)
        .bind(&input.os_version)
        .bind(&input.ip_address)
        .bind(&input.location_country)
        .bind(&input.location_city)
        .fetch_one(&*self.pool)
        .await?;

        Ok(device)
    }

    /// Active sessions for a user, most recently used first
    pub async fn list_active_devices(&self, user_id: Uuid) -> Result<Vec<UserDevice>> {
        let devices = sqlx::query_as::<_, UserDevice>(
            r#"
            SELECT id, user_id, device_id, device_name, browser_name, browser_version,
                   os_name, os_version, ip_address, location_country, location_city,
                   is_trusted, last_used_at, verified_at, revoked_at, created_at
            FROM user_devices
            WHERE user_id = $1 AND revoked_at IS NULL
            ORDER BY last_used_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(devices)
    }

    /// Whether a valid, unexpired remember-token matches this device.
    /// The login flow skips the second-factor challenge on true.
    pub async fn is_device_trusted(
        &self,
        user_id: Uuid,
        device_id: &str,
        token_hash: &str,
    ) -> Result<bool> {
        let trusted: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM trusted_devices t
                JOIN user_devices d ON d.id = t.user_device_id
                WHERE d.user_id = $1
                  AND d.device_id = $2
                  AND d.is_trusted
                  AND d.revoked_at IS NULL
                  AND t.token_hash = $3
                  AND t.expires_at > NOW()
            )
            "#,
        )
        .bind(user_id)
        .bind(device_id)
        .bind(token_hash)
        .fetch_one(&*self.pool)
        .await?;

        Ok(trusted)
    }

    /// Soft-revoke a set of sessions and drop their remember-tokens.
    /// Returns how many sessions were actually revoked.
    pub async fn revoke_devices(&self, device_record_ids: &[Uuid]) -> Result<u64> {
        if device_record_ids.is_empty() {
            return Ok(0);
        }

        let revoked = sqlx::query(
            r#"
            UPDATE user_devices
            SET revoked_at = NOW(), is_trusted = FALSE, updated_at = NOW()
            WHERE id = ANY($1) AND revoked_at IS NULL
            "#,
        )
        .bind(device_record_ids)
        .execute(&*self.pool)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM trusted_devices WHERE user_device_id = ANY($1)")
            .bind(device_record_ids)
            .execute(&*self.pool)
            .await?;

        Ok(revoked)
    }

    /// Revoke every active session for a user except, optionally, the
    /// current one. Returns how many sessions were revoked.
    pub async fn revoke_all_devices(
        &self,
        user_id: Uuid,
        except_device_record_id: Option<Uuid>,
    ) -> Result<u64> {
        let revoked = if let Some(keep) = except_device_record_id {
            sqlx::query(
                r#"
                UPDATE user_devices
                SET revoked_at = NOW(), is_trusted = FALSE, updated_at = NOW()
                WHERE user_id = $1 AND id <> $2 AND revoked_at IS NULL
                "#,
            )
            .bind(user_id)
            .bind(keep)
            .execute(&*self.pool)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                r#"
                UPDATE user_devices
                SET revoked_at = NOW(), is_trusted = FALSE, updated_at = NOW()
                WHERE user_id = $1 AND revoked_at IS NULL
                "#,
            )
            .bind(user_id)
            .execute(&*self.pool)
            .await?
            .rows_affected()
        };

        if let Some(keep) = except_device_record_id {
            sqlx::query(
                r#"
                DELETE FROM trusted_devices
                WHERE user_device_id IN (
                    SELECT id FROM user_devices WHERE user_id = $1 AND id <> $2
                )
                "#,
            )
            .bind(user_id)
            .bind(keep)
            .execute(&*self.pool)
            .await?;
        } else {
            sqlx::query(
                r#"
                DELETE FROM trusted_devices
                WHERE user_device_id IN (
                    SELECT id FROM user_devices WHERE user_id = $1
                )
                "#,
            )
            .bind(user_id)
            .execute(&*self.pool)
            .await?;
        }

        Ok(revoked)
    }
}
