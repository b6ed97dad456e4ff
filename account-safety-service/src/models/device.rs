use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Device / session record. One row per distinct login session, keyed by
/// a device identifier that is unique per user, not globally.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserDevice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub device_name: Option<String>,
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub ip_address: Option<String>,
    pub location_country: Option<String>,
    pub location_city: Option<String>,
    pub is_trusted: bool,
    pub last_used_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Trusted-device remember token (hashed). A valid, unexpired match lets
/// login skip the second-factor challenge.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrustedDevice {
    pub id: Uuid,
    pub user_device_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TrustedDevice {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Input for recording a login
#[derive(Debug)]
pub struct RecordLoginInput {
    pub user_id: Uuid,
    pub device_id: String,
    pub device_name: Option<String>,
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub ip_address: Option<String>,
    pub location_country: Option<String>,
    pub location_city: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_trusted_device_expiry() {
        let now = Utc::now();
        let device = TrustedDevice {
            id: Uuid::new_v4(),
            user_device_id: Uuid::new_v4(),
            token_hash: "0".repeat(64),
            expires_at: now + Duration::days(30),
            created_at: now,
        };
        assert!(device.is_valid(now));
        assert!(!device.is_valid(now + Duration::days(31)));
    }
}
