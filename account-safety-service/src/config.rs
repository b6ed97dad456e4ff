use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server configuration
    pub grpc_port: u16,
    pub health_port: u16,

    // Token lifetimes
    pub appeal_url_token_ttl_hours: i64,
    pub trusted_device_ttl_days: i64,

    // Minimum seconds between appeal-URL token rotations for one ban
    pub appeal_url_rotation_min_secs: i64,

    // Per-role session limits
    pub session_limit_default: usize,
    pub session_limit_staff: usize,
    pub session_limit_admin: usize,

    // Background status sync sweep interval; 0 disables the sweep
    pub status_sync_interval_secs: u64,

    // Service configuration
    pub service_name: String,
    pub environment: String,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::SafetyError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            grpc_port: env::var("GRPC_PORT")
                .unwrap_or_else(|_| "50061".to_string())
                .parse()
                .unwrap_or(50061),
            health_port: env::var("HEALTH_PORT")
                .unwrap_or_else(|_| "8091".to_string())
                .parse()
                .unwrap_or(8091),
            appeal_url_token_ttl_hours: env::var("APPEAL_URL_TOKEN_TTL_HOURS")
                .unwrap_or_else(|_| "48".to_string())
                .parse()
                .unwrap_or(48),
            trusted_device_ttl_days: env::var("TRUSTED_DEVICE_TTL_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            appeal_url_rotation_min_secs: env::var("APPEAL_URL_ROTATION_MIN_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            session_limit_default: env::var("SESSION_LIMIT_DEFAULT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            session_limit_staff: env::var("SESSION_LIMIT_STAFF")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .unwrap_or(8),
            session_limit_admin: env::var("SESSION_LIMIT_ADMIN")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            status_sync_interval_secs: env::var("STATUS_SYNC_INTERVAL_SECS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(0),
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "account-safety-service".to_string()),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        })
    }

    /// Resolve the configured session limit for a role
    pub fn session_limit_for_role(&self, role: &str) -> usize {
        match role {
            "admin" => self.session_limit_admin,
            "editor" | "moderator" => self.session_limit_staff,
            _ => self.session_limit_default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.grpc_port, 50061);
        assert_eq!(config.session_limit_default, 5);
        assert_eq!(config.service_name, "account-safety-service");
    }

    #[test]
    fn test_session_limit_for_role() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.session_limit_for_role("admin"), config.session_limit_admin);
        assert_eq!(config.session_limit_for_role("editor"), config.session_limit_staff);
        assert_eq!(config.session_limit_for_role("user"), config.session_limit_default);
        assert_eq!(config.session_limit_for_role("anything-else"), config.session_limit_default);
    }
}
