use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How an impersonation session was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "impersonation_end_reason", rename_all = "snake_case")]
pub enum ImpersonationEndReason {
    Logout,
    Expired,
    ManualStop,
}

impl ImpersonationEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpersonationEndReason::Logout => "logout",
            ImpersonationEndReason::Expired => "expired",
            ImpersonationEndReason::ManualStop => "manual_stop",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "logout" => Some(ImpersonationEndReason::Logout),
            "expired" => Some(ImpersonationEndReason::Expired),
            "manual_stop" => Some(ImpersonationEndReason::ManualStop),
            _ => None,
        }
    }
}

/// Admin "log in as user" audit record. Created at impersonation start,
/// closed exactly once by setting ended_at and end_reason.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ImpersonationSession {
    pub id: Uuid,
    pub impersonator_id: Uuid,
    pub target_user_id: Uuid,
    pub token_hash: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<ImpersonationEndReason>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_reason_parse_round_trip() {
        for reason in [
            ImpersonationEndReason::Logout,
            ImpersonationEndReason::Expired,
            ImpersonationEndReason::ManualStop,
        ] {
            assert_eq!(ImpersonationEndReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(ImpersonationEndReason::parse("crashed"), None);
    }
}
