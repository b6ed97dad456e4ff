use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Appeal status enum with state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "appeal_status", rename_all = "snake_case")]
pub enum AppealStatus {
    Pending,
    Approved,
    Rejected,
    MoreInfoRequested,
}

impl AppealStatus {
    /// Validate a review transition. `more_info_requested` is
    /// non-terminal: the admin may still approve or reject later, and may
    /// request clarification again (overwriting the previous response).
    pub fn can_transition_to(&self, new_status: AppealStatus) -> bool {
        matches!(
            (self, new_status),
            (AppealStatus::Pending, AppealStatus::Approved)
                | (AppealStatus::Pending, AppealStatus::Rejected)
                | (AppealStatus::Pending, AppealStatus::MoreInfoRequested)
                | (AppealStatus::MoreInfoRequested, AppealStatus::Approved)
                | (AppealStatus::MoreInfoRequested, AppealStatus::Rejected)
                | (AppealStatus::MoreInfoRequested, AppealStatus::MoreInfoRequested)
        )
    }

    /// Approved and rejected appeals are closed for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppealStatus::Approved | AppealStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppealStatus::Pending => "pending",
            AppealStatus::Approved => "approved",
            AppealStatus::Rejected => "rejected",
            AppealStatus::MoreInfoRequested => "more_info_requested",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(AppealStatus::Pending),
            "approved" => Some(AppealStatus::Approved),
            "rejected" => Some(AppealStatus::Rejected),
            "more_info_requested" => Some(AppealStatus::MoreInfoRequested),
            _ => None,
        }
    }
}

/// Appeal record. At most one exists per ban (unique user_ban_id).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BanAppeal {
    pub id: Uuid,
    pub user_ban_id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub evidence_path: Option<String>,
    pub status: AppealStatus,
    pub admin_response: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// SHA-256 hex; the raw token is never persisted
    pub appeal_token: String,
    pub appeal_token_rotated_at: Option<DateTime<Utc>>,
    pub request_ip: Option<String>,
    pub request_user_agent: Option<String>,
    pub terms_accepted: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for submitting a new appeal
#[derive(Debug, Validate)]
pub struct SubmitAppealInput {
    pub ban_id: Uuid,
    pub user_id: Uuid,
    #[validate(length(min = 10, max = 2000))]
    pub reason: String,
    pub evidence_path: Option<String>,
    pub terms_accepted: bool,
    pub request_ip: Option<String>,
    pub request_user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_transitions() {
        assert!(AppealStatus::Pending.can_transition_to(AppealStatus::Approved));
        assert!(AppealStatus::Pending.can_transition_to(AppealStatus::Rejected));
        assert!(AppealStatus::Pending.can_transition_to(AppealStatus::MoreInfoRequested));
    }

    #[test]
    fn test_more_info_requested_is_not_terminal() {
        assert!(!AppealStatus::MoreInfoRequested.is_terminal());
        assert!(AppealStatus::MoreInfoRequested.can_transition_to(AppealStatus::Approved));
        assert!(AppealStatus::MoreInfoRequested.can_transition_to(AppealStatus::Rejected));
        // Repeated clarification requests overwrite the admin response
        assert!(
            AppealStatus::MoreInfoRequested.can_transition_to(AppealStatus::MoreInfoRequested)
        );
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for terminal in [AppealStatus::Approved, AppealStatus::Rejected] {
            assert!(terminal.is_terminal());
            for next in [
                AppealStatus::Pending,
                AppealStatus::Approved,
                AppealStatus::Rejected,
                AppealStatus::MoreInfoRequested,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_nothing_returns_to_pending() {
        for status in [
            AppealStatus::Approved,
            AppealStatus::Rejected,
            AppealStatus::MoreInfoRequested,
        ] {
            assert!(!status.can_transition_to(AppealStatus::Pending));
        }
    }

    #[test]
    fn test_parse_round_trip() {
        for status in [
            AppealStatus::Pending,
            AppealStatus::Approved,
            AppealStatus::Rejected,
            AppealStatus::MoreInfoRequested,
        ] {
            assert_eq!(AppealStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AppealStatus::parse("escalated"), None);
    }
}
