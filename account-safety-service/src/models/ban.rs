use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Ban ledger row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserBan {
    pub id: Uuid,
    /// NULL for IP-only bans
    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub ip_ban: bool,
    pub reason: String,
    pub admin_notes: Option<String>,
    /// Issuing admin; survives admin deletion as NULL
    pub banned_by: Option<Uuid>,
    pub banned_at: DateTime<Utc>,
    /// NULL = permanent
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_irrevocable: bool,
    pub appeal_url_token: Option<String>,
    pub appeal_url_token_rotated_at: Option<DateTime<Utc>>,
    pub appeal_url_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserBan {
    /// Whether this ban restricts access at `now`. Expiry is lazy: an
    /// expired ban may still carry `is_active = true` until a corrective
    /// pass clears it, but it never counts as currently banning.
    pub fn is_currently_banning(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |exp| exp > now)
    }

    /// Whether an appeal may be opened against this ban
    pub fn is_appealable(&self, now: DateTime<Utc>) -> bool {
        !self.is_irrevocable && self.is_currently_banning(now)
    }
}

/// Input for creating a new ban
#[derive(Debug, Validate)]
pub struct CreateBanInput {
    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub ip_ban: bool,
    #[validate(length(min = 3, max = 2000))]
    pub reason: String,
    pub admin_notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_irrevocable: bool,
    /// Issuing admin, mandatory for audit attribution
    pub actor_id: Uuid,
}

impl CreateBanInput {
    /// Structural rules that hold regardless of database state
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.is_irrevocable && self.expires_at.is_some() {
            return Err("irrevocable bans must be permanent (expires_at must be null)".into());
        }
        if self.user_id.is_none() && self.ip_address.is_none() {
            return Err("a ban must name a user, an IP address, or both".into());
        }
        if self.ip_ban && self.ip_address.is_none() {
            return Err("ip_ban requires an IP address".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ban(expires_at: Option<DateTime<Utc>>, is_active: bool) -> UserBan {
        UserBan {
            id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            ip_address: None,
            ip_ban: false,
            reason: "spam".to_string(),
            admin_notes: None,
            banned_by: Some(Uuid::new_v4()),
            banned_at: Utc::now(),
            expires_at,
            is_active,
            is_irrevocable: false,
            appeal_url_token: None,
            appeal_url_token_rotated_at: None,
            appeal_url_token_expires_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_permanent_active_ban_is_banning() {
        assert!(ban(None, true).is_currently_banning(Utc::now()));
    }

    #[test]
    fn test_future_expiry_is_banning() {
        let now = Utc::now();
        assert!(ban(Some(now + Duration::days(7)), true).is_currently_banning(now));
    }

    #[test]
    fn test_past_expiry_never_bans_even_while_flagged_active() {
        let now = Utc::now();
        let stale = ban(Some(now - Duration::hours(1)), true);
        assert!(stale.is_active);
        assert!(!stale.is_currently_banning(now));
    }

    #[test]
    fn test_deactivated_ban_is_not_banning() {
        assert!(!ban(None, false).is_currently_banning(Utc::now()));
    }

    #[test]
    fn test_irrevocable_ban_is_not_appealable() {
        let mut b = ban(None, true);
        b.is_irrevocable = true;
        assert!(!b.is_appealable(Utc::now()));
    }

    #[test]
    fn test_irrevocable_with_expiry_rejected() {
        let input = CreateBanInput {
            user_id: Some(Uuid::new_v4()),
            ip_address: None,
            ip_ban: false,
            reason: "ban evasion".to_string(),
            admin_notes: None,
            expires_at: Some(Utc::now() + Duration::days(1)),
            is_irrevocable: true,
            actor_id: Uuid::new_v4(),
        };
        assert!(input.check_invariants().is_err());
    }

    #[test]
    fn test_subjectless_ban_rejected() {
        let input = CreateBanInput {
            user_id: None,
            ip_address: None,
            ip_ban: false,
            reason: "nothing to ban".to_string(),
            admin_notes: None,
            expires_at: None,
            is_irrevocable: false,
            actor_id: Uuid::new_v4(),
        };
        assert!(input.check_invariants().is_err());
    }

    #[test]
    fn test_ip_only_ban_accepted() {
        let input = CreateBanInput {
            user_id: None,
            ip_address: Some("203.0.113.7".to_string()),
            ip_ban: true,
            reason: "scraper".to_string(),
            admin_notes: None,
            expires_at: None,
            is_irrevocable: false,
            actor_id: Uuid::new_v4(),
        };
        assert!(input.check_invariants().is_ok());
    }
}
