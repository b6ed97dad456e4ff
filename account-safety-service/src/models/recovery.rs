use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only log of 2FA recovery-code consumption. Rows are never
/// mutated after insert; the anomaly/audit review reads them as-is.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecoveryCodeUsage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code_hash: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub used_at: DateTime<Utc>,
}
