use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AuditAction, Platform};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

/// A registered push-notification target for an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushDevice {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token: String,
    pub platform: Platform,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub account_id: Option<Uuid>,
    pub entity: String,
    pub object_id: String,
    pub action: AuditAction,
    pub timestamp: NaiveDateTime,
}
