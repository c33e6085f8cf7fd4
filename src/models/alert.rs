use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AlertSeverity;

/// A clinical or reminder alert owned by one patient.
///
/// `alert_type` is open-ended (`snoozed_<type>` follow-ups are derived
/// at runtime), so it stays a string rather than an enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub alert_type: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub resolved: bool,
    pub created_at: NaiveDateTime,
}
