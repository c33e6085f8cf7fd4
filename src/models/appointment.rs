use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AppointmentStatus;

/// Clinic visit or lab test on the patient's schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub title: String,
    pub scheduled_for: NaiveDateTime,
    pub notes: String,
    pub status: AppointmentStatus,
    pub created_at: NaiveDateTime,
}
