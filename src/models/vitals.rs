use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ReadingType;

/// One clinic-style snapshot of blood pressure and glucose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub systolic: i32,
    pub diastolic: i32,
    pub blood_glucose: f64,
    pub bmi: f64,
    pub timestamp: NaiveDateTime,
}

/// A typed measurement from a device or manual entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReading {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub reading_type: ReadingType,
    pub value: f64,
    pub unit: String,
    pub systolic: Option<i32>, // bp only
    pub diastolic: Option<i32>,
    pub source: String,
    pub recorded_at: NaiveDateTime,
}
