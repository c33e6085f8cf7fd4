//! Vitals endpoints. Every create runs the alert rules and pushes any
//! alert it raised.
//!
//! - `GET|POST /api/records`: clinic-style health records
//! - `GET|POST /api/device-readings`: typed device or manual readings

use std::str::FromStr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{parse_datetime, scope_for, scoped_ids, target_patient};
use crate::alerts;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::authorization;
use crate::db::repository::{self, ReadingFilter};
use crate::db::{now_utc, DatabaseError};
use crate::models::{Alert, AuditAction, DeviceReading, HealthRecord, ReadingType};
use crate::notification;
use crate::risk;

#[derive(Debug, Default, Deserialize)]
pub struct RecordListQuery {
    pub patient_id: Option<Uuid>,
    pub limit: Option<u32>,
}

/// `GET /api/records`: newest first, across the caller's scope.
pub async fn list_records(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<RecordListQuery>,
) -> Result<Json<Vec<HealthRecord>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let scope = scope_for(&conn, &auth)?;
    let ids = scoped_ids(&conn, &scope, query.patient_id)?;
    let mut records = repository::list_health_records(&conn, &ids)?;
    if let Some(limit) = query.limit.filter(|l| *l > 0) {
        records.truncate(limit as usize);
    }
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct CreateRecord {
    pub patient_id: Option<Uuid>,
    #[serde(alias = "blood_pressure_systolic")]
    pub systolic: i32,
    #[serde(alias = "blood_pressure_diastolic")]
    pub diastolic: i32,
    pub blood_glucose: f64,
    /// Derived from the patient's profile when absent.
    pub bmi: Option<f64>,
}

#[derive(Serialize)]
pub struct Created<T: Serialize> {
    #[serde(flatten)]
    pub item: T,
    pub alerts: Vec<Alert>,
}

fn validate_bp(systolic: i32, diastolic: i32) -> Result<(), ApiError> {
    if systolic <= 0 {
        return Err(ApiError::invalid("systolic", "systolic must be positive"));
    }
    if diastolic <= 0 {
        return Err(ApiError::invalid("diastolic", "diastolic must be positive"));
    }
    Ok(())
}

/// Store a vital and the alerts it raises in one transaction, then hand
/// the alerts to the push transport. Either both land or neither does.
fn store_and_alert(
    ctx: &ApiContext,
    conn: &Connection,
    patient_id: &Uuid,
    insert: impl FnOnce(&Connection) -> Result<(), DatabaseError>,
    events: &[alerts::AlertEvent],
) -> Result<Vec<Alert>, ApiError> {
    let tx = conn.unchecked_transaction()?;
    insert(&tx)?;
    let raised = alerts::raise_alerts(&tx, patient_id, events)?;
    tx.commit()?;

    for alert in &raised {
        notification::push_alert(conn, ctx.core.notifier(), alert);
    }
    Ok(raised)
}

/// `POST /api/records`: patients for themselves, providers for an
/// assigned patient.
pub async fn create_record(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateRecord>,
) -> Result<(StatusCode, Json<Created<HealthRecord>>), ApiError> {
    let caller = auth.require_caller()?;
    authorization::ensure_can_write_health_record(&caller)?;
    validate_bp(req.systolic, req.diastolic)?;
    if !req.blood_glucose.is_finite() || req.blood_glucose < 0.0 {
        return Err(ApiError::invalid("blood_glucose", "blood_glucose must be a non-negative number"));
    }

    let conn = ctx.core.open_db()?;
    let patient_id = target_patient(&conn, &auth, req.patient_id)?;

    let bmi = match req.bmi {
        Some(b) if b.is_finite() && b > 0.0 => b,
        Some(_) => return Err(ApiError::invalid("bmi", "bmi must be a positive number")),
        None => repository::get_profile(&conn, &patient_id)?
            .and_then(|p| risk::bmi(p.weight_kg, p.height_cm))
            .map_or(0.0, |b| risk::round_to(b, 2)),
    };

    let record = HealthRecord {
        id: Uuid::new_v4(),
        patient_id,
        systolic: req.systolic,
        diastolic: req.diastolic,
        blood_glucose: req.blood_glucose,
        bmi,
        timestamp: now_utc(),
    };
    let raised = store_and_alert(
        &ctx,
        &conn,
        &patient_id,
        |tx| repository::insert_health_record(tx, &record),
        &alerts::evaluate_record(&record),
    )?;
    ctx.core
        .record_audit(&conn, Some(&auth.account.id), "HealthRecord", &record.id, AuditAction::Create);
    Ok((StatusCode::CREATED, Json(Created { item: record, alerts: raised })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReadingListQuery {
    pub patient_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub reading_type: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<u32>,
}

impl ReadingListQuery {
    fn filter(&self) -> Result<ReadingFilter, ApiError> {
        let reading_type = self
            .reading_type
            .as_deref()
            .map(|t| ReadingType::from_str(t).map_err(|_| ApiError::invalid("type", format!("Unknown reading type: {t}"))))
            .transpose()?;
        let bound = |field: &str, value: &Option<String>| {
            value
                .as_deref()
                .map(|s| parse_datetime(s).ok_or_else(|| ApiError::invalid(field, format!("Invalid {field} timestamp"))))
                .transpose()
        };
        Ok(ReadingFilter {
            reading_type,
            from: bound("from", &self.from)?,
            to: bound("to", &self.to)?,
            limit: self.limit.filter(|l| *l > 0),
        })
    }
}

/// `GET /api/device-readings?type=&from=&to=&limit=`: newest first.
pub async fn list_readings(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ReadingListQuery>,
) -> Result<Json<Vec<DeviceReading>>, ApiError> {
    let filter = query.filter()?;
    let conn = ctx.core.open_db()?;
    let scope = scope_for(&conn, &auth)?;
    let ids = scoped_ids(&conn, &scope, query.patient_id)?;
    Ok(Json(repository::list_device_readings(&conn, &ids, &filter)?))
}

#[derive(Debug, Deserialize)]
pub struct CreateReading {
    pub patient_id: Option<Uuid>,
    #[serde(alias = "type")]
    pub reading_type: ReadingType,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
    pub source: Option<String>,
    pub recorded_at: Option<String>,
}

impl CreateReading {
    fn into_reading(self, patient_id: Uuid) -> Result<DeviceReading, ApiError> {
        let (value, systolic, diastolic) = match self.reading_type {
            ReadingType::BloodPressure => {
                let (Some(sys), Some(dia)) = (self.systolic, self.diastolic) else {
                    let missing: Vec<String> = [("systolic", self.systolic), ("diastolic", self.diastolic)]
                        .into_iter()
                        .filter(|(_, v)| v.is_none())
                        .map(|(f, _)| f.to_string())
                        .collect();
                    return Err(ApiError::Validation {
                        message: format!("Missing required fields: {}", missing.join(", ")),
                        fields: missing,
                    });
                };
                validate_bp(sys, dia)?;
                (self.value.unwrap_or(0.0), Some(sys), Some(dia))
            }
            _ => {
                let value = self
                    .value
                    .ok_or_else(|| ApiError::invalid("value", "value is required"))?;
                (value, None, None)
            }
        };
        if !value.is_finite() {
            return Err(ApiError::invalid("value", "value must be a number"));
        }
        let recorded_at = match self.recorded_at.as_deref() {
            Some(s) => parse_datetime(s)
                .ok_or_else(|| ApiError::invalid("recorded_at", "Invalid recorded_at timestamp"))?,
            None => now_utc(),
        };

        Ok(DeviceReading {
            id: Uuid::new_v4(),
            patient_id,
            reading_type: self.reading_type,
            value,
            unit: self
                .unit
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| self.reading_type.default_unit().to_string()),
            systolic,
            diastolic,
            source: self.source.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| "manual".into()),
            recorded_at,
        })
    }
}

/// `POST /api/device-readings`: any role within scope.
pub async fn create_reading(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateReading>,
) -> Result<(StatusCode, Json<Created<DeviceReading>>), ApiError> {
    let conn = ctx.core.open_db()?;
    let patient_id = target_patient(&conn, &auth, req.patient_id)?;
    let reading = req.into_reading(patient_id)?;

    let raised = store_and_alert(
        &ctx,
        &conn,
        &patient_id,
        |tx| repository::insert_device_reading(tx, &reading),
        &alerts::evaluate_reading(&reading),
    )?;
    ctx.core
        .record_audit(&conn, Some(&auth.account.id), "DeviceReading", &reading.id, AuditAction::Create);
    Ok((StatusCode::CREATED, Json(Created { item: reading, alerts: raised })))
}
