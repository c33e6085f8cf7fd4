//! Medications and appointments.
//!
//! - `GET|POST /api/medications`
//! - `GET|POST /api/appointments`: `GET` accepts `?status=`

use std::str::FromStr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::{parse_datetime, required_text, scope_for, scoped_ids, target_patient};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository::{self, parse_reminder_time};
use crate::db::now_utc;
use crate::models::{Appointment, AppointmentStatus, AuditAction, Medication};

// ═══════════════════════════════════════════════════════════
// Medications
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct MedicationListQuery {
    pub patient_id: Option<Uuid>,
    pub limit: Option<u32>,
}

/// `GET /api/medications`: newest first.
pub async fn list_medications(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<MedicationListQuery>,
) -> Result<Json<Vec<Medication>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let scope = scope_for(&conn, &auth)?;
    let ids = scoped_ids(&conn, &scope, query.patient_id)?;
    Ok(Json(repository::list_medications(&conn, &ids, query.limit.filter(|l| *l > 0))?))
}

#[derive(Debug, Deserialize)]
pub struct CreateMedication {
    pub patient_id: Option<Uuid>,
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    /// `HH:MM` or `HH:MM:SS`, local time.
    pub reminder_time: Option<String>,
}

/// `POST /api/medications`
pub async fn create_medication(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateMedication>,
) -> Result<(StatusCode, Json<Medication>), ApiError> {
    let name = required_text(req.name, "name")?;
    let dosage = required_text(req.dosage, "dosage")?;
    let frequency = required_text(req.frequency, "frequency")?;
    let reminder_time = required_text(req.reminder_time, "reminder_time")?;
    let reminder_time = parse_reminder_time(&reminder_time)
        .ok_or_else(|| ApiError::invalid("reminder_time", "reminder_time must be HH:MM"))?;

    let conn = ctx.core.open_db()?;
    let patient_id = target_patient(&conn, &auth, req.patient_id)?;
    let med = Medication {
        id: Uuid::new_v4(),
        patient_id,
        name,
        dosage,
        frequency,
        reminder_time,
    };
    repository::insert_medication(&conn, &med)?;
    ctx.core
        .record_audit(&conn, Some(&auth.account.id), "Medication", &med.id, AuditAction::Create);

    Ok((StatusCode::CREATED, Json(med)))
}

// ═══════════════════════════════════════════════════════════
// Appointments
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub patient_id: Option<Uuid>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}

fn parse_status(s: &str) -> Result<AppointmentStatus, ApiError> {
    AppointmentStatus::from_str(s.trim())
        .map_err(|_| ApiError::invalid("status", format!("Unknown appointment status: {s}")))
}

/// `GET /api/appointments`: soonest first.
pub async fn list_appointments(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let conn = ctx.core.open_db()?;
    let scope = scope_for(&conn, &auth)?;
    let ids = scoped_ids(&conn, &scope, query.patient_id)?;
    Ok(Json(repository::list_appointments(
        &conn,
        &ids,
        status,
        query.limit.filter(|l| *l > 0),
    )?))
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointment {
    pub patient_id: Option<Uuid>,
    pub title: Option<String>,
    pub scheduled_for: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

/// `POST /api/appointments`
pub async fn create_appointment(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateAppointment>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let title = required_text(req.title, "title")?;
    let scheduled_for = required_text(req.scheduled_for, "scheduled_for")?;
    let scheduled_for = parse_datetime(&scheduled_for)
        .ok_or_else(|| ApiError::invalid("scheduled_for", "scheduled_for must be an ISO-8601 timestamp"))?;
    let status = match req.status.as_deref() {
        Some(s) => parse_status(s)?,
        None => AppointmentStatus::Scheduled,
    };

    let conn = ctx.core.open_db()?;
    let patient_id = target_patient(&conn, &auth, req.patient_id)?;
    let appt = Appointment {
        id: Uuid::new_v4(),
        patient_id,
        title,
        scheduled_for,
        notes: req.notes.unwrap_or_default(),
        status,
        created_at: now_utc(),
    };
    repository::insert_appointment(&conn, &appt)?;
    ctx.core
        .record_audit(&conn, Some(&auth.account.id), "Appointment", &appt.id, AuditAction::Create);

    Ok((StatusCode::CREATED, Json(appt)))
}
