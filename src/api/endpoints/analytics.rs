//! Reading analytics for one patient.
//!
//! - `GET /api/analytics`: glucose and BP summary
//! - `GET /api/analytics/timeseries`: oldest first, `?limit=` (default 100)
//! - `GET /api/analytics/report`: daily aggregates and counts
//! - `GET /api/analytics/weekly`
//! - `GET /api/analytics/export`: CSV attachment
//!
//! Patients get their own data; other roles pass `?patient_id=` and must
//! have the patient in scope.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use super::target_patient;
use crate::analytics::{self, Report, Summary, TimeSeries, Weekly, DEFAULT_TIMESERIES_LIMIT};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext, PatientQuery};
use crate::models::DeviceReading;

fn readings_for(
    ctx: &ApiContext,
    auth: &AuthContext,
    patient_id: Option<Uuid>,
) -> Result<Vec<DeviceReading>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patient_id = target_patient(&conn, auth, patient_id)?;
    Ok(analytics::patient_readings(&conn, &patient_id)?)
}

/// `GET /api/analytics`
pub async fn summary(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<Summary>, ApiError> {
    let readings = readings_for(&ctx, &auth, query.patient_id)?;
    Ok(Json(analytics::summarize(&readings)))
}

#[derive(Debug, Default, Deserialize)]
pub struct TimeSeriesQuery {
    pub patient_id: Option<Uuid>,
    pub limit: Option<u32>,
}

fn load_timeseries(conn: &Connection, auth: &AuthContext, query: &TimeSeriesQuery) -> Result<TimeSeries, ApiError> {
    let patient_id = target_patient(conn, auth, query.patient_id)?;
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_TIMESERIES_LIMIT);
    Ok(analytics::timeseries(conn, &patient_id, limit)?)
}

/// `GET /api/analytics/timeseries`
pub async fn timeseries(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<TimeSeriesQuery>,
) -> Result<Json<TimeSeries>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(load_timeseries(&conn, &auth, &query)?))
}

/// `GET /api/analytics/report`
pub async fn report(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<Report>, ApiError> {
    let readings = readings_for(&ctx, &auth, query.patient_id)?;
    Ok(Json(analytics::report(&readings)))
}

/// `GET /api/analytics/weekly`
pub async fn weekly(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<Weekly>, ApiError> {
    let readings = readings_for(&ctx, &auth, query.patient_id)?;
    Ok(Json(analytics::weekly(&readings)))
}

/// `GET /api/analytics/export`: newest first.
pub async fn export_csv(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<PatientQuery>,
) -> Result<Response, ApiError> {
    let readings = readings_for(&ctx, &auth, query.patient_id)?;
    let body = analytics::readings_csv(&readings);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"readings.csv\""),
        ],
        body,
    )
        .into_response())
}
