//! Alert endpoints.
//!
//! - `GET /api/alerts`: newest first, `?unresolved=true` to filter
//! - `POST /api/alerts/:id/acknowledge`
//! - `POST /api/alerts/:id/snooze`

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{scope_for, scoped_ids};
use crate::alerts;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository;
use crate::models::Alert;

#[derive(Debug, Default, Deserialize)]
pub struct AlertListQuery {
    pub patient_id: Option<Uuid>,
    pub unresolved: Option<bool>,
    pub limit: Option<u32>,
}

/// `GET /api/alerts`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AlertListQuery>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let scope = scope_for(&conn, &auth)?;
    let ids = scoped_ids(&conn, &scope, query.patient_id)?;
    let alerts = repository::list_alerts(
        &conn,
        &ids,
        query.unresolved.unwrap_or(false),
        query.limit.filter(|l| *l > 0),
    )?;
    Ok(Json(alerts))
}

#[derive(Serialize)]
pub struct AcknowledgeResponse {
    pub status: &'static str,
    pub alert: Alert,
}

/// `POST /api/alerts/:id/acknowledge`: idempotent.
pub async fn acknowledge(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(alert_id): Path<Uuid>,
) -> Result<Json<AcknowledgeResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let scope = scope_for(&conn, &auth)?;
    let alert = alerts::acknowledge(&conn, &scope, &alert_id)?;
    Ok(Json(AcknowledgeResponse { status: "acknowledged", alert }))
}

#[derive(Serialize)]
pub struct SnoozeResponse {
    pub status: &'static str,
    pub follow_up: Alert,
}

/// `POST /api/alerts/:id/snooze`: resolves and creates one follow-up.
pub async fn snooze(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(alert_id): Path<Uuid>,
) -> Result<Json<SnoozeResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let scope = scope_for(&conn, &auth)?;
    let follow_up = alerts::snooze(&conn, &scope, &alert_id)?;
    Ok(Json(SnoozeResponse { status: "snoozed", follow_up }))
}
