//! `GET /api/export?patient_id=`: consent-gated bulk export for providers.

use axum::extract::{Query, State};
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext, PatientQuery};
use crate::export::{self, PatientExport};
use crate::models::AuditAction;

pub async fn patient_export(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<PatientExport>, ApiError> {
    let patient_id = query
        .patient_id
        .ok_or_else(|| ApiError::BadRequest("patient_id is required".into()))?;
    let caller = auth.require_caller()?;

    let conn = ctx.core.open_db()?;
    let data = export::export_patient(&conn, &caller, &patient_id)?;
    ctx.core
        .record_audit(&conn, Some(&auth.account.id), "PatientExport", &patient_id, AuditAction::Create);
    Ok(Json(data))
}
