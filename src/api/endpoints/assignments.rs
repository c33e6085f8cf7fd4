//! Care assignments. Providers manage `/api/assignments`, community
//! workers manage `/api/worker-assignments`; both only ever for
//! themselves.
//!
//! - `GET|POST /assignments`
//! - `GET /assignments/my-patients`
//! - `DELETE /assignments/:patient_id`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::authorization::{self, Caller};
use crate::db::repository;
use crate::models::{AssignmentKind, CareAssignment, PatientProfile, Role};

fn carer_role(kind: AssignmentKind) -> Role {
    match kind {
        AssignmentKind::Provider => Role::Provider,
        AssignmentKind::Worker => Role::Worker,
    }
}

fn carer(auth: &AuthContext, kind: AssignmentKind) -> Result<Caller, ApiError> {
    let caller = auth.require_caller()?;
    authorization::ensure_role(&caller, carer_role(kind))?;
    Ok(caller)
}

fn list_for(ctx: &ApiContext, auth: &AuthContext, kind: AssignmentKind) -> Result<Vec<CareAssignment>, ApiError> {
    let caller = carer(auth, kind)?;
    let conn = ctx.core.open_db()?;
    Ok(repository::list_assignments(&conn, kind, &caller.profile_id)?)
}

fn my_patients_for(
    ctx: &ApiContext,
    auth: &AuthContext,
    kind: AssignmentKind,
) -> Result<Vec<PatientProfile>, ApiError> {
    let caller = carer(auth, kind)?;
    let conn = ctx.core.open_db()?;
    let ids = repository::list_assigned_patient_ids(&conn, kind, &caller.profile_id)?;
    Ok(repository::list_profiles(&conn, &ids)?)
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    #[serde(alias = "patient")]
    pub patient_id: Uuid,
}

fn assign(
    ctx: &ApiContext,
    auth: &AuthContext,
    kind: AssignmentKind,
    patient_id: &Uuid,
) -> Result<CareAssignment, ApiError> {
    let caller = carer(auth, kind)?;
    let conn = ctx.core.open_db()?;
    let patient = repository::get_profile(&conn, patient_id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
    if patient.role != Role::Patient {
        return Err(ApiError::invalid("patient_id", "Only patients can be assigned"));
    }
    match repository::insert_assignment(&conn, kind, &caller.profile_id, patient_id) {
        Ok(assignment) => {
            tracing::info!(carer = %caller.profile_id, patient = %patient_id, ?kind, "Patient assigned");
            Ok(assignment)
        }
        Err(e) if e.is_unique_violation() => {
            Err(ApiError::invalid("patient_id", "Patient is already assigned"))
        }
        Err(e) => Err(e.into()),
    }
}

fn unassign(ctx: &ApiContext, auth: &AuthContext, kind: AssignmentKind, patient_id: &Uuid) -> Result<(), ApiError> {
    let caller = carer(auth, kind)?;
    let conn = ctx.core.open_db()?;
    if !repository::delete_assignment(&conn, kind, &caller.profile_id, patient_id)? {
        return Err(ApiError::NotFound("Assignment not found".into()));
    }
    tracing::info!(carer = %caller.profile_id, patient = %patient_id, ?kind, "Patient unassigned");
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Provider assignments
// ═══════════════════════════════════════════════════════════

pub async fn provider_list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<CareAssignment>>, ApiError> {
    Ok(Json(list_for(&ctx, &auth, AssignmentKind::Provider)?))
}

pub async fn provider_assign(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<AssignRequest>,
) -> Result<(StatusCode, Json<CareAssignment>), ApiError> {
    let assignment = assign(&ctx, &auth, AssignmentKind::Provider, &req.patient_id)?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn provider_my_patients(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<PatientProfile>>, ApiError> {
    Ok(Json(my_patients_for(&ctx, &auth, AssignmentKind::Provider)?))
}

pub async fn provider_unassign(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    unassign(&ctx, &auth, AssignmentKind::Provider, &patient_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ═══════════════════════════════════════════════════════════
// Worker assignments
// ═══════════════════════════════════════════════════════════

pub async fn worker_list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<CareAssignment>>, ApiError> {
    Ok(Json(list_for(&ctx, &auth, AssignmentKind::Worker)?))
}

pub async fn worker_assign(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<AssignRequest>,
) -> Result<(StatusCode, Json<CareAssignment>), ApiError> {
    let assignment = assign(&ctx, &auth, AssignmentKind::Worker, &req.patient_id)?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn worker_my_patients(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<PatientProfile>>, ApiError> {
    Ok(Json(my_patients_for(&ctx, &auth, AssignmentKind::Worker)?))
}

pub async fn worker_unassign(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    unassign(&ctx, &auth, AssignmentKind::Worker, &patient_id)?;
    Ok(StatusCode::NO_CONTENT)
}
