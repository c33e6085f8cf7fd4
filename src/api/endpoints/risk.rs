//! Risk endpoints. All of them score against the latest health record
//! and answer 404 when the patient has none.
//!
//! - `GET /api/risk/me`, `GET /api/risk/:patient_id`: additive scores
//! - `GET /api/risk-ml/me`, `GET /api/risk-ml/:patient_id`: 0-100 composite
//! - `GET /api/risk-ada/me`: ADA-style questionnaire score
//! - `GET /api/recommendations`: lifestyle tips

use axum::extract::{Path, State};
use axum::{Extension, Json};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::{scoped_patient, username_of};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository;
use crate::models::{HealthRecord, PatientProfile};
use crate::recommendations::recommendations as tips_for;
use crate::risk::{self, AdaAssessment, CompositeRisk, RiskAssessment};

/// Any risk payload, tagged with the patient's username.
#[derive(Serialize)]
pub struct PatientScoped<T: Serialize> {
    pub patient: String,
    #[serde(flatten)]
    pub body: T,
}

fn latest_record(conn: &Connection, profile: &PatientProfile) -> Result<Option<HealthRecord>, ApiError> {
    Ok(repository::get_latest_health_record(conn, &profile.id)?)
}

fn own_profile(auth: &AuthContext) -> Result<(String, PatientProfile), ApiError> {
    let profile = auth.require_profile()?.clone();
    Ok((auth.account.username.clone(), profile))
}

fn other_profile(
    conn: &Connection,
    auth: &AuthContext,
    patient_id: &Uuid,
) -> Result<(String, PatientProfile), ApiError> {
    let profile = scoped_patient(conn, auth, patient_id)?;
    Ok((username_of(conn, &profile)?, profile))
}

fn formula_scores(
    conn: &Connection,
    (patient, profile): (String, PatientProfile),
) -> Result<PatientScoped<RiskAssessment>, ApiError> {
    let latest = latest_record(conn, &profile)?;
    let body = risk::assess(&profile, latest.as_ref())?;
    Ok(PatientScoped { patient, body })
}

fn composite(
    ctx: &ApiContext,
    conn: &Connection,
    (patient, profile): (String, PatientProfile),
) -> Result<PatientScoped<CompositeRisk>, ApiError> {
    let latest = latest_record(conn, &profile)?;
    let body = risk::composite_risk(&profile, latest.as_ref(), ctx.core.risk_model())?;
    Ok(PatientScoped { patient, body })
}

/// `GET /api/risk/me`
pub async fn risk_me(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<PatientScoped<RiskAssessment>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(formula_scores(&conn, own_profile(&auth)?)?))
}

/// `GET /api/risk/:patient_id`
pub async fn risk_for(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<PatientScoped<RiskAssessment>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let target = other_profile(&conn, &auth, &patient_id)?;
    Ok(Json(formula_scores(&conn, target)?))
}

/// `GET /api/risk-ml/me`
pub async fn risk_ml_me(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<PatientScoped<CompositeRisk>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(composite(&ctx, &conn, own_profile(&auth)?)?))
}

/// `GET /api/risk-ml/:patient_id`
pub async fn risk_ml_for(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<PatientScoped<CompositeRisk>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let target = other_profile(&conn, &auth, &patient_id)?;
    Ok(Json(composite(&ctx, &conn, target)?))
}

/// `GET /api/risk-ada/me`: works without a record; hypertension is
/// then assumed absent.
pub async fn risk_ada_me(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<PatientScoped<AdaAssessment>>, ApiError> {
    let (patient, profile) = own_profile(&auth)?;
    let conn = ctx.core.open_db()?;
    let latest = latest_record(&conn, &profile)?;
    let responses = repository::list_questionnaire_responses(&conn, &[profile.id], None)?;
    let body = risk::ada_self_assessment(&profile, latest.as_ref(), &responses);
    Ok(Json(PatientScoped { patient, body }))
}

#[derive(Serialize)]
pub struct RecommendationsResponse {
    pub patient: String,
    pub recommendations: Vec<&'static str>,
}

/// `GET /api/recommendations`
pub async fn recommendations(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<RecommendationsResponse>, ApiError> {
    let (patient, profile) = own_profile(&auth)?;
    let conn = ctx.core.open_db()?;
    let latest = latest_record(&conn, &profile)?;
    Ok(Json(RecommendationsResponse {
        patient,
        recommendations: tips_for(&profile, latest.as_ref()),
    }))
}
