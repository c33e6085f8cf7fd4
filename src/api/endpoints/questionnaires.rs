//! Questionnaire responses and templates.
//!
//! - `GET|POST /api/questionnaires`
//! - `GET /api/questionnaires/my`
//! - `GET|POST /api/questionnaire-templates`
//!
//! The two response listings never fail the screen: errors are logged
//! and an empty list is returned.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use super::{required_text, scope_for, target_patient};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext, LimitQuery};
use crate::authorization::{self, Caller};
use crate::db::repository;
use crate::db::now_utc;
use crate::models::{AuditAction, QuestionnaireResponse, QuestionnaireTemplate, Role};

fn scoped_responses(
    conn: &Connection,
    auth: &AuthContext,
    limit: Option<u32>,
) -> Result<Vec<QuestionnaireResponse>, ApiError> {
    let scope = scope_for(conn, auth)?;
    Ok(repository::list_questionnaire_responses(conn, scope.patient_ids(), limit)?)
}

/// `GET /api/questionnaires`: responses across the caller's scope.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<QuestionnaireResponse>> {
    let result = ctx
        .core
        .open_db()
        .map_err(ApiError::from)
        .and_then(|conn| scoped_responses(&conn, &auth, query.limit()));
    match result {
        Ok(responses) => Json(responses),
        Err(e) => {
            tracing::warn!(account = %auth.account.id, error = %e, "Questionnaire listing suppressed");
            Json(Vec::new())
        }
    }
}

fn own_responses(conn: &Connection, auth: &AuthContext) -> Result<Vec<QuestionnaireResponse>, ApiError> {
    let Some(profile) = auth.profile.as_ref() else {
        return Ok(Vec::new());
    };
    Ok(repository::list_questionnaire_responses(conn, &[profile.id], None)?)
}

/// `GET /api/questionnaires/my`: the caller's own responses.
pub async fn my(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Json<Vec<QuestionnaireResponse>> {
    let result = ctx
        .core
        .open_db()
        .map_err(ApiError::from)
        .and_then(|conn| own_responses(&conn, &auth));
    match result {
        Ok(responses) => Json(responses),
        Err(e) => {
            tracing::warn!(account = %auth.account.id, error = %e, "Own questionnaire listing suppressed");
            Json(Vec::new())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuestionnaire {
    pub patient_id: Option<Uuid>,
    pub category: Option<String>,
    pub answers: Option<serde_json::Value>,
}

/// `POST /api/questionnaires`: patients and community workers only.
pub async fn submit(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<SubmitQuestionnaire>,
) -> Result<(StatusCode, Json<QuestionnaireResponse>), ApiError> {
    let caller: Caller = auth.require_caller()?;
    authorization::ensure_can_submit_questionnaire(&caller)?;
    let category = required_text(req.category, "category")?;
    let answers = match req.answers {
        Some(v @ serde_json::Value::Object(_)) => v,
        Some(_) => return Err(ApiError::invalid("answers", "answers must be an object")),
        None => return Err(ApiError::invalid("answers", "answers is required")),
    };

    let conn = ctx.core.open_db()?;
    let patient_id = target_patient(&conn, &auth, req.patient_id)?;
    let response = QuestionnaireResponse {
        id: Uuid::new_v4(),
        patient_id,
        category,
        answers,
        submitted_at: now_utc(),
    };
    repository::insert_questionnaire_response(&conn, &response)?;
    ctx.core.record_audit(
        &conn,
        Some(&auth.account.id),
        "QuestionnaireResponse",
        &response.id,
        AuditAction::Create,
    );

    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /api/questionnaire-templates`
pub async fn list_templates(
    State(ctx): State<ApiContext>,
) -> Result<Json<Vec<QuestionnaireTemplate>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_questionnaire_templates(&conn)?))
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub schema: Option<serde_json::Value>,
}

/// `POST /api/questionnaire-templates`: providers only.
pub async fn create_template(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTemplate>,
) -> Result<(StatusCode, Json<QuestionnaireTemplate>), ApiError> {
    authorization::ensure_role(&auth.require_caller()?, Role::Provider)?;
    let name = required_text(req.name, "name")?;
    let schema = req.schema.ok_or_else(|| ApiError::invalid("schema", "schema is required"))?;

    let template = QuestionnaireTemplate {
        id: Uuid::new_v4(),
        name,
        category: req
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "general".into()),
        schema,
        created_at: now_utc(),
    };
    let conn = ctx.core.open_db()?;
    repository::insert_questionnaire_template(&conn, &template)?;
    Ok((StatusCode::CREATED, Json(template)))
}
