//! Data-share consents.
//!
//! - `GET /api/consents`: rows where the caller is patient or provider
//! - `POST /api/consents`: patients grant or revoke for one provider

use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::authorization;
use crate::db::repository;
use crate::models::{DataShareConsent, Role};

/// `GET /api/consents`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<DataShareConsent>>, ApiError> {
    let Some(profile) = auth.profile.as_ref() else {
        return Ok(Json(Vec::new()));
    };
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_consents_for(&conn, &profile.id)?))
}

#[derive(Debug, Deserialize)]
pub struct ConsentRequest {
    #[serde(alias = "provider")]
    pub provider_id: Uuid,
    pub granted: bool,
}

/// `POST /api/consents`: upsert; revoking clears `granted_at`.
pub async fn upsert(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ConsentRequest>,
) -> Result<Json<DataShareConsent>, ApiError> {
    let caller = auth.require_caller()?;
    authorization::ensure_role(&caller, Role::Patient)?;

    let conn = ctx.core.open_db()?;
    let provider = repository::get_profile(&conn, &req.provider_id)?
        .ok_or_else(|| ApiError::NotFound("Provider not found".into()))?;
    if provider.role != Role::Provider {
        return Err(ApiError::invalid("provider_id", "Consent can only be given to a provider"));
    }

    let consent = repository::upsert_consent(&conn, &caller.profile_id, &provider.id, req.granted)?;
    tracing::info!(
        patient = %caller.profile_id,
        provider = %provider.id,
        granted = req.granted,
        "Data-share consent updated"
    );
    Ok(Json(consent))
}
