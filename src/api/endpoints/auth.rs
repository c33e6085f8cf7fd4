//! Registration, login and logout.
//!
//! - `POST /api/register`: public
//! - `POST /api/login`: public, returns the bearer token
//! - `POST /api/logout`: ends the current session

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::{self, RegisterRequest};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::models::{PatientProfile, Role};

#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub username: String,
    pub role: Role,
    pub profile_id: Uuid,
}

/// `POST /api/register`: create an account and its profile.
pub async fn register(
    State(ctx): State<ApiContext>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let conn = ctx.core.open_db()?;
    let registered = accounts::register(&conn, &req)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User and profile created successfully",
            username: registered.account.username,
            role: registered.profile.role,
            profile_id: registered.profile.id,
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: Role,
    pub profile: PatientProfile,
}

/// `POST /api/login`: exchange credentials for a bearer token.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let mut missing = Vec::new();
    if req.username.as_deref().map_or(true, |u| u.trim().is_empty()) {
        missing.push("username".to_string());
    }
    if req.password.as_deref().map_or(true, str::is_empty) {
        missing.push("password".to_string());
    }
    if !missing.is_empty() {
        return Err(ApiError::Validation {
            message: format!("Missing required fields: {}", missing.join(", ")),
            fields: missing,
        });
    }

    let conn = ctx.core.open_db()?;
    let session = accounts::login(
        &conn,
        req.username.as_deref().unwrap_or_default(),
        req.password.as_deref().unwrap_or_default(),
    )?;

    Ok(Json(LoginResponse {
        token: session.token,
        username: session.account.username,
        role: session.profile.role,
        profile: session.profile,
    }))
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// `POST /api/logout`: revoke the token used for this request.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<MessageResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    accounts::logout(&conn, &auth.token)?;
    tracing::info!(account = %auth.account.id, "Logout");
    Ok(Json(MessageResponse { message: "Logged out successfully" }))
}
