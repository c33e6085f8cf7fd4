//! Push devices, the notification feed and the audit trail.
//!
//! - `GET|POST /api/push-devices`
//! - `POST /api/push-devices/send-test`
//! - `GET /api/notifications`
//! - `GET /api/audit-logs`: providers only

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::required_text;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext, LimitQuery};
use crate::authorization;
use crate::db::repository;
use crate::db::now_utc;
use crate::models::{Alert, Appointment, AppointmentStatus, AuditEntry, Medication, Platform, PushDevice, Role};
use crate::notification::SendOutcome;

const FEED_LIMIT: u32 = 50;
const DEFAULT_AUDIT_LIMIT: u32 = 100;

// ═══════════════════════════════════════════════════════════
// Push devices
// ═══════════════════════════════════════════════════════════

/// `GET /api/push-devices`: the caller's registered devices.
pub async fn list_devices(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<PushDevice>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_push_devices(&conn, &auth.account.id)?))
}

#[derive(Debug, Deserialize)]
pub struct RegisterDevice {
    pub token: Option<String>,
    pub platform: Platform,
}

/// `POST /api/push-devices`: re-registering a token moves it to the caller.
pub async fn register_device(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<RegisterDevice>,
) -> Result<(StatusCode, Json<PushDevice>), ApiError> {
    let token = required_text(req.token, "token")?;
    let conn = ctx.core.open_db()?;
    let device = repository::upsert_push_device(
        &conn,
        &PushDevice {
            id: Uuid::new_v4(),
            account_id: auth.account.id,
            token,
            platform: req.platform,
            created_at: now_utc(),
        },
    )?;
    tracing::info!(account = %auth.account.id, platform = %device.platform, "Push device registered");
    Ok((StatusCode::CREATED, Json(device)))
}

#[derive(Debug, Deserialize)]
pub struct SendTest {
    pub token: Option<String>,
}

/// `POST /api/push-devices/send-test`: delivery failures are reported
/// in the body, not as an HTTP error.
pub async fn send_test(
    State(ctx): State<ApiContext>,
    Json(req): Json<SendTest>,
) -> Result<Json<SendOutcome>, ApiError> {
    let token = req
        .token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("token is required".into()))?;
    let outcome = ctx
        .core
        .notifier()
        .send(&token, "Test Notification", "Hello from NCD App!", &json!({ "type": "test" }))
        .await;
    Ok(Json(outcome))
}

// ═══════════════════════════════════════════════════════════
// Feed
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct NotificationFeed {
    pub alerts: Vec<Alert>,
    pub upcoming_appointments: Vec<Appointment>,
    pub medication_reminders: Vec<Medication>,
}

/// `GET /api/notifications`: the caller's own open alerts, upcoming
/// appointments and medications.
pub async fn feed(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<NotificationFeed>, ApiError> {
    let profile = auth.require_profile()?;
    let ids = std::slice::from_ref(&profile.id);
    let conn = ctx.core.open_db()?;

    let now = now_utc();
    let upcoming_appointments = repository::list_appointments(
        &conn,
        ids,
        Some(AppointmentStatus::Scheduled),
        Some(FEED_LIMIT),
    )?
    .into_iter()
    .filter(|a| a.scheduled_for >= now)
    .collect();

    Ok(Json(NotificationFeed {
        alerts: repository::list_alerts(&conn, ids, true, Some(FEED_LIMIT))?,
        upcoming_appointments,
        medication_reminders: repository::list_medications(&conn, ids, Some(FEED_LIMIT))?,
    }))
}

// ═══════════════════════════════════════════════════════════
// Audit trail
// ═══════════════════════════════════════════════════════════

/// `GET /api/audit-logs`: newest first, `?limit=` (default 100).
pub async fn audit_logs(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    authorization::ensure_role(&auth.require_caller()?, Role::Provider)?;
    let conn = ctx.core.open_db()?;
    let limit = query.limit().unwrap_or(DEFAULT_AUDIT_LIMIT);
    Ok(Json(repository::list_audit_entries(&conn, limit)?))
}
