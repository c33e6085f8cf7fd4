//! API endpoint handlers.
//!
//! Each module corresponds to one resource. Handlers stay thin: resolve
//! the caller's scope, call into the domain modules, shape the JSON.

pub mod alerts;
pub mod analytics;
pub mod assignments;
pub mod auth;
pub mod care_plan;
pub mod consents;
pub mod export;
pub mod health;
pub mod notifications;
pub mod profiles;
pub mod questionnaires;
pub mod quizzes;
pub mod records;
pub mod risk;

use chrono::{DateTime, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::AuthContext;
use crate::authorization::{self, AccessScope};
use crate::db::repository;
use crate::models::PatientProfile;

/// Scope for the current request. Recomputed every time.
pub(crate) fn scope_for(conn: &Connection, auth: &AuthContext) -> Result<AccessScope, ApiError> {
    Ok(authorization::resolve_scope(conn, auth.caller().as_ref())?)
}

/// Patient ids a list endpoint reads from: the whole scope, or one
/// requested patient that must be inside it.
pub(crate) fn scoped_ids(
    conn: &Connection,
    scope: &AccessScope,
    requested: Option<Uuid>,
) -> Result<Vec<Uuid>, ApiError> {
    match requested {
        Some(id) => {
            authorization::ensure_in_scope(conn, scope, &id)?;
            Ok(vec![id])
        }
        None => Ok(scope.patient_ids().to_vec()),
    }
}

/// Load one patient the caller may see.
pub(crate) fn scoped_patient(
    conn: &Connection,
    auth: &AuthContext,
    patient_id: &Uuid,
) -> Result<PatientProfile, ApiError> {
    let scope = scope_for(conn, auth)?;
    authorization::ensure_in_scope(conn, &scope, patient_id)?;
    repository::get_profile(conn, patient_id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))
}

/// Patient a write or per-patient read applies to. Patients default to
/// themselves, carers must name an in-scope patient.
pub(crate) fn target_patient(
    conn: &Connection,
    auth: &AuthContext,
    requested: Option<Uuid>,
) -> Result<Uuid, ApiError> {
    let caller = auth.require_caller()?;
    let scope = authorization::resolve_scope(conn, Some(&caller))?;
    Ok(authorization::resolve_write_target(conn, &caller, &scope, requested)?)
}

pub(crate) fn username_of(conn: &Connection, profile: &PatientProfile) -> Result<String, ApiError> {
    Ok(repository::get_account(conn, &profile.account_id)?
        .map(|a| a.username)
        .unwrap_or_default())
}

/// Accepts RFC 3339 (`2026-01-05T08:00:00Z`), ISO without offset, or the
/// storage format. Offsets are converted to UTC.
pub(crate) fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").ok())
        .or_else(|| crate::db::parse_timestamp(s))
}

pub(crate) fn required_text(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::invalid(field, format!("{field} is required")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_formats() {
        let expected = NaiveDateTime::parse_from_str("2026-01-05 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(parse_datetime("2026-01-05T08:00:00Z"), Some(expected));
        assert_eq!(parse_datetime("2026-01-05T10:00:00+02:00"), Some(expected));
        assert_eq!(parse_datetime("2026-01-05T08:00:00"), Some(expected));
        assert_eq!(parse_datetime("2026-01-05T08:00"), Some(expected));
        assert_eq!(parse_datetime("2026-01-05 08:00:00"), Some(expected));
        assert_eq!(parse_datetime("yesterday"), None);
    }

    #[test]
    fn blank_text_is_missing() {
        assert!(required_text(Some("  ".into()), "name").is_err());
        assert!(required_text(None, "name").is_err());
        assert_eq!(required_text(Some(" Metformin ".into()), "name").unwrap(), "Metformin");
    }
}
