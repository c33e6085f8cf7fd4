//! Profile endpoints.
//!
//! - `GET /api/profile/me`: caller's own account and profile
//! - `PUT /api/profile/me`: partial update of the caller's profile
//! - `GET /api/patients/:id`: one patient inside the caller's scope

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{scoped_patient, username_of};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository;
use crate::models::{AuditAction, PatientProfile};

#[derive(Serialize)]
pub struct ProfileResponse {
    pub username: String,
    #[serde(flatten)]
    pub profile: PatientProfile,
}

/// `GET /api/profile/me`
pub async fn me(Extension(auth): Extension<AuthContext>) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = auth.require_profile()?.clone();
    Ok(Json(ProfileResponse { username: auth.account.username, profile }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub age: Option<i32>,
    #[serde(alias = "gender")]
    pub sex: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub waist_cm: Option<f64>,
    pub lifestyle: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ProfileUpdate {
    /// Apply onto `profile`. Role and ownership are never touched.
    fn apply(self, profile: &mut PatientProfile) -> Result<(), ApiError> {
        if let Some(age) = self.age {
            if age < 0 {
                return Err(ApiError::invalid("age", "age must not be negative"));
            }
            profile.age = age;
        }
        if let Some(sex) = self.sex {
            let sex = sex.trim();
            if sex.is_empty() {
                return Err(ApiError::invalid("sex", "sex must not be blank"));
            }
            profile.sex = sex.to_string();
        }
        for (field, value, slot) in [
            ("height_cm", self.height_cm, &mut profile.height_cm),
            ("weight_kg", self.weight_kg, &mut profile.weight_kg),
            ("waist_cm", self.waist_cm, &mut profile.waist_cm),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(ApiError::invalid(field, format!("{field} must be a positive number")));
                }
                *slot = v;
            }
        }
        if let Some(lifestyle) = self.lifestyle {
            profile.lifestyle = lifestyle;
        }
        if let Some(phone) = self.phone {
            profile.phone = phone;
        }
        if let Some(address) = self.address {
            profile.address = address;
        }
        Ok(())
    }
}

/// `PUT /api/profile/me`
pub async fn update_me(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let mut profile = auth.require_profile()?.clone();
    update.apply(&mut profile)?;

    let conn = ctx.core.open_db()?;
    repository::update_profile(&conn, &profile)?;
    ctx.core
        .record_audit(&conn, Some(&auth.account.id), "PatientProfile", &profile.id, AuditAction::Update);

    Ok(Json(ProfileResponse { username: auth.account.username, profile }))
}

/// `GET /api/patients/:id`
pub async fn patient(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let profile = scoped_patient(&conn, &auth, &patient_id)?;
    let username = username_of(&conn, &profile)?;
    Ok(Json(ProfileResponse { username, profile }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::now_utc;
    use crate::models::Role;

    fn profile() -> PatientProfile {
        PatientProfile {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            role: Role::Patient,
            age: 40,
            sex: "male".into(),
            height_cm: 170.0,
            weight_kg: 80.0,
            waist_cm: 90.0,
            lifestyle: String::new(),
            phone: String::new(),
            address: String::new(),
            created_at: now_utc(),
        }
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let mut p = profile();
        let update = ProfileUpdate { weight_kg: Some(76.5), phone: Some("0711".into()), ..Default::default() };
        update.apply(&mut p).unwrap();
        assert_eq!(p.weight_kg, 76.5);
        assert_eq!(p.phone, "0711");
        assert_eq!(p.height_cm, 170.0);
        assert_eq!(p.role, Role::Patient);
    }

    #[test]
    fn rejects_non_positive_measures() {
        let mut p = profile();
        let update = ProfileUpdate { height_cm: Some(0.0), ..Default::default() };
        match update.apply(&mut p) {
            Err(ApiError::Validation { fields, .. }) => assert_eq!(fields, vec!["height_cm"]),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
