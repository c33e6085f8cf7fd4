//! Shared types for the HTTP API layer.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::authorization::Caller;
use crate::core_state::CoreState;
use crate::models::{Account, PatientProfile};

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

// ═══════════════════════════════════════════════════════════
// Auth context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated account, injected into request extensions by the auth
/// middleware after the bearer token resolved to a session.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account: Account,
    pub profile: Option<PatientProfile>,
    pub token: String,
}

impl AuthContext {
    /// `None` for accounts without a profile; their scope is empty.
    pub fn caller(&self) -> Option<Caller> {
        self.profile.as_ref().map(Caller::from)
    }

    pub fn require_profile(&self) -> Result<&PatientProfile, ApiError> {
        self.profile
            .as_ref()
            .ok_or_else(|| ApiError::BadRequest("No patient profile for current user".into()))
    }

    pub fn require_caller(&self) -> Result<Caller, ApiError> {
        self.require_profile().map(Caller::from)
    }
}

// ═══════════════════════════════════════════════════════════
// Common query strings
// ═══════════════════════════════════════════════════════════

/// `?limit=` on list endpoints. Zero or absent means unlimited.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

impl LimitQuery {
    pub fn limit(&self) -> Option<u32> {
        self.limit.filter(|l| *l > 0)
    }
}

/// `?patient_id=` for endpoints where carers pick a patient.
#[derive(Debug, Default, Deserialize)]
pub struct PatientQuery {
    pub patient_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::now_utc;
    use crate::models::Role;

    fn account() -> Account {
        Account {
            id: Uuid::new_v4(),
            username: "pat".into(),
            email: String::new(),
            password_hash: String::new(),
            created_at: now_utc(),
        }
    }

    #[test]
    fn no_profile_means_no_caller() {
        let auth = AuthContext { account: account(), profile: None, token: "t".into() };
        assert!(auth.caller().is_none());
        assert!(matches!(auth.require_caller(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn caller_carries_role_and_profile() {
        let acct = account();
        let profile = PatientProfile {
            id: Uuid::new_v4(),
            account_id: acct.id,
            role: Role::Provider,
            age: 40,
            sex: "female".into(),
            height_cm: 165.0,
            weight_kg: 60.0,
            waist_cm: 70.0,
            lifestyle: String::new(),
            phone: String::new(),
            address: String::new(),
            created_at: now_utc(),
        };
        let auth = AuthContext { account: acct, profile: Some(profile.clone()), token: "t".into() };
        let caller = auth.caller().unwrap();
        assert_eq!(caller.role, Role::Provider);
        assert_eq!(caller.profile_id, profile.id);
    }

    #[test]
    fn zero_limit_is_unlimited() {
        assert_eq!(LimitQuery { limit: Some(0) }.limit(), None);
        assert_eq!(LimitQuery { limit: Some(5) }.limit(), Some(5));
    }
}
