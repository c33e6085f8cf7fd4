//! Role-scoped patient visibility.
//!
//! Every read and write resolves the caller's scope fresh from the
//! assignment tables:
//! 1. Patient → own profile only
//! 2. Provider → patients with a provider assignment to them
//! 3. Worker → patients with a worker assignment to them
//! 4. No profile → empty (fail closed)
//!
//! Bulk export additionally needs an assignment AND a granted consent.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::{AssignmentKind, PatientProfile, Role};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// The authenticated profile a request acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub role: Role,
    pub profile_id: Uuid,
}

impl From<&PatientProfile> for Caller {
    fn from(p: &PatientProfile) -> Self {
        Self { role: p.role, profile_id: p.id }
    }
}

/// Set of patients a caller may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    Own(Uuid),
    Assigned(Vec<Uuid>),
    Empty,
}

impl AccessScope {
    pub fn patient_ids(&self) -> &[Uuid] {
        match self {
            AccessScope::Own(id) => std::slice::from_ref(id),
            AccessScope::Assigned(ids) => ids,
            AccessScope::Empty => &[],
        }
    }

    pub fn contains(&self, patient_id: &Uuid) -> bool {
        self.patient_ids().contains(patient_id)
    }

    pub fn is_empty(&self) -> bool {
        self.patient_ids().is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("patient_id is required")]
    PatientRequired,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Scope resolution
// ═══════════════════════════════════════════════════════════

pub fn resolve_scope(conn: &Connection, caller: Option<&Caller>) -> Result<AccessScope, AccessError> {
    let Some(caller) = caller else {
        return Ok(AccessScope::Empty);
    };
    let scope = match caller.role {
        Role::Patient => AccessScope::Own(caller.profile_id),
        Role::Provider => AccessScope::Assigned(repository::list_assigned_patient_ids(
            conn,
            AssignmentKind::Provider,
            &caller.profile_id,
        )?),
        Role::Worker => AccessScope::Assigned(repository::list_assigned_patient_ids(
            conn,
            AssignmentKind::Worker,
            &caller.profile_id,
        )?),
    };
    Ok(scope)
}

/// Ok when the patient is visible. Unknown patients are NotFound,
/// existing ones outside the scope are Forbidden.
pub fn ensure_in_scope(
    conn: &Connection,
    scope: &AccessScope,
    patient_id: &Uuid,
) -> Result<(), AccessError> {
    if scope.contains(patient_id) {
        return Ok(());
    }
    match repository::get_profile(conn, patient_id)? {
        Some(_) => Err(AccessError::Forbidden("patient is outside your care scope".into())),
        None => Err(AccessError::NotFound("Patient".into())),
    }
}

/// Pick the patient a write applies to. Patients default to themselves;
/// other roles must name an in-scope patient.
pub fn resolve_write_target(
    conn: &Connection,
    caller: &Caller,
    scope: &AccessScope,
    requested: Option<Uuid>,
) -> Result<Uuid, AccessError> {
    let patient_id = match (caller.role, requested) {
        (_, Some(id)) => id,
        (Role::Patient, None) => caller.profile_id,
        (Role::Provider | Role::Worker, None) => return Err(AccessError::PatientRequired),
    };
    ensure_in_scope(conn, scope, &patient_id)?;
    Ok(patient_id)
}

/// Health records are written by patients for themselves and by providers
/// for assigned patients. Workers are read-only here.
pub fn ensure_can_write_health_record(caller: &Caller) -> Result<(), AccessError> {
    match caller.role {
        Role::Patient | Role::Provider => Ok(()),
        Role::Worker => Err(AccessError::Forbidden(
            "community workers cannot record health records".into(),
        )),
    }
}

/// Questionnaire responses come from patients or community workers.
pub fn ensure_can_submit_questionnaire(caller: &Caller) -> Result<(), AccessError> {
    match caller.role {
        Role::Patient | Role::Worker => Ok(()),
        Role::Provider => Err(AccessError::Forbidden("Not allowed to submit responses".into())),
    }
}

pub fn ensure_role(caller: &Caller, role: Role) -> Result<(), AccessError> {
    if caller.role == role {
        Ok(())
    } else {
        Err(AccessError::Forbidden(format!("requires {role} role")))
    }
}

/// Provider bulk export gate: assignment AND granted consent.
pub fn authorize_export(
    conn: &Connection,
    caller: &Caller,
    patient_id: &Uuid,
) -> Result<PatientProfile, AccessError> {
    ensure_role(caller, Role::Provider)?;
    let patient = repository::get_profile(conn, patient_id)?
        .ok_or_else(|| AccessError::NotFound("Patient".into()))?;

    let assigned = repository::get_assignment(
        conn,
        AssignmentKind::Provider,
        &caller.profile_id,
        patient_id,
    )?
    .is_some();
    let consented = repository::get_consent(conn, patient_id, &caller.profile_id)?
        .is_some_and(|c| c.granted);

    if !(assigned && consented) {
        tracing::info!(
            provider = %caller.profile_id,
            patient = %patient_id,
            assigned,
            consented,
            "Export denied"
        );
        return Err(AccessError::Forbidden(
            "Not authorized (assignment and consent required)".into(),
        ));
    }
    Ok(patient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn patient_scope_is_self() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "pat", Role::Patient);
        let scope = resolve_scope(&conn, Some(&Caller::from(&p))).unwrap();
        assert_eq!(scope, AccessScope::Own(p.id));
    }

    #[test]
    fn provider_without_assignments_sees_nothing() {
        let conn = open_memory_database().unwrap();
        let doc = fixtures::profile(&conn, "doc", Role::Provider);
        fixtures::profile(&conn, "pat", Role::Patient);
        let scope = resolve_scope(&conn, Some(&Caller::from(&doc))).unwrap();
        assert!(scope.is_empty());
    }

    #[test]
    fn single_assignment_gives_single_patient() {
        let conn = open_memory_database().unwrap();
        let doc = fixtures::profile(&conn, "doc", Role::Provider);
        let a = fixtures::profile(&conn, "a", Role::Patient);
        let b = fixtures::profile(&conn, "b", Role::Patient);
        repository::insert_assignment(&conn, AssignmentKind::Provider, &doc.id, &a.id).unwrap();

        let scope = resolve_scope(&conn, Some(&Caller::from(&doc))).unwrap();
        assert_eq!(scope.patient_ids(), &[a.id]);
        assert!(!scope.contains(&b.id));
    }

    #[test]
    fn worker_scope_ignores_provider_assignments() {
        let conn = open_memory_database().unwrap();
        let w = fixtures::profile(&conn, "w", Role::Worker);
        let a = fixtures::profile(&conn, "a", Role::Patient);
        repository::insert_assignment(&conn, AssignmentKind::Provider, &w.id, &a.id).unwrap();
        assert!(resolve_scope(&conn, Some(&Caller::from(&w))).unwrap().is_empty());

        repository::insert_assignment(&conn, AssignmentKind::Worker, &w.id, &a.id).unwrap();
        assert!(resolve_scope(&conn, Some(&Caller::from(&w))).unwrap().contains(&a.id));
    }

    #[test]
    fn no_profile_fails_closed() {
        let conn = open_memory_database().unwrap();
        assert_eq!(resolve_scope(&conn, None).unwrap(), AccessScope::Empty);
    }

    #[test]
    fn removing_assignment_revokes_immediately() {
        let conn = open_memory_database().unwrap();
        let doc = fixtures::profile(&conn, "doc", Role::Provider);
        let a = fixtures::profile(&conn, "a", Role::Patient);
        repository::insert_assignment(&conn, AssignmentKind::Provider, &doc.id, &a.id).unwrap();
        repository::delete_assignment(&conn, AssignmentKind::Provider, &doc.id, &a.id).unwrap();
        let scope = resolve_scope(&conn, Some(&Caller::from(&doc))).unwrap();
        assert!(matches!(ensure_in_scope(&conn, &scope, &a.id), Err(AccessError::Forbidden(_))));
    }

    #[test]
    fn unknown_patient_is_not_found() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "pat", Role::Patient);
        let scope = AccessScope::Own(p.id);
        assert!(matches!(
            ensure_in_scope(&conn, &scope, &Uuid::new_v4()),
            Err(AccessError::NotFound(_))
        ));
    }

    #[test]
    fn write_target_defaults_for_patients_only() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "pat", Role::Patient);
        let doc = fixtures::profile(&conn, "doc", Role::Provider);
        let pc = Caller::from(&p);
        assert_eq!(resolve_write_target(&conn, &pc, &AccessScope::Own(p.id), None).unwrap(), p.id);

        let dc = Caller::from(&doc);
        let scope = resolve_scope(&conn, Some(&dc)).unwrap();
        assert!(matches!(
            resolve_write_target(&conn, &dc, &scope, None),
            Err(AccessError::PatientRequired)
        ));
        assert!(matches!(
            resolve_write_target(&conn, &dc, &scope, Some(p.id)),
            Err(AccessError::Forbidden(_))
        ));
    }

    #[test]
    fn export_needs_assignment_and_consent() {
        let conn = open_memory_database().unwrap();
        let doc = fixtures::profile(&conn, "doc", Role::Provider);
        let p = fixtures::profile(&conn, "pat", Role::Patient);
        let caller = Caller::from(&doc);

        // consent only
        repository::upsert_consent(&conn, &p.id, &doc.id, true).unwrap();
        assert!(matches!(authorize_export(&conn, &caller, &p.id), Err(AccessError::Forbidden(_))));

        // assignment only
        repository::upsert_consent(&conn, &p.id, &doc.id, false).unwrap();
        repository::insert_assignment(&conn, AssignmentKind::Provider, &doc.id, &p.id).unwrap();
        assert!(matches!(authorize_export(&conn, &caller, &p.id), Err(AccessError::Forbidden(_))));

        // both
        repository::upsert_consent(&conn, &p.id, &doc.id, true).unwrap();
        assert_eq!(authorize_export(&conn, &caller, &p.id).unwrap().id, p.id);
    }

    #[test]
    fn export_requires_provider_role() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "pat", Role::Patient);
        let caller = Caller::from(&p);
        assert!(matches!(authorize_export(&conn, &caller, &p.id), Err(AccessError::Forbidden(_))));
    }

    #[test]
    fn role_write_rules() {
        let caller = |role| Caller { role, profile_id: Uuid::new_v4() };
        assert!(ensure_can_write_health_record(&caller(Role::Worker)).is_err());
        assert!(ensure_can_write_health_record(&caller(Role::Provider)).is_ok());
        assert!(ensure_can_submit_questionnaire(&caller(Role::Provider)).is_err());
        assert!(ensure_can_submit_questionnaire(&caller(Role::Worker)).is_ok());
    }
}
