use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{ts_col, uuid_col};
use crate::db::{format_timestamp, now_utc, DatabaseError};
use crate::models::{AssignmentKind, CareAssignment, DataShareConsent};

// ═══════════════════════════════════════════════════════════
// Provider / worker assignments
// ═══════════════════════════════════════════════════════════

/// Insert a (carer, patient) link. A duplicate pair surfaces as a
/// unique violation.
pub fn insert_assignment(
    conn: &Connection,
    kind: AssignmentKind,
    carer_id: &Uuid,
    patient_id: &Uuid,
) -> Result<CareAssignment, DatabaseError> {
    let assignment = CareAssignment {
        id: Uuid::new_v4(),
        kind,
        carer_id: *carer_id,
        patient_id: *patient_id,
        created_at: now_utc(),
    };
    conn.execute(
        &format!(
            "INSERT INTO {} (id, {}, patient_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            kind.table(),
            kind.carer_column()
        ),
        params![
            assignment.id.to_string(),
            carer_id.to_string(),
            patient_id.to_string(),
            format_timestamp(&assignment.created_at),
        ],
    )?;
    Ok(assignment)
}

pub fn get_or_create_assignment(
    conn: &Connection,
    kind: AssignmentKind,
    carer_id: &Uuid,
    patient_id: &Uuid,
) -> Result<CareAssignment, DatabaseError> {
    if let Some(existing) = get_assignment(conn, kind, carer_id, patient_id)? {
        return Ok(existing);
    }
    insert_assignment(conn, kind, carer_id, patient_id)
}

pub fn get_assignment(
    conn: &Connection,
    kind: AssignmentKind,
    carer_id: &Uuid,
    patient_id: &Uuid,
) -> Result<Option<CareAssignment>, DatabaseError> {
    conn.query_row(
        &format!(
            "SELECT id, {col}, patient_id, created_at FROM {table}
             WHERE {col} = ?1 AND patient_id = ?2",
            col = kind.carer_column(),
            table = kind.table()
        ),
        params![carer_id.to_string(), patient_id.to_string()],
        |row| row_to_assignment(row, kind),
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn list_assignments(
    conn: &Connection,
    kind: AssignmentKind,
    carer_id: &Uuid,
) -> Result<Vec<CareAssignment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, {col}, patient_id, created_at FROM {table}
         WHERE {col} = ?1 ORDER BY created_at ASC, rowid ASC",
        col = kind.carer_column(),
        table = kind.table()
    ))?;
    let rows = stmt.query_map(params![carer_id.to_string()], |row| row_to_assignment(row, kind))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Patient ids currently assigned to this carer.
pub fn list_assigned_patient_ids(
    conn: &Connection,
    kind: AssignmentKind,
    carer_id: &Uuid,
) -> Result<Vec<Uuid>, DatabaseError> {
    Ok(list_assignments(conn, kind, carer_id)?
        .into_iter()
        .map(|a| a.patient_id)
        .collect())
}

/// Returns true when a link was removed.
pub fn delete_assignment(
    conn: &Connection,
    kind: AssignmentKind,
    carer_id: &Uuid,
    patient_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        &format!(
            "DELETE FROM {} WHERE {} = ?1 AND patient_id = ?2",
            kind.table(),
            kind.carer_column()
        ),
        params![carer_id.to_string(), patient_id.to_string()],
    )?;
    Ok(affected > 0)
}

fn row_to_assignment(row: &rusqlite::Row, kind: AssignmentKind) -> Result<CareAssignment, rusqlite::Error> {
    Ok(CareAssignment {
        id: uuid_col(row, 0)?,
        kind,
        carer_id: uuid_col(row, 1)?,
        patient_id: uuid_col(row, 2)?,
        created_at: ts_col(row, 3)?,
    })
}

// ═══════════════════════════════════════════════════════════
// Data-share consent
// ═══════════════════════════════════════════════════════════

const CONSENT_COLUMNS: &str = "id, patient_id, provider_id, granted, granted_at, updated_at";

/// Create or update the (patient, provider) consent row. `granted_at` is
/// set on every grant and cleared on revoke.
pub fn upsert_consent(
    conn: &Connection,
    patient_id: &Uuid,
    provider_id: &Uuid,
    granted: bool,
) -> Result<DataShareConsent, DatabaseError> {
    let now = format_timestamp(&now_utc());
    let granted_at = granted.then(|| now.clone());
    conn.execute(
        "INSERT INTO data_share_consents (id, patient_id, provider_id, granted, granted_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(patient_id, provider_id) DO UPDATE
         SET granted = excluded.granted,
             granted_at = excluded.granted_at,
             updated_at = excluded.updated_at",
        params![
            Uuid::new_v4().to_string(),
            patient_id.to_string(),
            provider_id.to_string(),
            granted as i32,
            granted_at,
            now,
        ],
    )?;
    get_consent(conn, patient_id, provider_id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "data_share_consent".into(),
        id: format!("{patient_id}/{provider_id}"),
    })
}

pub fn get_consent(
    conn: &Connection,
    patient_id: &Uuid,
    provider_id: &Uuid,
) -> Result<Option<DataShareConsent>, DatabaseError> {
    conn.query_row(
        &format!(
            "SELECT {CONSENT_COLUMNS} FROM data_share_consents
             WHERE patient_id = ?1 AND provider_id = ?2"
        ),
        params![patient_id.to_string(), provider_id.to_string()],
        row_to_consent,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Consents where the profile is either the patient or the provider.
pub fn list_consents_for(conn: &Connection, profile_id: &Uuid) -> Result<Vec<DataShareConsent>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONSENT_COLUMNS} FROM data_share_consents
         WHERE patient_id = ?1 OR provider_id = ?1
         ORDER BY updated_at DESC"
    ))?;
    let rows = stmt.query_map(params![profile_id.to_string()], row_to_consent)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn row_to_consent(row: &rusqlite::Row) -> Result<DataShareConsent, rusqlite::Error> {
    let granted_at: Option<String> = row.get(4)?;
    Ok(DataShareConsent {
        id: uuid_col(row, 0)?,
        patient_id: uuid_col(row, 1)?,
        provider_id: uuid_col(row, 2)?,
        granted: row.get::<_, i32>(3)? != 0,
        granted_at: granted_at.as_deref().and_then(crate::db::parse_timestamp),
        updated_at: ts_col(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Role;

    #[test]
    fn assignment_pairs_are_unique() {
        let conn = open_memory_database().unwrap();
        let doc = fixtures::profile(&conn, "doc", Role::Provider);
        let pat = fixtures::profile(&conn, "pat", Role::Patient);

        insert_assignment(&conn, AssignmentKind::Provider, &doc.id, &pat.id).unwrap();
        let err = insert_assignment(&conn, AssignmentKind::Provider, &doc.id, &pat.id).unwrap_err();
        assert!(err.is_unique_violation());

        let again = get_or_create_assignment(&conn, AssignmentKind::Provider, &doc.id, &pat.id).unwrap();
        assert_eq!(list_assignments(&conn, AssignmentKind::Provider, &doc.id).unwrap()[0].id, again.id);
    }

    #[test]
    fn provider_and_worker_tables_are_separate() {
        let conn = open_memory_database().unwrap();
        let doc = fixtures::profile(&conn, "doc", Role::Provider);
        let pat = fixtures::profile(&conn, "pat", Role::Patient);
        insert_assignment(&conn, AssignmentKind::Provider, &doc.id, &pat.id).unwrap();

        assert_eq!(list_assigned_patient_ids(&conn, AssignmentKind::Provider, &doc.id).unwrap(), vec![pat.id]);
        assert!(list_assigned_patient_ids(&conn, AssignmentKind::Worker, &doc.id).unwrap().is_empty());
    }

    #[test]
    fn delete_assignment_reports_removal() {
        let conn = open_memory_database().unwrap();
        let w = fixtures::profile(&conn, "worker", Role::Worker);
        let pat = fixtures::profile(&conn, "pat", Role::Patient);
        insert_assignment(&conn, AssignmentKind::Worker, &w.id, &pat.id).unwrap();

        assert!(delete_assignment(&conn, AssignmentKind::Worker, &w.id, &pat.id).unwrap());
        assert!(!delete_assignment(&conn, AssignmentKind::Worker, &w.id, &pat.id).unwrap());
        assert!(list_assigned_patient_ids(&conn, AssignmentKind::Worker, &w.id).unwrap().is_empty());
    }

    #[test]
    fn consent_grant_then_revoke_keeps_one_row() {
        let conn = open_memory_database().unwrap();
        let doc = fixtures::profile(&conn, "doc", Role::Provider);
        let pat = fixtures::profile(&conn, "pat", Role::Patient);

        let granted = upsert_consent(&conn, &pat.id, &doc.id, true).unwrap();
        assert!(granted.granted);
        assert!(granted.granted_at.is_some());

        let revoked = upsert_consent(&conn, &pat.id, &doc.id, false).unwrap();
        assert_eq!(revoked.id, granted.id);
        assert!(!revoked.granted);
        assert!(revoked.granted_at.is_none());

        assert_eq!(list_consents_for(&conn, &pat.id).unwrap().len(), 1);
        assert_eq!(list_consents_for(&conn, &doc.id).unwrap().len(), 1);
    }
}
