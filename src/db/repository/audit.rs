use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{enum_col, opt_uuid_col, ts_col, uuid_col};
use crate::db::{format_timestamp, now_utc, DatabaseError};
use crate::models::{AuditAction, AuditEntry};

/// Append one audit entry stamped with the current time.
pub fn insert_audit_entry(
    conn: &Connection,
    account_id: Option<&Uuid>,
    entity: &str,
    object_id: &Uuid,
    action: AuditAction,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (id, account_id, entity, object_id, action, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            Uuid::new_v4().to_string(),
            account_id.map(Uuid::to_string),
            entity,
            object_id.to_string(),
            action.as_str(),
            format_timestamp(&now_utc()),
        ],
    )?;
    Ok(())
}

/// Newest entries first.
pub fn list_audit_entries(conn: &Connection, limit: u32) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, entity, object_id, action, timestamp
         FROM audit_log ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(AuditEntry {
            id: uuid_col(row, 0)?,
            account_id: opt_uuid_col(row, 1)?,
            entity: row.get(2)?,
            object_id: row.get(3)?,
            action: enum_col::<AuditAction>(row, 4)?,
            timestamp: ts_col(row, 5)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn entries_survive_account_deletion() {
        let conn = open_memory_database().unwrap();
        let account = fixtures::account(&conn, "amina");
        let object = Uuid::new_v4();
        insert_audit_entry(&conn, Some(&account.id), "HealthRecord", &object, AuditAction::Create)
            .unwrap();
        conn.execute("DELETE FROM accounts WHERE id = ?1", params![account.id.to_string()])
            .unwrap();

        let entries = list_audit_entries(&conn, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].account_id, None);
        assert_eq!(entries[0].object_id, object.to_string());
        assert_eq!(entries[0].action, AuditAction::Create);
    }
}
