use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_col, id_params, placeholders, ts_col, uuid_col};
use crate::db::{format_timestamp, DatabaseError};
use crate::models::{Alert, AlertSeverity};

const ALERT_COLUMNS: &str = "id, patient_id, alert_type, message, severity, resolved, created_at";

pub fn insert_alert(conn: &Connection, alert: &Alert) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO alerts (id, patient_id, alert_type, message, severity, resolved, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            alert.id.to_string(),
            alert.patient_id.to_string(),
            alert.alert_type,
            alert.message,
            alert.severity.as_str(),
            alert.resolved as i32,
            format_timestamp(&alert.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_alert(conn: &Connection, id: &Uuid) -> Result<Option<Alert>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1"),
        params![id.to_string()],
        row_to_alert,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Alerts owned by any of `patient_ids`, newest first. `limit = None`
/// returns everything.
pub fn list_alerts(
    conn: &Connection,
    patient_ids: &[Uuid],
    unresolved_only: bool,
    limit: Option<u32>,
) -> Result<Vec<Alert>, DatabaseError> {
    if patient_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut sql = format!(
        "SELECT {ALERT_COLUMNS} FROM alerts WHERE patient_id IN ({})",
        placeholders(patient_ids.len(), 0)
    );
    if unresolved_only {
        sql.push_str(" AND resolved = 0");
    }
    sql.push_str(" ORDER BY created_at DESC, rowid DESC");
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(id_params(patient_ids)), row_to_alert)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Flip `resolved` to true. Resolving a resolved alert is a no-op.
pub fn resolve_alert(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE alerts SET resolved = 1 WHERE id = ?1",
        params![id.to_string()],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "alert".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Whether the patient already has an alert with this type and message
/// created on `day` (UTC).
pub fn alert_exists_on_day(
    conn: &Connection,
    patient_id: &Uuid,
    alert_type: &str,
    message: &str,
    day: NaiveDate,
) -> Result<bool, DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM alerts
                       WHERE patient_id = ?1 AND alert_type = ?2 AND message = ?3
                         AND substr(created_at, 1, 10) = ?4)",
        params![
            patient_id.to_string(),
            alert_type,
            message,
            day.format("%Y-%m-%d").to_string()
        ],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn row_to_alert(row: &rusqlite::Row) -> Result<Alert, rusqlite::Error> {
    Ok(Alert {
        id: uuid_col(row, 0)?,
        patient_id: uuid_col(row, 1)?,
        alert_type: row.get(2)?,
        message: row.get(3)?,
        severity: enum_col::<AlertSeverity>(row, 4)?,
        resolved: row.get::<_, i32>(5)? != 0,
        created_at: ts_col(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::now_utc;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Role;

    fn make_alert(patient_id: Uuid, alert_type: &str) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            patient_id,
            alert_type: alert_type.into(),
            message: "msg".into(),
            severity: AlertSeverity::Warning,
            resolved: false,
            created_at: now_utc(),
        }
    }

    #[test]
    fn resolve_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "amina", Role::Patient);
        let alert = make_alert(p.id, "hypoglycemia");
        insert_alert(&conn, &alert).unwrap();

        resolve_alert(&conn, &alert.id).unwrap();
        resolve_alert(&conn, &alert.id).unwrap();
        assert!(get_alert(&conn, &alert.id).unwrap().unwrap().resolved);
    }

    #[test]
    fn resolve_missing_alert_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = resolve_alert(&conn, &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn unresolved_filter_and_limit() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "amina", Role::Patient);
        let a = make_alert(p.id, "a");
        let b = make_alert(p.id, "b");
        insert_alert(&conn, &a).unwrap();
        insert_alert(&conn, &b).unwrap();
        resolve_alert(&conn, &a.id).unwrap();

        assert_eq!(list_alerts(&conn, &[p.id], false, None).unwrap().len(), 2);
        let open = list_alerts(&conn, &[p.id], true, None).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, b.id);
        assert_eq!(list_alerts(&conn, &[p.id], false, Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn day_dedup_lookup() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "amina", Role::Patient);
        let alert = make_alert(p.id, "medication_reminder");
        insert_alert(&conn, &alert).unwrap();

        let today = alert.created_at.date();
        assert!(alert_exists_on_day(&conn, &p.id, "medication_reminder", "msg", today).unwrap());
        assert!(!alert_exists_on_day(&conn, &p.id, "medication_reminder", "other", today).unwrap());
        assert!(!alert_exists_on_day(&conn, &p.id, "appointment_reminder", "msg", today).unwrap());
        let tomorrow = today.succ_opt().unwrap();
        assert!(!alert_exists_on_day(&conn, &p.id, "medication_reminder", "msg", tomorrow).unwrap());
    }
}
