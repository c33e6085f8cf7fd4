use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_col, id_params, placeholders, ts_col, uuid_col};
use crate::db::{format_timestamp, DatabaseError};
use crate::models::{Appointment, AppointmentStatus};

const APPOINTMENT_COLUMNS: &str = "id, patient_id, title, scheduled_for, notes, status, created_at";

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, title, scheduled_for, notes, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.title,
            format_timestamp(&appt.scheduled_for),
            appt.notes,
            appt.status.as_str(),
            format_timestamp(&appt.created_at),
        ],
    )?;
    Ok(())
}

/// Appointments owned by any of `patient_ids`, soonest first.
pub fn list_appointments(
    conn: &Connection,
    patient_ids: &[Uuid],
    status: Option<AppointmentStatus>,
    limit: Option<u32>,
) -> Result<Vec<Appointment>, DatabaseError> {
    if patient_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE patient_id IN ({})",
        placeholders(patient_ids.len(), 0)
    );
    if let Some(status) = status {
        sql.push_str(&format!(" AND status = '{}'", status.as_str()));
    }
    sql.push_str(" ORDER BY scheduled_for ASC, rowid DESC");
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(id_params(patient_ids)), row_to_appointment)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Scheduled appointments for all patients with `from <= scheduled_for <= to`.
pub fn list_scheduled_between(
    conn: &Connection,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE status = 'scheduled' AND scheduled_for >= ?1 AND scheduled_for <= ?2
         ORDER BY scheduled_for ASC"
    ))?;
    let rows = stmt.query_map(
        params![format_timestamp(from), format_timestamp(to)],
        row_to_appointment,
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Seed helper: match on (patient, title).
pub fn get_or_create_appointment(
    conn: &Connection,
    appt: &Appointment,
) -> Result<Appointment, DatabaseError> {
    let existing = conn
        .query_row(
            &format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE patient_id = ?1 AND title = ?2"
            ),
            params![appt.patient_id.to_string(), appt.title],
            row_to_appointment,
        )
        .optional()?;
    match existing {
        Some(a) => Ok(a),
        None => {
            insert_appointment(conn, appt)?;
            Ok(appt.clone())
        }
    }
}

fn row_to_appointment(row: &rusqlite::Row) -> Result<Appointment, rusqlite::Error> {
    Ok(Appointment {
        id: uuid_col(row, 0)?,
        patient_id: uuid_col(row, 1)?,
        title: row.get(2)?,
        scheduled_for: ts_col(row, 3)?,
        notes: row.get(4)?,
        status: enum_col::<AppointmentStatus>(row, 5)?,
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
    use chrono::Duration;

    fn make_appt(patient_id: Uuid, title: &str, in_hours: i64, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id,
            title: title.into(),
            scheduled_for: now_utc() + Duration::hours(in_hours),
            notes: String::new(),
            status,
            created_at: now_utc(),
        }
    }

    #[test]
    fn scheduled_window_excludes_other_statuses_and_far_future() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "amina", Role::Patient);
        insert_appointment(&conn, &make_appt(p.id, "soon", 3, AppointmentStatus::Scheduled)).unwrap();
        insert_appointment(&conn, &make_appt(p.id, "cancelled", 3, AppointmentStatus::Cancelled)).unwrap();
        insert_appointment(&conn, &make_appt(p.id, "later", 72, AppointmentStatus::Scheduled)).unwrap();

        let now = now_utc();
        let due = list_scheduled_between(&conn, &now, &(now + Duration::days(1))).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].title, "soon");
    }

    #[test]
    fn list_is_soonest_first() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "amina", Role::Patient);
        insert_appointment(&conn, &make_appt(p.id, "b", 48, AppointmentStatus::Scheduled)).unwrap();
        insert_appointment(&conn, &make_appt(p.id, "a", 2, AppointmentStatus::Scheduled)).unwrap();

        let listed = list_appointments(&conn, &[p.id], None, None).unwrap();
        assert_eq!(listed[0].title, "a");
        assert_eq!(
            list_appointments(&conn, &[p.id], Some(AppointmentStatus::Completed), None).unwrap().len(),
            0
        );
    }
}
