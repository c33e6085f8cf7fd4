use chrono::NaiveTime;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use super::{id_params, placeholders, uuid_col};
use crate::db::DatabaseError;
use crate::models::Medication;

const REMINDER_TIME_FORMAT: &str = "%H:%M";

pub fn insert_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications (id, patient_id, name, dosage, frequency, reminder_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            med.id.to_string(),
            med.patient_id.to_string(),
            med.name,
            med.dosage,
            med.frequency,
            med.reminder_time.format(REMINDER_TIME_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

/// Medications owned by any of `patient_ids`, most recently added first.
pub fn list_medications(
    conn: &Connection,
    patient_ids: &[Uuid],
    limit: Option<u32>,
) -> Result<Vec<Medication>, DatabaseError> {
    if patient_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut sql = format!(
        "SELECT id, patient_id, name, dosage, frequency, reminder_time
         FROM medications WHERE patient_id IN ({}) ORDER BY rowid DESC",
        placeholders(patient_ids.len(), 0)
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(id_params(patient_ids)), row_to_medication)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Medications whose reminder minute falls in `(after, until]`. The range
/// wraps past midnight when `after >= until`; `after == until` is the
/// whole day.
pub fn list_medications_due_between(
    conn: &Connection,
    after: NaiveTime,
    until: NaiveTime,
) -> Result<Vec<Medication>, DatabaseError> {
    let range = if after < until {
        "reminder_time > ?1 AND reminder_time <= ?2"
    } else {
        "reminder_time > ?1 OR reminder_time <= ?2"
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT id, patient_id, name, dosage, frequency, reminder_time
         FROM medications WHERE {range} ORDER BY reminder_time"
    ))?;
    let rows = stmt.query_map(
        params![
            after.format(REMINDER_TIME_FORMAT).to_string(),
            until.format(REMINDER_TIME_FORMAT).to_string(),
        ],
        row_to_medication,
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Seed helper: match on (patient, name).
pub fn get_or_create_medication(conn: &Connection, med: &Medication) -> Result<Medication, DatabaseError> {
    let existing = conn
        .query_row(
            "SELECT id, patient_id, name, dosage, frequency, reminder_time
             FROM medications WHERE patient_id = ?1 AND name = ?2",
            params![med.patient_id.to_string(), med.name],
            row_to_medication,
        )
        .optional()?;
    match existing {
        Some(m) => Ok(m),
        None => {
            insert_medication(conn, med)?;
            Ok(med.clone())
        }
    }
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_reminder_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, REMINDER_TIME_FORMAT))
        .ok()
}

fn row_to_medication(row: &rusqlite::Row) -> Result<Medication, rusqlite::Error> {
    let time_str: String = row.get(5)?;
    Ok(Medication {
        id: uuid_col(row, 0)?,
        patient_id: uuid_col(row, 1)?,
        name: row.get(2)?,
        dosage: row.get(3)?,
        frequency: row.get(4)?,
        reminder_time: parse_reminder_time(&time_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("bad reminder time: {time_str}").into(),
            )
        })?,
    })
}
