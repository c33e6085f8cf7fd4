use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_col, id_params, placeholders, ts_col, uuid_col};
use crate::db::{format_timestamp, DatabaseError};
use crate::models::{DeviceReading, HealthRecord, ReadingType};

// ═══════════════════════════════════════════════════════════
// Health records
// ═══════════════════════════════════════════════════════════

pub fn insert_health_record(conn: &Connection, r: &HealthRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO health_records (id, patient_id, systolic, diastolic, blood_glucose, bmi, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            r.id.to_string(),
            r.patient_id.to_string(),
            r.systolic,
            r.diastolic,
            r.blood_glucose,
            r.bmi,
            format_timestamp(&r.timestamp),
        ],
    )?;
    Ok(())
}

/// Most recent record for one patient. Ties on timestamp go to the
/// later insert.
pub fn get_latest_health_record(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Option<HealthRecord>, DatabaseError> {
    conn.query_row(
        "SELECT id, patient_id, systolic, diastolic, blood_glucose, bmi, timestamp
         FROM health_records WHERE patient_id = ?1
         ORDER BY timestamp DESC, rowid DESC LIMIT 1",
        params![patient_id.to_string()],
        row_to_health_record,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Records owned by any of `patient_ids`, newest first.
pub fn list_health_records(
    conn: &Connection,
    patient_ids: &[Uuid],
) -> Result<Vec<HealthRecord>, DatabaseError> {
    if patient_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id, patient_id, systolic, diastolic, blood_glucose, bmi, timestamp
         FROM health_records WHERE patient_id IN ({})
         ORDER BY timestamp DESC, rowid DESC",
        placeholders(patient_ids.len(), 0)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(id_params(patient_ids)), row_to_health_record)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Records for one patient with `from <= timestamp <= to`, oldest first.
pub fn list_health_records_in_range(
    conn: &Connection,
    patient_id: &Uuid,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> Result<Vec<HealthRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, systolic, diastolic, blood_glucose, bmi, timestamp
         FROM health_records
         WHERE patient_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3
         ORDER BY timestamp ASC",
    )?;
    let rows = stmt.query_map(
        params![patient_id.to_string(), format_timestamp(from), format_timestamp(to)],
        row_to_health_record,
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn row_to_health_record(row: &rusqlite::Row) -> Result<HealthRecord, rusqlite::Error> {
    Ok(HealthRecord {
        id: uuid_col(row, 0)?,
        patient_id: uuid_col(row, 1)?,
        systolic: row.get(2)?,
        diastolic: row.get(3)?,
        blood_glucose: row.get(4)?,
        bmi: row.get(5)?,
        timestamp: ts_col(row, 6)?,
    })
}

// ═══════════════════════════════════════════════════════════
// Device readings
// ═══════════════════════════════════════════════════════════

/// Optional narrowing for reading queries.
#[derive(Debug, Clone, Default)]
pub struct ReadingFilter {
    pub reading_type: Option<ReadingType>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    pub limit: Option<u32>,
}

pub fn insert_device_reading(conn: &Connection, r: &DeviceReading) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO device_readings
         (id, patient_id, reading_type, value, unit, systolic, diastolic, source, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            r.id.to_string(),
            r.patient_id.to_string(),
            r.reading_type.as_str(),
            r.value,
            r.unit,
            r.systolic,
            r.diastolic,
            r.source,
            format_timestamp(&r.recorded_at),
        ],
    )?;
    Ok(())
}

/// Readings owned by any of `patient_ids`, newest first.
pub fn list_device_readings(
    conn: &Connection,
    patient_ids: &[Uuid],
    filter: &ReadingFilter,
) -> Result<Vec<DeviceReading>, DatabaseError> {
    if patient_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut values: Vec<Value> = patient_ids.iter().map(|id| Value::Text(id.to_string())).collect();
    let mut sql = format!(
        "SELECT id, patient_id, reading_type, value, unit, systolic, diastolic, source, recorded_at
         FROM device_readings WHERE patient_id IN ({})",
        placeholders(patient_ids.len(), 0)
    );
    if let Some(t) = filter.reading_type {
        values.push(Value::Text(t.as_str().to_string()));
        sql.push_str(&format!(" AND reading_type = ?{}", values.len()));
    }
    if let Some(from) = &filter.from {
        values.push(Value::Text(format_timestamp(from)));
        sql.push_str(&format!(" AND recorded_at >= ?{}", values.len()));
    }
    if let Some(to) = &filter.to {
        values.push(Value::Text(format_timestamp(to)));
        sql.push_str(&format!(" AND recorded_at <= ?{}", values.len()));
    }
    sql.push_str(" ORDER BY recorded_at DESC, rowid DESC");
    if let Some(limit) = filter.limit {
        values.push(Value::Integer(i64::from(limit)));
        sql.push_str(&format!(" LIMIT ?{}", values.len()));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), row_to_device_reading)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn row_to_device_reading(row: &rusqlite::Row) -> Result<DeviceReading, rusqlite::Error> {
    Ok(DeviceReading {
        id: uuid_col(row, 0)?,
        patient_id: uuid_col(row, 1)?,
        reading_type: enum_col::<ReadingType>(row, 2)?,
        value: row.get(3)?,
        unit: row.get(4)?,
        systolic: row.get(5)?,
        diastolic: row.get(6)?,
        source: row.get(7)?,
        recorded_at: ts_col(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Role;
    use chrono::Duration;

    #[test]
    fn latest_record_is_max_timestamp() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "amina", Role::Patient);

        let mut old = fixtures::health_record(p.id, 150, 95, 130.0);
        old.timestamp -= Duration::days(2);
        let newer = fixtures::health_record(p.id, 120, 80, 95.0);
        insert_health_record(&conn, &newer).unwrap();
        insert_health_record(&conn, &old).unwrap();

        let latest = get_latest_health_record(&conn, &p.id).unwrap().unwrap();
        assert_eq!(latest.id, newer.id);
    }

    #[test]
    fn no_records_is_none() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "amina", Role::Patient);
        assert!(get_latest_health_record(&conn, &p.id).unwrap().is_none());
        assert!(list_health_records(&conn, &[]).unwrap().is_empty());
    }

    #[test]
    fn records_in_range_are_ascending() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "amina", Role::Patient);
        for days in [5, 1, 3] {
            let mut r = fixtures::health_record(p.id, 120, 80, 100.0);
            r.timestamp -= Duration::days(days);
            insert_health_record(&conn, &r).unwrap();
        }
        let now = crate::db::now_utc();
        let in_range =
            list_health_records_in_range(&conn, &p.id, &(now - Duration::days(4)), &now).unwrap();
        assert_eq!(in_range.len(), 2);
        assert!(in_range[0].timestamp < in_range[1].timestamp);
    }

    #[test]
    fn reading_filter_narrows_by_type_and_limit() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "amina", Role::Patient);
        let other = fixtures::profile(&conn, "other", Role::Patient);
        for v in [100.0, 110.0, 120.0] {
            insert_device_reading(&conn, &fixtures::glucose_reading(p.id, v)).unwrap();
        }
        insert_device_reading(&conn, &fixtures::bp_reading(p.id, 130, 85)).unwrap();
        insert_device_reading(&conn, &fixtures::glucose_reading(other.id, 99.0)).unwrap();

        let all = list_device_readings(&conn, &[p.id], &ReadingFilter::default()).unwrap();
        assert_eq!(all.len(), 4);

        let glucose = list_device_readings(
            &conn,
            &[p.id],
            &ReadingFilter { reading_type: Some(ReadingType::Glucose), limit: Some(2), ..Default::default() },
        )
        .unwrap();
        assert_eq!(glucose.len(), 2);
        assert!(glucose.iter().all(|r| r.reading_type == ReadingType::Glucose));
        // Same-second inserts fall back to insertion order, newest first.
        assert_eq!(glucose[0].value, 120.0);

        let bp = list_device_readings(
            &conn,
            &[p.id],
            &ReadingFilter { reading_type: Some(ReadingType::BloodPressure), ..Default::default() },
        )
        .unwrap();
        assert_eq!(bp[0].systolic, Some(130));
        assert_eq!(bp[0].diastolic, Some(85));
    }
}
