use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_col, id_params, placeholders, ts_col, uuid_col};
use crate::db::{format_timestamp, DatabaseError};
use crate::models::{PatientProfile, Role};

const PROFILE_COLUMNS: &str = "id, account_id, role, age, sex, height_cm, weight_kg, waist_cm,
                               lifestyle, phone, address, created_at";

pub fn insert_profile(conn: &Connection, p: &PatientProfile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patient_profiles
         (id, account_id, role, age, sex, height_cm, weight_kg, waist_cm,
          lifestyle, phone, address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            p.id.to_string(),
            p.account_id.to_string(),
            p.role.as_str(),
            p.age,
            p.sex,
            p.height_cm,
            p.weight_kg,
            p.waist_cm,
            p.lifestyle,
            p.phone,
            p.address,
            format_timestamp(&p.created_at),
        ],
    )?;
    Ok(())
}

/// Overwrite the mutable profile fields. Role and account stay fixed.
pub fn update_profile(conn: &Connection, p: &PatientProfile) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE patient_profiles
         SET age = ?1, sex = ?2, height_cm = ?3, weight_kg = ?4, waist_cm = ?5,
             lifestyle = ?6, phone = ?7, address = ?8
         WHERE id = ?9",
        params![
            p.age,
            p.sex,
            p.height_cm,
            p.weight_kg,
            p.waist_cm,
            p.lifestyle,
            p.phone,
            p.address,
            p.id.to_string(),
        ],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "patient_profile".into(),
            id: p.id.to_string(),
        });
    }
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &Uuid) -> Result<Option<PatientProfile>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM patient_profiles WHERE id = ?1"),
        params![id.to_string()],
        row_to_profile,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn get_profile_by_account(
    conn: &Connection,
    account_id: &Uuid,
) -> Result<Option<PatientProfile>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM patient_profiles WHERE account_id = ?1"),
        params![account_id.to_string()],
        row_to_profile,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Profiles for the given ids, in creation order. Unknown ids are skipped.
pub fn list_profiles(conn: &Connection, ids: &[Uuid]) -> Result<Vec<PatientProfile>, DatabaseError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {PROFILE_COLUMNS} FROM patient_profiles
         WHERE id IN ({}) ORDER BY created_at ASC",
        placeholders(ids.len(), 0)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(id_params(ids)), row_to_profile)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn row_to_profile(row: &rusqlite::Row) -> Result<PatientProfile, rusqlite::Error> {
    Ok(PatientProfile {
        id: uuid_col(row, 0)?,
        account_id: uuid_col(row, 1)?,
        role: enum_col::<Role>(row, 2)?,
        age: row.get(3)?,
        sex: row.get(4)?,
        height_cm: row.get(5)?,
        weight_kg: row.get(6)?,
        waist_cm: row.get(7)?,
        lifestyle: row.get(8)?,
        phone: row.get(9)?,
        address: row.get(10)?,
        created_at: ts_col(row, 11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn one_profile_per_account() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "amina", Role::Patient);
        let second = PatientProfile { id: Uuid::new_v4(), ..p.clone() };
        assert!(insert_profile(&conn, &second).unwrap_err().is_unique_violation());
    }

    #[test]
    fn update_keeps_role() {
        let conn = open_memory_database().unwrap();
        let mut p = fixtures::profile(&conn, "amina", Role::Patient);
        p.weight_kg = 72.5;
        p.role = Role::Provider;
        update_profile(&conn, &p).unwrap();

        let stored = get_profile(&conn, &p.id).unwrap().unwrap();
        assert_eq!(stored.weight_kg, 72.5);
        assert_eq!(stored.role, Role::Patient);
    }

    #[test]
    fn deleting_account_cascades_to_profile() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "amina", Role::Patient);
        conn.execute("DELETE FROM accounts WHERE id = ?1", params![p.account_id.to_string()])
            .unwrap();
        assert!(get_profile(&conn, &p.id).unwrap().is_none());
    }

    #[test]
    fn list_profiles_skips_unknown_ids() {
        let conn = open_memory_database().unwrap();
        let a = fixtures::profile(&conn, "a", Role::Patient);
        let listed = list_profiles(&conn, &[a.id, Uuid::new_v4()]).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(list_profiles(&conn, &[]).unwrap().is_empty());
    }
}
