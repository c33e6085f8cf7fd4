use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_col, ts_col, uuid_col};
use crate::db::{format_timestamp, now_utc, DatabaseError};
use crate::models::{Account, Platform, PushDevice};

pub fn insert_account(conn: &Connection, account: &Account) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO accounts (id, username, email, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            account.id.to_string(),
            account.username,
            account.email,
            account.password_hash,
            format_timestamp(&account.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_account(conn: &Connection, id: &Uuid) -> Result<Option<Account>, DatabaseError> {
    conn.query_row(
        "SELECT id, username, email, password_hash, created_at FROM accounts WHERE id = ?1",
        params![id.to_string()],
        row_to_account,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn get_account_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<Account>, DatabaseError> {
    conn.query_row(
        "SELECT id, username, email, password_hash, created_at FROM accounts WHERE username = ?1",
        params![username],
        row_to_account,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn update_password_hash(
    conn: &Connection,
    account_id: &Uuid,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE accounts SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, account_id.to_string()],
    )?;
    Ok(())
}

fn row_to_account(row: &rusqlite::Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: uuid_col(row, 0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: ts_col(row, 4)?,
    })
}

// ═══════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════

/// Store a session keyed by the SHA-256 hex digest of its bearer token.
pub fn insert_session(
    conn: &Connection,
    token_hash: &str,
    account_id: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (token_hash, account_id, created_at) VALUES (?1, ?2, ?3)",
        params![token_hash, account_id.to_string(), format_timestamp(&now_utc())],
    )?;
    Ok(())
}

pub fn get_session_account(
    conn: &Connection,
    token_hash: &str,
) -> Result<Option<Account>, DatabaseError> {
    conn.query_row(
        "SELECT a.id, a.username, a.email, a.password_hash, a.created_at
         FROM sessions s JOIN accounts a ON a.id = s.account_id
         WHERE s.token_hash = ?1",
        params![token_hash],
        row_to_account,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Returns true when a session was removed.
pub fn delete_session(conn: &Connection, token_hash: &str) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?1",
        params![token_hash],
    )?;
    Ok(affected > 0)
}

// ═══════════════════════════════════════════════════════════
// Push devices
// ═══════════════════════════════════════════════════════════

/// Register a push token. A token re-registered from another account
/// moves to that account.
pub fn upsert_push_device(conn: &Connection, device: &PushDevice) -> Result<PushDevice, DatabaseError> {
    conn.execute(
        "INSERT INTO push_devices (id, account_id, token, platform, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(token) DO UPDATE SET account_id = excluded.account_id,
                                          platform = excluded.platform",
        params![
            device.id.to_string(),
            device.account_id.to_string(),
            device.token,
            device.platform.as_str(),
            format_timestamp(&device.created_at),
        ],
    )?;
    conn.query_row(
        "SELECT id, account_id, token, platform, created_at FROM push_devices WHERE token = ?1",
        params![device.token],
        row_to_push_device,
    )
    .map_err(DatabaseError::from)
}

pub fn list_push_devices(conn: &Connection, account_id: &Uuid) -> Result<Vec<PushDevice>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, token, platform, created_at
         FROM push_devices WHERE account_id = ?1
         ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map(params![account_id.to_string()], row_to_push_device)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Push tokens of the account that owns the given profile.
pub fn list_push_tokens_for_profile(
    conn: &Connection,
    profile_id: &Uuid,
) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT d.token FROM push_devices d
         JOIN patient_profiles p ON p.account_id = d.account_id
         WHERE p.id = ?1",
    )?;
    let rows = stmt.query_map(params![profile_id.to_string()], |row| row.get::<_, String>(0))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn row_to_push_device(row: &rusqlite::Row) -> Result<PushDevice, rusqlite::Error> {
    Ok(PushDevice {
        id: uuid_col(row, 0)?,
        account_id: uuid_col(row, 1)?,
        token: row.get(2)?,
        platform: enum_col::<Platform>(row, 3)?,
        created_at: ts_col(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Role;

    #[test]
    fn username_is_unique() {
        let conn = open_memory_database().unwrap();
        fixtures::account(&conn, "amina");
        let dup = Account {
            id: Uuid::new_v4(),
            username: "amina".into(),
            email: String::new(),
            password_hash: "x".into(),
            created_at: now_utc(),
        };
        let err = insert_account(&conn, &dup).unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn session_lookup_and_delete() {
        let conn = open_memory_database().unwrap();
        let account = fixtures::account(&conn, "amina");
        insert_session(&conn, "hash-1", &account.id).unwrap();

        let found = get_session_account(&conn, "hash-1").unwrap().unwrap();
        assert_eq!(found.id, account.id);
        assert!(get_session_account(&conn, "other").unwrap().is_none());

        assert!(delete_session(&conn, "hash-1").unwrap());
        assert!(!delete_session(&conn, "hash-1").unwrap());
        assert!(get_session_account(&conn, "hash-1").unwrap().is_none());
    }

    #[test]
    fn push_token_moves_between_accounts() {
        let conn = open_memory_database().unwrap();
        let first = fixtures::profile(&conn, "first", Role::Patient);
        let second = fixtures::profile(&conn, "second", Role::Patient);

        let device = PushDevice {
            id: Uuid::new_v4(),
            account_id: first.account_id,
            token: "tok-1".into(),
            platform: Platform::Android,
            created_at: now_utc(),
        };
        upsert_push_device(&conn, &device).unwrap();
        assert_eq!(list_push_tokens_for_profile(&conn, &first.id).unwrap(), vec!["tok-1"]);

        let moved = PushDevice { id: Uuid::new_v4(), account_id: second.account_id, ..device };
        let stored = upsert_push_device(&conn, &moved).unwrap();
        assert_eq!(stored.account_id, second.account_id);
        assert!(list_push_tokens_for_profile(&conn, &first.id).unwrap().is_empty());
        assert_eq!(list_push_devices(&conn, &second.account_id).unwrap().len(), 1);
    }
}
