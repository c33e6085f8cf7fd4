//! Registration, login and bearer sessions.
//!
//! Passwords are stored as `pbkdf2-sha256$<iterations>$<salt>$<hash>`
//! (base64). Session tokens are random and only their SHA-256 hex digest
//! is persisted.

use std::sync::LazyLock;

use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::db::{now_utc, repository, DatabaseError};
use crate::models::{Account, PatientProfile, Role};

#[cfg(not(test))]
const PBKDF2_ITERATIONS: u32 = 120_000;
#[cfg(test)]
const PBKDF2_ITERATIONS: u32 = 1_000;

const HASH_SCHEME: &str = "pbkdf2-sha256";
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;
const MIN_PASSWORD_LENGTH: usize = 8;

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]{1,150}$").unwrap());

/// A short deny-list of the most common passwords.
const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "12345678", "123456789", "qwerty123", "iloveyou",
    "admin123", "welcome1", "letmein1", "passw0rd",
];

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{message}")]
    Validation { message: String, fields: Vec<String> },

    #[error("Username already exists")]
    UsernameTaken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account has no profile")]
    MissingProfile,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl AccountError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        AccountError::Validation { message: message.into(), fields: vec![field.to_string()] }
    }
}

// ═══════════════════════════════════════════════════════════
// Registration
// ═══════════════════════════════════════════════════════════

/// Registration payload. Everything is optional at the type level so that
/// validation can report every missing field at once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub age: Option<i32>,
    #[serde(alias = "gender")]
    pub sex: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub waist_cm: Option<f64>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub lifestyle: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registered {
    pub account: Account,
    pub profile: PatientProfile,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Validate, create the account and its profile in one transaction.
pub fn register(conn: &Connection, req: &RegisterRequest) -> Result<Registered, AccountError> {
    let mut missing = Vec::new();
    let username = present(&req.username);
    let password = req.password.as_deref().filter(|p| !p.is_empty());
    let sex = present(&req.sex);
    for (field, is_set) in [
        ("username", username.is_some()),
        ("password", password.is_some()),
        ("age", req.age.is_some()),
        ("sex", sex.is_some()),
        ("height_cm", req.height_cm.is_some()),
        ("weight_kg", req.weight_kg.is_some()),
        ("waist_cm", req.waist_cm.is_some()),
    ] {
        if !is_set {
            missing.push(field.to_string());
        }
    }
    let (Some(username), Some(password), Some(age), Some(sex), Some(height_cm), Some(weight_kg), Some(waist_cm)) =
        (username, password, req.age, sex, req.height_cm, req.weight_kg, req.waist_cm)
    else {
        return Err(AccountError::Validation {
            message: format!("Missing required fields: {}", missing.join(", ")),
            fields: missing,
        });
    };

    validate_username(username)?;
    validate_password(password, username)?;
    let role = match present(&req.role) {
        Some(raw) => raw
            .parse::<Role>()
            .map_err(|_| AccountError::invalid("role", format!("Unknown role: {raw}")))?,
        None => Role::Patient,
    };
    if age < 0 {
        return Err(AccountError::invalid("age", "age must not be negative"));
    }
    for (field, value) in [("height_cm", height_cm), ("weight_kg", weight_kg), ("waist_cm", waist_cm)] {
        if !(value.is_finite() && value > 0.0) {
            return Err(AccountError::invalid(field, format!("{field} must be greater than zero")));
        }
    }

    if repository::get_account_by_username(conn, username)?.is_some() {
        return Err(AccountError::UsernameTaken);
    }

    let now = now_utc();
    let account = Account {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: present(&req.email).unwrap_or_default().to_string(),
        password_hash: hash_password(password),
        created_at: now,
    };
    let profile = PatientProfile {
        id: Uuid::new_v4(),
        account_id: account.id,
        role,
        age,
        sex: sex.to_string(),
        height_cm,
        weight_kg,
        waist_cm,
        lifestyle: present(&req.lifestyle).unwrap_or_default().to_string(),
        phone: present(&req.phone).unwrap_or_default().to_string(),
        address: present(&req.address).unwrap_or_default().to_string(),
        created_at: now,
    };

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    repository::insert_account(&tx, &account).map_err(|e| {
        if e.is_unique_violation() {
            AccountError::UsernameTaken
        } else {
            e.into()
        }
    })?;
    repository::insert_profile(&tx, &profile)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(account = %account.id, role = %role, "Account registered");
    Ok(Registered { account, profile })
}

fn validate_username(username: &str) -> Result<(), AccountError> {
    if USERNAME_PATTERN.is_match(username) {
        Ok(())
    } else {
        Err(AccountError::invalid(
            "username",
            "Enter a valid username: up to 150 letters, digits and @/./+/-/_ only",
        ))
    }
}

/// Length, numeric-only, common-password and similarity checks.
pub fn validate_password(password: &str, username: &str) -> Result<(), AccountError> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }
    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.".to_string());
    }
    if username.chars().count() >= 3 && lowered.contains(&username.to_lowercase()) {
        problems.push("The password is too similar to the username.".to_string());
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(AccountError::Validation { message: problems.join(" "), fields: vec!["password".into()] })
    }
}

// ═══════════════════════════════════════════════════════════
// Password hashing
// ═══════════════════════════════════════════════════════════

pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LENGTH] = rand::random();
    let hash = derive(password, &salt, PBKDF2_ITERATIONS);
    let b64 = base64::engine::general_purpose::STANDARD_NO_PAD;
    format!("{HASH_SCHEME}${PBKDF2_ITERATIONS}${}${}", b64.encode(salt), b64.encode(hash))
}

/// Constant-time check against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(HASH_SCHEME), Some(iterations), Some(salt), Some(hash), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let b64 = base64::engine::general_purpose::STANDARD_NO_PAD;
    let (Ok(iterations), Ok(salt), Ok(expected)) =
        (iterations.parse::<u32>(), b64.decode(salt), b64.decode(hash))
    else {
        return false;
    };
    if iterations == 0 || expected.len() != HASH_LENGTH {
        return false;
    }
    let actual = derive(password, &salt, iterations);
    actual.ct_eq(expected.as_slice()).unwrap_u8() == 1
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

// ═══════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════

/// Random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex digest of a bearer token, the form stored in `sessions`.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Issued on login. `token` is shown to the client once.
#[derive(Debug, Clone, Serialize)]
pub struct LoginSession {
    pub token: String,
    pub account: Account,
    pub profile: PatientProfile,
}

pub fn login(conn: &Connection, username: &str, password: &str) -> Result<LoginSession, AccountError> {
    let account = repository::get_account_by_username(conn, username.trim())?
        .filter(|a| verify_password(password, &a.password_hash))
        .ok_or(AccountError::InvalidCredentials)?;
    let profile = repository::get_profile_by_account(conn, &account.id)?
        .ok_or(AccountError::MissingProfile)?;

    let token = generate_token();
    repository::insert_session(conn, &hash_token(&token), &account.id)?;
    tracing::info!(account = %account.id, "Login");
    Ok(LoginSession { token, account, profile })
}

/// Resolve a bearer token to its account and profile, if the session exists.
pub fn authenticate(
    conn: &Connection,
    token: &str,
) -> Result<Option<(Account, Option<PatientProfile>)>, DatabaseError> {
    let Some(account) = repository::get_session_account(conn, &hash_token(token))? else {
        return Ok(None);
    };
    let profile = repository::get_profile_by_account(conn, &account.id)?;
    Ok(Some((account, profile)))
}

/// Returns true when the session existed.
pub fn logout(conn: &Connection, token: &str) -> Result<bool, DatabaseError> {
    repository::delete_session(conn, &hash_token(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn valid_request(username: &str) -> RegisterRequest {
        RegisterRequest {
            username: Some(username.into()),
            password: Some("Str0ng!pass".into()),
            email: Some(format!("{username}@example.com")),
            role: None,
            age: Some(52),
            sex: Some("male".into()),
            height_cm: Some(175.0),
            weight_kg: Some(82.0),
            waist_cm: Some(98.0),
            ..Default::default()
        }
    }

    #[test]
    fn register_creates_account_and_patient_profile() {
        let conn = open_memory_database().unwrap();
        let reg = register(&conn, &valid_request("amina")).unwrap();
        assert_eq!(reg.profile.role, Role::Patient);
        assert_eq!(reg.profile.account_id, reg.account.id);
        assert!(reg.account.password_hash.starts_with("pbkdf2-sha256$"));
        assert!(repository::get_profile_by_account(&conn, &reg.account.id).unwrap().is_some());
    }

    #[test]
    fn register_lists_every_missing_field() {
        let conn = open_memory_database().unwrap();
        let req = RegisterRequest { username: Some("x".into()), ..Default::default() };
        match register(&conn, &req).unwrap_err() {
            AccountError::Validation { fields, message } => {
                assert_eq!(
                    fields,
                    vec!["password", "age", "sex", "height_cm", "weight_kg", "waist_cm"]
                );
                assert!(message.starts_with("Missing required fields: password, age"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let conn = open_memory_database().unwrap();
        let mut req = valid_request("blank");
        req.username = Some("   ".into());
        req.sex = Some(String::new());
        match register(&conn, &req).unwrap_err() {
            AccountError::Validation { fields, .. } => assert_eq!(fields, vec!["username", "sex"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn gender_alias_is_accepted() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"username":"u","password":"Str0ng!pass","age":30,"gender":"female",
                "height_cm":160,"weight_kg":55,"waist_cm":70}"#,
        )
        .unwrap();
        assert_eq!(req.sex.as_deref(), Some("female"));
    }

    #[test]
    fn duplicate_username_rejected() {
        let conn = open_memory_database().unwrap();
        register(&conn, &valid_request("dup")).unwrap();
        assert!(matches!(
            register(&conn, &valid_request("dup")).unwrap_err(),
            AccountError::UsernameTaken
        ));
    }

    #[test]
    fn unknown_role_rejected() {
        let conn = open_memory_database().unwrap();
        let mut req = valid_request("r");
        req.role = Some("admin".into());
        assert!(matches!(register(&conn, &req).unwrap_err(), AccountError::Validation { .. }));
    }

    #[test]
    fn weak_passwords_rejected() {
        assert!(validate_password("short1", "u").is_err());
        assert!(validate_password("1234567890", "u").is_err());
        assert!(validate_password("Password1", "u").is_err());
        assert!(validate_password("amina2024!", "amina").is_err());
        assert!(validate_password("Str0ng!pass", "amina").is_ok());
    }

    #[test]
    fn invalid_username_rejected() {
        let conn = open_memory_database().unwrap();
        let mut req = valid_request("bad name");
        req.password = Some("Str0ng!pass".into());
        assert!(matches!(register(&conn, &req).unwrap_err(), AccountError::Validation { .. }));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse");
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "garbage"));
        assert!(!verify_password("correct horse", "pbkdf2-sha256$0$AAAA$AAAA"));
    }

    #[test]
    fn same_password_gets_different_salts() {
        assert_ne!(hash_password("same-secret"), hash_password("same-secret"));
    }

    #[test]
    fn login_authenticate_logout_cycle() {
        let conn = open_memory_database().unwrap();
        let reg = register(&conn, &valid_request("cycle")).unwrap();

        let session = login(&conn, "cycle", "Str0ng!pass").unwrap();
        assert_eq!(session.profile.id, reg.profile.id);

        let (account, profile) = authenticate(&conn, &session.token).unwrap().unwrap();
        assert_eq!(account.id, reg.account.id);
        assert_eq!(profile.unwrap().id, reg.profile.id);

        assert!(logout(&conn, &session.token).unwrap());
        assert!(authenticate(&conn, &session.token).unwrap().is_none());
        assert!(!logout(&conn, &session.token).unwrap());
    }

    #[test]
    fn login_rejects_bad_credentials() {
        let conn = open_memory_database().unwrap();
        register(&conn, &valid_request("creds")).unwrap();
        assert!(matches!(
            login(&conn, "creds", "nope-nope").unwrap_err(),
            AccountError::InvalidCredentials
        ));
        assert!(matches!(
            login(&conn, "ghost", "Str0ng!pass").unwrap_err(),
            AccountError::InvalidCredentials
        ));
    }

    #[test]
    fn token_hash_is_hex_sha256() {
        let h = hash_token("abc");
        assert_eq!(h, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_ne!(generate_token(), generate_token());
    }
}
