//! Repository layer: entity-scoped database operations.
//!
//! Every function takes a borrowed `Connection`; callers own the
//! connection lifetime (one per request, one per scheduler tick).

mod account;
mod alert;
mod appointment;
mod audit;
mod care;
mod medication;
mod profile;
mod questionnaire;
mod vitals;

use chrono::NaiveDateTime;
use uuid::Uuid;

pub use account::*;
pub use alert::*;
pub use appointment::*;
pub use audit::*;
pub use care::*;
pub use medication::*;
pub use profile::*;
pub use questionnaire::*;
pub use vitals::*;

// ═══════════════════════════════════════════════════════════
// Row helpers shared by the entity modules
// ═══════════════════════════════════════════════════════════

pub(crate) fn uuid_col(row: &rusqlite::Row, idx: usize) -> Result<Uuid, rusqlite::Error> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn opt_uuid_col(row: &rusqlite::Row, idx: usize) -> Result<Option<Uuid>, rusqlite::Error> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| {
        Uuid::parse_str(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

pub(crate) fn ts_col(row: &rusqlite::Row, idx: usize) -> Result<NaiveDateTime, rusqlite::Error> {
    let s: String = row.get(idx)?;
    super::parse_timestamp(&s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("bad timestamp: {s}").into(),
        )
    })
}

pub(crate) fn enum_col<T>(row: &rusqlite::Row, idx: usize) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr<Err = super::DatabaseError>,
{
    let s: String = row.get(idx)?;
    s.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn json_col<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<T, rusqlite::Error> {
    let s: String = row.get(idx)?;
    serde_json::from_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// `?1, ?2, ...` for an `IN (...)` clause starting at `offset + 1`.
pub(crate) fn placeholders(count: usize, offset: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i + offset))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn id_params(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(Uuid::to_string).collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_from_offset() {
        assert_eq!(placeholders(3, 0), "?1, ?2, ?3");
        assert_eq!(placeholders(2, 1), "?2, ?3");
        assert_eq!(placeholders(0, 0), "");
    }
}
