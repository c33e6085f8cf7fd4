use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;

/// Demographic and contact data for one account. Providers and
/// community workers carry a profile too; `role` tells them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: Uuid,
    pub account_id: Uuid,
    pub role: Role,
    pub age: i32,
    pub sex: String,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub waist_cm: f64,
    pub lifestyle: String,
    pub phone: String,
    pub address: String,
    pub created_at: NaiveDateTime,
}

impl PatientProfile {
    pub fn sex(&self) -> Sex {
        Sex::parse(&self.sex)
    }
}

/// Biological sex as used by the risk formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    /// Lenient, case-insensitive parse of free-text profile values.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Sex::Male,
            "female" | "f" => Sex::Female,
            _ => Sex::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sex_parse_is_case_insensitive() {
        assert_eq!(Sex::parse("Male"), Sex::Male);
        assert_eq!(Sex::parse(" FEMALE "), Sex::Female);
        assert_eq!(Sex::parse("f"), Sex::Female);
        assert_eq!(Sex::parse("unspecified"), Sex::Other);
        assert_eq!(Sex::parse(""), Sex::Other);
    }
}
