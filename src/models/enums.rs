use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(
    /// Account role. Drives which patients a caller can see.
    Role {
        Patient => "patient",
        Provider => "provider",
        Worker => "worker",
    }
);

str_enum!(ReadingType {
    Glucose => "glucose",
    BloodPressure => "bp",
    Weight => "weight",
    Bmi => "bmi",
    Waist => "waist",
});

str_enum!(AlertSeverity {
    Info => "info",
    Warning => "warning",
    Critical => "critical",
});

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Completed => "completed",
    Missed => "missed",
    Cancelled => "cancelled",
});

str_enum!(Platform {
    Android => "android",
    Ios => "ios",
});

str_enum!(AuditAction {
    Create => "create",
    Update => "update",
    Delete => "delete",
});

impl ReadingType {
    /// Default unit for this reading type.
    pub fn default_unit(self) -> &'static str {
        match self {
            ReadingType::Glucose => "mg/dL",
            ReadingType::BloodPressure => "mmHg",
            ReadingType::Weight => "kg",
            ReadingType::Bmi => "kg/m2",
            ReadingType::Waist => "cm",
        }
    }
}
