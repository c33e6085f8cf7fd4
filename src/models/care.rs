use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which care relationship an assignment row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    Provider,
    Worker,
}

impl AssignmentKind {
    pub(crate) fn table(self) -> &'static str {
        match self {
            AssignmentKind::Provider => "provider_assignments",
            AssignmentKind::Worker => "worker_assignments",
        }
    }

    pub(crate) fn carer_column(self) -> &'static str {
        match self {
            AssignmentKind::Provider => "provider_id",
            AssignmentKind::Worker => "worker_id",
        }
    }
}

/// Link between a provider (or community worker) and a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareAssignment {
    pub id: Uuid,
    pub kind: AssignmentKind,
    pub carer_id: Uuid,
    pub patient_id: Uuid,
    pub created_at: NaiveDateTime,
}

/// Patient permission for one provider to export the full record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataShareConsent {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub granted: bool,
    pub granted_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}
