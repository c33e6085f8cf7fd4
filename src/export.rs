//! Consent-gated bulk export of one patient's data for a provider.

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::authorization::{authorize_export, AccessError, Caller};
use crate::db::repository::{self, ReadingFilter};
use crate::models::{Appointment, DeviceReading, HealthRecord, Medication, PatientProfile};

#[derive(Debug, Clone, Serialize)]
pub struct PatientExport {
    pub profile: PatientProfile,
    pub records: Vec<HealthRecord>,
    pub readings: Vec<DeviceReading>,
    pub medications: Vec<Medication>,
    pub appointments: Vec<Appointment>,
}

/// Everything stored for `patient_id`. Requires provider role, an
/// assignment and a granted consent, all checked at call time.
pub fn export_patient(conn: &Connection, caller: &Caller, patient_id: &Uuid) -> Result<PatientExport, AccessError> {
    let profile = authorize_export(conn, caller, patient_id)?;
    let ids = std::slice::from_ref(patient_id);

    let export = PatientExport {
        records: repository::list_health_records(conn, ids)?,
        readings: repository::list_device_readings(conn, ids, &ReadingFilter::default())?,
        medications: repository::list_medications(conn, ids, None)?,
        appointments: repository::list_appointments(conn, ids, None, None)?,
        profile,
    };
    tracing::info!(
        provider = %caller.profile_id,
        patient = %patient_id,
        records = export.records.len(),
        readings = export.readings.len(),
        "Patient data exported"
    );
    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{AssignmentKind, Role};

    struct Setup {
        conn: Connection,
        doc: Caller,
        patient: PatientProfile,
    }

    fn setup() -> Setup {
        let conn = open_memory_database().unwrap();
        let doc = fixtures::profile(&conn, "doc", Role::Provider);
        let patient = fixtures::profile(&conn, "pat", Role::Patient);
        repository::insert_health_record(&conn, &fixtures::health_record(patient.id, 130, 85, 110.0)).unwrap();
        repository::insert_device_reading(&conn, &fixtures::glucose_reading(patient.id, 98.0)).unwrap();
        Setup { conn, doc: Caller::from(&doc), patient }
    }

    #[test]
    fn export_with_assignment_and_consent() {
        let s = setup();
        repository::insert_assignment(&s.conn, AssignmentKind::Provider, &s.doc.profile_id, &s.patient.id).unwrap();
        repository::upsert_consent(&s.conn, &s.patient.id, &s.doc.profile_id, true).unwrap();

        let export = export_patient(&s.conn, &s.doc, &s.patient.id).unwrap();
        assert_eq!(export.profile.id, s.patient.id);
        assert_eq!(export.records.len(), 1);
        assert_eq!(export.readings.len(), 1);
        assert!(export.medications.is_empty());

        let json = serde_json::to_value(&export).unwrap();
        for key in ["profile", "records", "readings", "medications", "appointments"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn export_denied_without_consent() {
        let s = setup();
        repository::insert_assignment(&s.conn, AssignmentKind::Provider, &s.doc.profile_id, &s.patient.id).unwrap();
        assert!(matches!(
            export_patient(&s.conn, &s.doc, &s.patient.id).unwrap_err(),
            AccessError::Forbidden(_)
        ));
    }

    #[test]
    fn export_denied_after_consent_revoked() {
        let s = setup();
        repository::insert_assignment(&s.conn, AssignmentKind::Provider, &s.doc.profile_id, &s.patient.id).unwrap();
        repository::upsert_consent(&s.conn, &s.patient.id, &s.doc.profile_id, true).unwrap();
        repository::upsert_consent(&s.conn, &s.patient.id, &s.doc.profile_id, false).unwrap();
        assert!(export_patient(&s.conn, &s.doc, &s.patient.id).is_err());
    }

    #[test]
    fn patients_cannot_export() {
        let s = setup();
        let me = Caller { role: Role::Patient, profile_id: s.patient.id };
        assert!(matches!(
            export_patient(&s.conn, &me, &s.patient.id).unwrap_err(),
            AccessError::Forbidden(_)
        ));
    }
}
