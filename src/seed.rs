//! Demo data: one patient, one provider, one community worker, and
//! enough vitals, care-plan and quiz rows to exercise every endpoint.
//!
//! Idempotent: rows are matched on their natural keys and only created
//! when missing. Demo passwords are reset on every run.

use chrono::{Duration, NaiveTime};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

use crate::accounts::hash_password;
use crate::db::repository::{self, ReadingFilter};
use crate::db::{now_utc, DatabaseError};
use crate::models::*;

pub const DEMO_PASSWORD: &str = "Str0ngPass!";

#[derive(Debug, Clone)]
pub struct SeedSummary {
    pub patient: PatientProfile,
    pub provider: PatientProfile,
    pub worker: PatientProfile,
}

struct DemoUser {
    username: &'static str,
    email: &'static str,
    role: Role,
    age: i32,
    sex: &'static str,
    height_cm: f64,
    weight_kg: f64,
    waist_cm: f64,
    phone: &'static str,
    address: &'static str,
    lifestyle: &'static str,
}

const DEMO_PATIENT: DemoUser = DemoUser {
    username: "demo_patient",
    email: "patient@example.com",
    role: Role::Patient,
    age: 45,
    sex: "male",
    height_cm: 175.0,
    weight_kg: 82.0,
    waist_cm: 96.0,
    phone: "0700000000",
    address: "Demo street",
    lifestyle: "sedentary",
};

const DEMO_PROVIDER: DemoUser = DemoUser {
    username: "demo_provider",
    email: "provider@example.com",
    role: Role::Provider,
    age: 38,
    sex: "female",
    height_cm: 165.0,
    weight_kg: 62.0,
    waist_cm: 72.0,
    phone: "",
    address: "",
    lifestyle: "",
};

const DEMO_WORKER: DemoUser = DemoUser {
    username: "demo_worker",
    email: "worker@example.com",
    role: Role::Worker,
    age: 29,
    sex: "female",
    height_cm: 160.0,
    weight_kg: 60.0,
    waist_cm: 70.0,
    phone: "",
    address: "",
    lifestyle: "",
};

/// (title, topic, [(question, choices, correct_index)])
type QuizSeed = (&'static str, &'static str, &'static [(&'static str, &'static [&'static str], i32)]);

const QUIZZES: &[QuizSeed] = &[
    (
        "Diabetes Self-care Basics",
        "diabetes",
        &[
            (
                "Which food choice is best for stable blood glucose?",
                &["Sugary drink", "White bread", "Whole grains/vegetables", "Candy"],
                2,
            ),
            (
                "What is a common sign of hypoglycemia?",
                &["Excessive thirst", "Shaking/sweating", "Frequent urination", "Blurred vision only"],
                1,
            ),
            (
                "How many minutes of moderate activity per week are recommended?",
                &["30", "60", "150", "300"],
                2,
            ),
        ],
    ),
    (
        "Hypertension Management",
        "hypertension",
        &[
            (
                "Target daily salt intake for most adults is:",
                &["< 5g", "10-15g", "No limit", "Only after exercise"],
                0,
            ),
            (
                "When to seek urgent care for BP?",
                &["160/100", "180/120 with symptoms", "140/90 for 1 day", "130/80 after exercise"],
                1,
            ),
            (
                "Which lifestyle change most lowers BP?",
                &["More sugar", "Less salt/DASH diet", "Skip medications", "Smoke occasionally"],
                1,
            ),
        ],
    ),
];

fn ensure_user(conn: &Connection, user: &DemoUser) -> Result<PatientProfile, DatabaseError> {
    let password_hash = hash_password(DEMO_PASSWORD);
    let account = match repository::get_account_by_username(conn, user.username)? {
        Some(existing) => {
            repository::update_password_hash(conn, &existing.id, &password_hash)?;
            existing
        }
        None => {
            let account = Account {
                id: Uuid::new_v4(),
                username: user.username.into(),
                email: user.email.into(),
                password_hash,
                created_at: now_utc(),
            };
            repository::insert_account(conn, &account)?;
            account
        }
    };

    if let Some(profile) = repository::get_profile_by_account(conn, &account.id)? {
        return Ok(profile);
    }
    let profile = PatientProfile {
        id: Uuid::new_v4(),
        account_id: account.id,
        role: user.role,
        age: user.age,
        sex: user.sex.into(),
        height_cm: user.height_cm,
        weight_kg: user.weight_kg,
        waist_cm: user.waist_cm,
        lifestyle: user.lifestyle.into(),
        phone: user.phone.into(),
        address: user.address.into(),
        created_at: now_utc(),
    };
    repository::insert_profile(conn, &profile)?;
    Ok(profile)
}

fn seed_vitals(conn: &Connection, patient_id: &Uuid) -> Result<(), DatabaseError> {
    let now = now_utc();
    if repository::get_latest_health_record(conn, patient_id)?.is_none() {
        repository::insert_health_record(
            conn,
            &HealthRecord {
                id: Uuid::new_v4(),
                patient_id: *patient_id,
                systolic: 148,
                diastolic: 92,
                blood_glucose: 185.0,
                bmi: 26.8,
                timestamp: now,
            },
        )?;
    }

    let existing = repository::list_device_readings(
        conn,
        std::slice::from_ref(patient_id),
        &ReadingFilter { limit: Some(1), ..Default::default() },
    )?;
    if !existing.is_empty() {
        return Ok(());
    }
    // Five days of paired glucose/bp readings, oldest first.
    for i in 0..5 {
        let recorded_at = now - Duration::days(4 - i64::from(i));
        repository::insert_device_reading(
            conn,
            &DeviceReading {
                id: Uuid::new_v4(),
                patient_id: *patient_id,
                reading_type: ReadingType::Glucose,
                value: f64::from(110 + i * 8),
                unit: ReadingType::Glucose.default_unit().into(),
                systolic: None,
                diastolic: None,
                source: "manual".into(),
                recorded_at,
            },
        )?;
        repository::insert_device_reading(
            conn,
            &DeviceReading {
                id: Uuid::new_v4(),
                patient_id: *patient_id,
                reading_type: ReadingType::BloodPressure,
                value: 0.0,
                unit: ReadingType::BloodPressure.default_unit().into(),
                systolic: Some(130 + i),
                diastolic: Some(84 + i),
                source: "manual".into(),
                recorded_at,
            },
        )?;
    }
    Ok(())
}

fn seed_care_plan(conn: &Connection, patient_id: &Uuid) -> Result<(), DatabaseError> {
    for (name, dosage, frequency, hour) in [("Metformin", "500mg", "BID", 8), ("Amlodipine", "5mg", "OD", 20)] {
        repository::get_or_create_medication(
            conn,
            &Medication {
                id: Uuid::new_v4(),
                patient_id: *patient_id,
                name: name.into(),
                dosage: dosage.into(),
                frequency: frequency.into(),
                reminder_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default(),
            },
        )?;
    }

    let now = now_utc();
    repository::get_or_create_appointment(
        conn,
        &Appointment {
            id: Uuid::new_v4(),
            patient_id: *patient_id,
            title: "Clinic Visit".into(),
            scheduled_for: now + Duration::days(7),
            notes: String::new(),
            status: AppointmentStatus::Scheduled,
            created_at: now,
        },
    )?;
    Ok(())
}

fn seed_questionnaires(conn: &Connection, patient_id: &Uuid) -> Result<(), DatabaseError> {
    let now = now_utc();
    repository::get_or_create_questionnaire_response(
        conn,
        &QuestionnaireResponse {
            id: Uuid::new_v4(),
            patient_id: *patient_id,
            category: "lifestyle".into(),
            answers: json!({
                "smoke": false,
                "alcohol_days_per_week": 1,
                "fruit_veg_servings_per_day": 3,
                "family_history_diabetes": true,
                "physical_activity_minutes_per_day": 30,
            }),
            submitted_at: now,
        },
    )?;

    let templates = [
        (
            "Lifestyle",
            "lifestyle",
            json!({
                "title": "Lifestyle",
                "properties": {
                    "smoke": {"type": "boolean"},
                    "alcohol_days_per_week": {"type": "integer", "minimum": 0, "maximum": 7},
                    "physical_activity_minutes_per_day": {"type": "integer", "minimum": 0, "maximum": 600}
                },
                "required": ["smoke"]
            }),
        ),
        (
            "Diet",
            "diet",
            json!({
                "title": "Diet",
                "properties": {
                    "fruit_veg_servings_per_day": {"type": "integer", "minimum": 0, "maximum": 10},
                    "salt_intake_level": {"type": "string", "enum": ["low", "moderate", "high"]}
                },
                "required": ["fruit_veg_servings_per_day"]
            }),
        ),
        (
            "Family history",
            "family",
            json!({
                "title": "Family history",
                "properties": {
                    "family_history_diabetes": {"type": "boolean"},
                    "family_history_hypertension": {"type": "boolean"}
                }
            }),
        ),
    ];
    for (name, category, schema) in templates {
        repository::get_or_create_questionnaire_template(
            conn,
            &QuestionnaireTemplate {
                id: Uuid::new_v4(),
                name: name.into(),
                category: category.into(),
                schema,
                created_at: now,
            },
        )?;
    }
    Ok(())
}

fn seed_quizzes(conn: &Connection) -> Result<(), DatabaseError> {
    for (title, topic, questions) in QUIZZES {
        let quiz = repository::get_or_create_quiz(
            conn,
            &Quiz { id: Uuid::new_v4(), title: (*title).into(), topic: (*topic).into(), created_at: now_utc() },
        )?;
        for (position, (text, choices, correct_index)) in questions.iter().enumerate() {
            repository::get_or_create_quiz_question(
                conn,
                &QuizQuestion {
                    id: Uuid::new_v4(),
                    quiz_id: quiz.id,
                    text: (*text).into(),
                    choices: choices.iter().map(|c| c.to_string()).collect(),
                    correct_index: *correct_index,
                    position: position as i32,
                },
            )?;
        }
    }
    Ok(())
}

/// Create (or top up) the demo data set in one transaction.
pub fn seed_demo(conn: &Connection) -> Result<SeedSummary, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let patient = ensure_user(&tx, &DEMO_PATIENT)?;
    let provider = ensure_user(&tx, &DEMO_PROVIDER)?;
    let worker = ensure_user(&tx, &DEMO_WORKER)?;

    repository::get_or_create_assignment(&tx, AssignmentKind::Provider, &provider.id, &patient.id)?;
    repository::get_or_create_assignment(&tx, AssignmentKind::Worker, &worker.id, &patient.id)?;

    seed_vitals(&tx, &patient.id)?;
    seed_care_plan(&tx, &patient.id)?;
    seed_questionnaires(&tx, &patient.id)?;
    seed_quizzes(&tx)?;
    tx.commit()?;

    tracing::info!(
        "Demo data seeded. Users: demo_patient / demo_provider / demo_worker (password: {DEMO_PASSWORD})"
    );
    Ok(SeedSummary { patient, provider, worker })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts;
    use crate::db::sqlite::open_memory_database;

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn seed_creates_linked_demo_users() {
        let conn = open_memory_database().unwrap();
        let seeded = seed_demo(&conn).unwrap();
        assert_eq!(seeded.patient.role, Role::Patient);
        assert_eq!(seeded.provider.role, Role::Provider);
        assert!(repository::get_assignment(&conn, AssignmentKind::Provider, &seeded.provider.id, &seeded.patient.id)
            .unwrap()
            .is_some());
        assert!(repository::get_assignment(&conn, AssignmentKind::Worker, &seeded.worker.id, &seeded.patient.id)
            .unwrap()
            .is_some());
        assert!(accounts::login(&conn, "demo_patient", DEMO_PASSWORD).is_ok());
    }

    #[test]
    fn seed_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let first = seed_demo(&conn).unwrap();
        let second = seed_demo(&conn).unwrap();
        assert_eq!(first.patient.id, second.patient.id);

        assert_eq!(count(&conn, "accounts"), 3);
        assert_eq!(count(&conn, "health_records"), 1);
        assert_eq!(count(&conn, "device_readings"), 10);
        assert_eq!(count(&conn, "medications"), 2);
        assert_eq!(count(&conn, "appointments"), 1);
        assert_eq!(count(&conn, "quizzes"), 2);
        assert_eq!(count(&conn, "quiz_questions"), 6);
        assert_eq!(count(&conn, "questionnaire_templates"), 3);
        assert_eq!(count(&conn, "questionnaire_responses"), 1);
    }

    #[test]
    fn seeded_quiz_questions_keep_order() {
        let conn = open_memory_database().unwrap();
        seed_demo(&conn).unwrap();
        let quiz = repository::list_quizzes(&conn)
            .unwrap()
            .into_iter()
            .find(|q| q.title == "Hypertension Management")
            .unwrap();
        let questions = repository::list_quiz_questions(&conn, &quiz.id).unwrap();
        assert_eq!(questions[0].text, "Target daily salt intake for most adults is:");
        assert_eq!(questions[1].correct_index, 1);
    }
}
