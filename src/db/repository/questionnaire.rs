use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use super::{id_params, json_col, placeholders, ts_col, uuid_col};
use crate::db::{format_timestamp, DatabaseError};
use crate::models::{Quiz, QuizQuestion, QuizResponse, QuestionnaireResponse, QuestionnaireTemplate};

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

// ═══════════════════════════════════════════════════════════
// Questionnaire responses and templates
// ═══════════════════════════════════════════════════════════

pub fn insert_questionnaire_response(
    conn: &Connection,
    r: &QuestionnaireResponse,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO questionnaire_responses (id, patient_id, category, answers_json, submitted_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            r.id.to_string(),
            r.patient_id.to_string(),
            r.category,
            to_json(&r.answers)?,
            format_timestamp(&r.submitted_at),
        ],
    )?;
    Ok(())
}

/// Responses owned by any of `patient_ids`, newest first.
pub fn list_questionnaire_responses(
    conn: &Connection,
    patient_ids: &[Uuid],
    limit: Option<u32>,
) -> Result<Vec<QuestionnaireResponse>, DatabaseError> {
    if patient_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut sql = format!(
        "SELECT id, patient_id, category, answers_json, submitted_at
         FROM questionnaire_responses WHERE patient_id IN ({})
         ORDER BY submitted_at DESC, rowid DESC",
        placeholders(patient_ids.len(), 0)
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(id_params(patient_ids)), row_to_response)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Seed helper: match on (patient, category).
pub fn get_or_create_questionnaire_response(
    conn: &Connection,
    r: &QuestionnaireResponse,
) -> Result<QuestionnaireResponse, DatabaseError> {
    let existing = conn
        .query_row(
            "SELECT id, patient_id, category, answers_json, submitted_at
             FROM questionnaire_responses WHERE patient_id = ?1 AND category = ?2",
            params![r.patient_id.to_string(), r.category],
            row_to_response,
        )
        .optional()?;
    match existing {
        Some(found) => Ok(found),
        None => {
            insert_questionnaire_response(conn, r)?;
            Ok(r.clone())
        }
    }
}

fn row_to_response(row: &rusqlite::Row) -> Result<QuestionnaireResponse, rusqlite::Error> {
    Ok(QuestionnaireResponse {
        id: uuid_col(row, 0)?,
        patient_id: uuid_col(row, 1)?,
        category: row.get(2)?,
        answers: json_col(row, 3)?,
        submitted_at: ts_col(row, 4)?,
    })
}

pub fn insert_questionnaire_template(
    conn: &Connection,
    t: &QuestionnaireTemplate,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO questionnaire_templates (id, name, category, schema_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            t.id.to_string(),
            t.name,
            t.category,
            to_json(&t.schema)?,
            format_timestamp(&t.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_questionnaire_templates(conn: &Connection) -> Result<Vec<QuestionnaireTemplate>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, category, schema_json, created_at
         FROM questionnaire_templates ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([], row_to_template)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Seed helper: match on (name, category).
pub fn get_or_create_questionnaire_template(
    conn: &Connection,
    t: &QuestionnaireTemplate,
) -> Result<QuestionnaireTemplate, DatabaseError> {
    let existing = conn
        .query_row(
            "SELECT id, name, category, schema_json, created_at
             FROM questionnaire_templates WHERE name = ?1 AND category = ?2",
            params![t.name, t.category],
            row_to_template,
        )
        .optional()?;
    match existing {
        Some(found) => Ok(found),
        None => {
            insert_questionnaire_template(conn, t)?;
            Ok(t.clone())
        }
    }
}

fn row_to_template(row: &rusqlite::Row) -> Result<QuestionnaireTemplate, rusqlite::Error> {
    Ok(QuestionnaireTemplate {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        schema: json_col(row, 3)?,
        created_at: ts_col(row, 4)?,
    })
}

// ═══════════════════════════════════════════════════════════
// Quizzes
// ═══════════════════════════════════════════════════════════

pub fn insert_quiz(conn: &Connection, quiz: &Quiz) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO quizzes (id, title, topic, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            quiz.id.to_string(),
            quiz.title,
            quiz.topic,
            format_timestamp(&quiz.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_quiz(conn: &Connection, id: &Uuid) -> Result<Option<Quiz>, DatabaseError> {
    conn.query_row(
        "SELECT id, title, topic, created_at FROM quizzes WHERE id = ?1",
        params![id.to_string()],
        row_to_quiz,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn list_quizzes(conn: &Connection) -> Result<Vec<Quiz>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, title, topic, created_at FROM quizzes ORDER BY created_at ASC, rowid ASC")?;
    let rows = stmt.query_map([], row_to_quiz)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Seed helper: match on title.
pub fn get_or_create_quiz(conn: &Connection, quiz: &Quiz) -> Result<Quiz, DatabaseError> {
    let existing = conn
        .query_row(
            "SELECT id, title, topic, created_at FROM quizzes WHERE title = ?1",
            params![quiz.title],
            row_to_quiz,
        )
        .optional()?;
    match existing {
        Some(found) => Ok(found),
        None => {
            insert_quiz(conn, quiz)?;
            Ok(quiz.clone())
        }
    }
}

fn row_to_quiz(row: &rusqlite::Row) -> Result<Quiz, rusqlite::Error> {
    Ok(Quiz {
        id: uuid_col(row, 0)?,
        title: row.get(1)?,
        topic: row.get(2)?,
        created_at: ts_col(row, 3)?,
    })
}

/// Next free position for a new question in this quiz.
pub fn next_question_position(conn: &Connection, quiz_id: &Uuid) -> Result<i32, DatabaseError> {
    let max: Option<i32> = conn.query_row(
        "SELECT MAX(position) FROM quiz_questions WHERE quiz_id = ?1",
        params![quiz_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(max.map_or(0, |m| m + 1))
}

pub fn insert_quiz_question(conn: &Connection, q: &QuizQuestion) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO quiz_questions (id, quiz_id, text, choices_json, correct_index, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            q.id.to_string(),
            q.quiz_id.to_string(),
            q.text,
            to_json(&q.choices)?,
            q.correct_index,
            q.position,
        ],
    )?;
    Ok(())
}

/// Questions of one quiz in answer order.
pub fn list_quiz_questions(conn: &Connection, quiz_id: &Uuid) -> Result<Vec<QuizQuestion>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, quiz_id, text, choices_json, correct_index, position
         FROM quiz_questions WHERE quiz_id = ?1 ORDER BY position ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![quiz_id.to_string()], row_to_question)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Seed helper: match on (quiz, text).
pub fn get_or_create_quiz_question(
    conn: &Connection,
    q: &QuizQuestion,
) -> Result<QuizQuestion, DatabaseError> {
    let existing = conn
        .query_row(
            "SELECT id, quiz_id, text, choices_json, correct_index, position
             FROM quiz_questions WHERE quiz_id = ?1 AND text = ?2",
            params![q.quiz_id.to_string(), q.text],
            row_to_question,
        )
        .optional()?;
    match existing {
        Some(found) => Ok(found),
        None => {
            insert_quiz_question(conn, q)?;
            Ok(q.clone())
        }
    }
}

fn row_to_question(row: &rusqlite::Row) -> Result<QuizQuestion, rusqlite::Error> {
    Ok(QuizQuestion {
        id: uuid_col(row, 0)?,
        quiz_id: uuid_col(row, 1)?,
        text: row.get(2)?,
        choices: json_col(row, 3)?,
        correct_index: row.get(4)?,
        position: row.get(5)?,
    })
}

pub fn insert_quiz_response(conn: &Connection, r: &QuizResponse) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO quiz_responses (id, quiz_id, patient_id, answers_json, score, submitted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            r.id.to_string(),
            r.quiz_id.to_string(),
            r.patient_id.to_string(),
            to_json(&r.answers)?,
            r.score,
            format_timestamp(&r.submitted_at),
        ],
    )?;
    Ok(())
}

pub fn list_quiz_responses(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<QuizResponse>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, quiz_id, patient_id, answers_json, score, submitted_at
         FROM quiz_responses WHERE patient_id = ?1
         ORDER BY submitted_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok(QuizResponse {
            id: uuid_col(row, 0)?,
            quiz_id: uuid_col(row, 1)?,
            patient_id: uuid_col(row, 2)?,
            answers: json_col(row, 3)?,
            score: row.get(4)?,
            submitted_at: ts_col(row, 5)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}
