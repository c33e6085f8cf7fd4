//! Quiz scoring.
//!
//! The score is always recomputed here from the submitted answers and the
//! quiz's questions; a client-sent score is never trusted.

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{now_utc, repository, DatabaseError};
use crate::models::{QuizQuestion, QuizResponse};

#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("Quiz not found")]
    QuizNotFound,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Per-question feedback returned after submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub question: String,
    pub correct_index: i32,
    pub correct_choice: Option<String>,
    pub your_choice: Option<i32>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSubmission {
    pub id: Uuid,
    pub score: i32,
    pub total: usize,
    pub explanations: Vec<Explanation>,
}

/// One point per answer matching the question at the same position.
/// Missing or extra answers score nothing.
pub fn score_answers(questions: &[QuizQuestion], answers: &[i32]) -> i32 {
    questions
        .iter()
        .zip(answers)
        .filter(|(q, a)| q.correct_index == **a)
        .count() as i32
}

pub fn explain(questions: &[QuizQuestion], answers: &[i32]) -> Vec<Explanation> {
    questions
        .iter()
        .enumerate()
        .map(|(idx, q)| {
            let your_choice = answers.get(idx).copied();
            let correct_choice = usize::try_from(q.correct_index)
                .ok()
                .and_then(|i| q.choices.get(i))
                .cloned();
            Explanation {
                question: q.text.clone(),
                correct_index: q.correct_index,
                correct_choice,
                your_choice,
                is_correct: your_choice == Some(q.correct_index),
            }
        })
        .collect()
}

/// Score and store a patient's answers.
pub fn submit(
    conn: &Connection,
    quiz_id: &Uuid,
    patient_id: &Uuid,
    answers: Vec<i32>,
) -> Result<ScoredSubmission, QuizError> {
    repository::get_quiz(conn, quiz_id)?.ok_or(QuizError::QuizNotFound)?;
    let questions = repository::list_quiz_questions(conn, quiz_id)?;
    let response = QuizResponse {
        id: Uuid::new_v4(),
        quiz_id: *quiz_id,
        patient_id: *patient_id,
        score: score_answers(&questions, &answers),
        answers,
        submitted_at: now_utc(),
    };
    repository::insert_quiz_response(conn, &response)?;

    Ok(ScoredSubmission {
        id: response.id,
        score: response.score,
        total: questions.len(),
        explanations: explain(&questions, &response.answers),
    })
}
