//! Education quizzes.
//!
//! - `GET /api/quizzes`: quizzes with their ordered questions
//! - `POST /api/quizzes`, `POST /api/quiz-questions`: providers only
//! - `GET|POST /api/quiz-responses`: the server scores every submission

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{required_text, scope_for, target_patient};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::authorization;
use crate::db::repository;
use crate::db::now_utc;
use crate::models::{Quiz, QuizQuestion, QuizResponse, Role};
use crate::quiz::{self, ScoredSubmission};

#[derive(Serialize)]
pub struct QuizWithQuestions {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuizQuestion>,
}

/// `GET /api/quizzes`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<QuizWithQuestions>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let quizzes = repository::list_quizzes(&conn)?
        .into_iter()
        .map(|quiz| -> Result<QuizWithQuestions, ApiError> {
            let questions = repository::list_quiz_questions(&conn, &quiz.id)?;
            Ok(QuizWithQuestions { quiz, questions })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(quizzes))
}

#[derive(Debug, Deserialize)]
pub struct CreateQuiz {
    pub title: Option<String>,
    pub topic: Option<String>,
}

/// `POST /api/quizzes`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateQuiz>,
) -> Result<(StatusCode, Json<Quiz>), ApiError> {
    authorization::ensure_role(&auth.require_caller()?, Role::Provider)?;
    let quiz = Quiz {
        id: Uuid::new_v4(),
        title: required_text(req.title, "title")?,
        topic: req
            .topic
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "general".into()),
        created_at: now_utc(),
    };
    let conn = ctx.core.open_db()?;
    repository::insert_quiz(&conn, &quiz)?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

#[derive(Debug, Deserialize)]
pub struct CreateQuestion {
    #[serde(alias = "quiz")]
    pub quiz_id: Uuid,
    pub text: Option<String>,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub correct_index: i32,
    /// Appended after the last question when absent.
    pub position: Option<i32>,
}

/// `POST /api/quiz-questions`
pub async fn create_question(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateQuestion>,
) -> Result<(StatusCode, Json<QuizQuestion>), ApiError> {
    authorization::ensure_role(&auth.require_caller()?, Role::Provider)?;
    let text = required_text(req.text, "text")?;
    if req.choices.len() < 2 {
        return Err(ApiError::invalid("choices", "at least two choices are required"));
    }
    let in_range = usize::try_from(req.correct_index).is_ok_and(|i| i < req.choices.len());
    if !in_range {
        return Err(ApiError::invalid("correct_index", "correct_index must point at one of the choices"));
    }

    let conn = ctx.core.open_db()?;
    repository::get_quiz(&conn, &req.quiz_id)?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".into()))?;
    let position = match req.position {
        Some(p) => p,
        None => repository::next_question_position(&conn, &req.quiz_id)?,
    };
    let question = QuizQuestion {
        id: Uuid::new_v4(),
        quiz_id: req.quiz_id,
        text,
        choices: req.choices,
        correct_index: req.correct_index,
        position,
    };
    repository::insert_quiz_question(&conn, &question)?;
    Ok((StatusCode::CREATED, Json(question)))
}

fn scoped_quiz_responses(conn: &Connection, auth: &AuthContext) -> Result<Vec<QuizResponse>, ApiError> {
    let scope = scope_for(conn, auth)?;
    let mut responses = Vec::new();
    for patient_id in scope.patient_ids() {
        responses.extend(repository::list_quiz_responses(conn, patient_id)?);
    }
    responses.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    Ok(responses)
}

/// `GET /api/quiz-responses`: newest first. Errors yield `[]`.
pub async fn list_responses(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Json<Vec<QuizResponse>> {
    let result = ctx
        .core
        .open_db()
        .map_err(ApiError::from)
        .and_then(|conn| scoped_quiz_responses(&conn, &auth));
    match result {
        Ok(responses) => Json(responses),
        Err(e) => {
            tracing::warn!(account = %auth.account.id, error = %e, "Quiz response listing suppressed");
            Json(Vec::new())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswers {
    #[serde(alias = "quiz")]
    pub quiz_id: Uuid,
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub answers: Vec<i32>,
}

/// `POST /api/quiz-responses`: any client-sent score is ignored.
pub async fn submit(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<SubmitAnswers>,
) -> Result<(StatusCode, Json<ScoredSubmission>), ApiError> {
    let conn = ctx.core.open_db()?;
    let patient_id = target_patient(&conn, &auth, req.patient_id)?;
    let scored = quiz::submit(&conn, &req.quiz_id, &patient_id, req.answers)?;
    tracing::info!(
        quiz = %req.quiz_id,
        patient = %patient_id,
        score = scored.score,
        total = scored.total,
        "Quiz submitted"
    );
    Ok((StatusCode::CREATED, Json(scored)))
}
