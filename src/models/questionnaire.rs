use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireResponse {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// e.g. `lifestyle`, `family_history`
    pub category: String,
    pub answers: serde_json::Value,
    pub submitted_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireTemplate {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub schema: serde_json::Value,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub topic: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub text: String,
    pub choices: Vec<String>,
    pub correct_index: i32,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub patient_id: Uuid,
    pub answers: Vec<i32>,
    /// Always derived from `answers`; never client-supplied.
    pub score: i32,
    pub submitted_at: NaiveDateTime,
}
