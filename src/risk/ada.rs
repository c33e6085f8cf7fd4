use serde::Serialize;

use super::{bmi, round_to};
use crate::models::{HealthRecord, PatientProfile, QuestionnaireResponse, Sex};

/// Inputs to the ADA-style type 2 diabetes risk test.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaInputs {
    pub age: Option<i32>,
    pub sex: Sex,
    pub bmi: Option<f64>,
    pub family_history: bool,
    pub hypertension: bool,
    pub physically_active: bool,
    pub gestational_diabetes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaCategory {
    Low,
    Increased,
    High,
}

impl AdaCategory {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 8 => AdaCategory::High,
            s if s >= 5 => AdaCategory::Increased,
            _ => AdaCategory::Low,
        }
    }
}

/// Score and category. Only the highest matching age and BMI bands count.
pub fn ada_score(inputs: &AdaInputs) -> (u32, AdaCategory) {
    let mut score = 0;
    score += match inputs.age {
        Some(a) if a >= 60 => 3,
        Some(a) if a >= 50 => 2,
        Some(a) if a >= 40 => 1,
        _ => 0,
    };
    score += match inputs.bmi {
        Some(b) if b >= 30.0 => 2,
        Some(b) if b >= 25.0 => 1,
        _ => 0,
    };
    if !inputs.physically_active {
        score += 1;
    }
    if inputs.family_history {
        score += 1;
    }
    if inputs.hypertension {
        score += 1;
    }
    match inputs.sex {
        Sex::Male => score += 1,
        Sex::Female if inputs.gestational_diabetes => score += 1,
        _ => {}
    }
    (score, AdaCategory::from_score(score))
}

/// Questionnaire keys read for the self-assessment.
pub const FAMILY_HISTORY_KEY: &str = "family_history";
pub const PHYSICALLY_ACTIVE_KEY: &str = "physically_active";
pub const GESTATIONAL_DIABETES_KEY: &str = "gestational_diabetes";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaAssessment {
    pub ada_score: u32,
    pub category: AdaCategory,
    /// Rounded to 1 decimal.
    pub bmi: Option<f64>,
    pub hypertension_flag: bool,
}

/// First boolean found under `key`, scanning responses newest first.
fn latest_flag(responses: &[QuestionnaireResponse], key: &str) -> Option<bool> {
    responses
        .iter()
        .find_map(|r| r.answers.get(key).and_then(serde_json::Value::as_bool))
}

/// Build ADA inputs for a patient from their profile, latest record and
/// questionnaire answers (newest first). Missing answers fall back to
/// no family history, physically active, no gestational diabetes.
pub fn ada_inputs_for(
    profile: &PatientProfile,
    latest: Option<&HealthRecord>,
    responses: &[QuestionnaireResponse],
) -> AdaInputs {
    // Self-assessment is binary: anything not starting with "m" scores as female.
    let sex = if profile.sex.trim().to_ascii_lowercase().starts_with('m') {
        Sex::Male
    } else {
        Sex::Female
    };
    let hypertension = latest.is_some_and(|r| r.systolic >= 140 || r.diastolic >= 90);
    AdaInputs {
        age: Some(profile.age),
        sex,
        bmi: bmi(profile.weight_kg, profile.height_cm),
        family_history: latest_flag(responses, FAMILY_HISTORY_KEY).unwrap_or(false),
        hypertension,
        physically_active: latest_flag(responses, PHYSICALLY_ACTIVE_KEY).unwrap_or(true),
        gestational_diabetes: latest_flag(responses, GESTATIONAL_DIABETES_KEY).unwrap_or(false),
    }
}

pub fn ada_self_assessment(
    profile: &PatientProfile,
    latest: Option<&HealthRecord>,
    responses: &[QuestionnaireResponse],
) -> AdaAssessment {
    let inputs = ada_inputs_for(profile, latest, responses);
    let (ada_score, category) = ada_score(&inputs);
    AdaAssessment {
        ada_score,
        category,
        bmi: inputs.bmi.map(|b| round_to(b, 1)),
        hypertension_flag: inputs.hypertension,
    }
}
