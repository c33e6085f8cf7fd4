use std::collections::BTreeMap;

use serde::Serialize;

use super::{bmi, round_to, ModelInfo, RiskError, RiskModelService};
use crate::models::{HealthRecord, PatientProfile};

const BP_WEIGHT: f64 = 0.4;
const GLUCOSE_WEIGHT: f64 = 0.4;
const BMI_WEIGHT: f64 = 0.2;

/// Clamp into `[0, 100]`; non-finite input yields 0.
fn clamp_score(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

pub fn bp_score(systolic: f64, diastolic: f64) -> f64 {
    clamp_score((systolic - 110.0) * 0.8 + (diastolic - 70.0) * 1.0)
}

pub fn glucose_score(glucose: f64) -> f64 {
    clamp_score((glucose - 90.0) * 0.5)
}

pub fn bmi_score(bmi: Option<f64>) -> f64 {
    bmi.map_or(0.0, |b| clamp_score((b - 22.0) * 3.0))
}

pub fn heuristic_blend(bp: f64, glucose: f64, bmi: f64) -> f64 {
    clamp_score(BP_WEIGHT * bp + GLUCOSE_WEIGHT * glucose + BMI_WEIGHT * bmi)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Heuristic,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreComponents {
    pub bp_score: f64,
    pub glucose_score: f64,
    pub bmi_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeRisk {
    pub ml_risk_score: f64,
    pub components: ScoreComponents,
    pub source: ScoreSource,
    pub model: ModelInfo,
}

/// Feature map handed to the predictive model. BTreeMap keeps the keys
/// in name order: bmi, dia, glucose, sys.
pub fn model_features(record: &HealthRecord, bmi: Option<f64>) -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("bmi".to_string(), bmi.unwrap_or(0.0)),
        ("dia".to_string(), f64::from(record.diastolic)),
        ("glucose".to_string(), record.blood_glucose),
        ("sys".to_string(), f64::from(record.systolic)),
    ])
}

/// 0-100 composite for the latest record. A loaded model's probability
/// replaces the heuristic blend; any model failure falls back silently.
pub fn composite_risk(
    profile: &PatientProfile,
    latest: Option<&HealthRecord>,
    models: &RiskModelService,
) -> Result<CompositeRisk, RiskError> {
    let record = latest.ok_or(RiskError::NoData)?;
    let bmi = bmi(profile.weight_kg, profile.height_cm);

    let bp = bp_score(f64::from(record.systolic), f64::from(record.diastolic));
    let glucose = glucose_score(record.blood_glucose);
    let bmi_part = bmi_score(bmi);

    let (score, source) = match models.predict(&model_features(record, bmi)) {
        Some(p) => (p * 100.0, ScoreSource::Model),
        None => (heuristic_blend(bp, glucose, bmi_part), ScoreSource::Heuristic),
    };

    Ok(CompositeRisk {
        ml_risk_score: round_to(score, 1),
        components: ScoreComponents {
            bp_score: round_to(bp, 1),
            glucose_score: round_to(glucose, 1),
            bmi_score: round_to(bmi_part, 1),
        },
        source,
        model: models.info(),
    })
}
