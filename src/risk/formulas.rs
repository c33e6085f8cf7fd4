use serde::Serialize;

use super::{round_to, RiskError};
use crate::models::{HealthRecord, PatientProfile, Sex};

/// `weight_kg / (height_cm / 100)^2`, unrounded. `None` when either
/// input is missing, non-finite or non-positive.
pub fn bmi(weight_kg: f64, height_cm: f64) -> Option<f64> {
    if !weight_kg.is_finite() || !height_cm.is_finite() || weight_kg <= 0.0 || height_cm <= 0.0 {
        return None;
    }
    let height_m = height_cm / 100.0;
    Some(weight_kg / (height_m * height_m))
}

/// Inputs shared by the point rules.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreContext {
    pub age: i32,
    pub sex: Sex,
    /// Rounded to 2 decimals before any threshold check.
    pub bmi: Option<f64>,
    pub waist_cm: f64,
    pub glucose: f64,
    pub systolic: i32,
    pub diastolic: i32,
}

impl ScoreContext {
    pub fn new(profile: &PatientProfile, record: &HealthRecord) -> Self {
        Self {
            age: profile.age,
            sex: profile.sex(),
            bmi: bmi(profile.weight_kg, profile.height_cm).map(|b| round_to(b, 2)),
            waist_cm: profile.waist_cm,
            glucose: record.blood_glucose,
            systolic: record.systolic,
            diastolic: record.diastolic,
        }
    }
}

/// One additive rule: `points` are awarded when `applies` holds.
pub struct PointRule {
    pub name: &'static str,
    pub points: u32,
    pub applies: fn(&ScoreContext) -> bool,
}

fn age_40_plus(c: &ScoreContext) -> bool {
    c.age >= 40
}

fn age_45_plus(c: &ScoreContext) -> bool {
    c.age >= 45
}

fn bmi_25_plus(c: &ScoreContext) -> bool {
    c.bmi.is_some_and(|b| b >= 25.0)
}

fn male_waist_94_plus(c: &ScoreContext) -> bool {
    c.sex == Sex::Male && c.waist_cm >= 94.0
}

fn female_waist_80_plus(c: &ScoreContext) -> bool {
    c.sex == Sex::Female && c.waist_cm >= 80.0
}

fn glucose_126_plus(c: &ScoreContext) -> bool {
    c.glucose >= 126.0
}

fn elevated_bp(c: &ScoreContext) -> bool {
    c.systolic >= 140 || c.diastolic >= 90
}

pub const DIABETES_RULES: &[PointRule] = &[
    PointRule { name: "age_45_plus", points: 1, applies: age_45_plus },
    PointRule { name: "bmi_25_plus", points: 1, applies: bmi_25_plus },
    PointRule { name: "male_waist_94", points: 1, applies: male_waist_94_plus },
    PointRule { name: "female_waist_80", points: 1, applies: female_waist_80_plus },
    PointRule { name: "glucose_126_plus", points: 2, applies: glucose_126_plus },
    PointRule { name: "elevated_bp", points: 1, applies: elevated_bp },
];

pub const HYPERTENSION_RULES: &[PointRule] = &[
    PointRule { name: "age_40_plus", points: 1, applies: age_40_plus },
    PointRule { name: "bmi_25_plus", points: 1, applies: bmi_25_plus },
    PointRule { name: "elevated_bp", points: 2, applies: elevated_bp },
];

/// Sum of points for every rule that applies. Rules are independent.
pub fn score(rules: &[PointRule], ctx: &ScoreContext) -> u32 {
    rules.iter().filter(|r| (r.applies)(ctx)).map(|r| r.points).sum()
}

pub fn diabetes_score(ctx: &ScoreContext) -> u32 {
    score(DIABETES_RULES, ctx)
}

pub fn hypertension_score(ctx: &ScoreContext) -> u32 {
    score(HYPERTENSION_RULES, ctx)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub bmi: Option<f64>,
    pub diabetes_risk_score: u32,
    pub hypertension_risk_score: u32,
}

/// Score a patient against their latest record.
pub fn assess(
    profile: &PatientProfile,
    latest: Option<&HealthRecord>,
) -> Result<RiskAssessment, RiskError> {
    let record = latest.ok_or(RiskError::NoData)?;
    let ctx = ScoreContext::new(profile, record);
    Ok(RiskAssessment {
        bmi: ctx.bmi,
        diabetes_risk_score: diabetes_score(&ctx),
        hypertension_risk_score: hypertension_score(&ctx),
    })
}
