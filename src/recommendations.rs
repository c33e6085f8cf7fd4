//! Advisory lifestyle tips derived from BMI and the latest record.

use crate::models::{HealthRecord, PatientProfile};
use crate::risk::bmi;

pub const UNDERWEIGHT_TIP: &str =
    "Increase calorie intake with nutrient-dense foods; consult a dietician.";
pub const HEALTHY_WEIGHT_TIP: &str =
    "Maintain balanced diet and regular physical activity (150 min/week).";
pub const OVERWEIGHT_TIP: &str = "Aim for 5-10% weight loss via calorie deficit and daily activity.";
pub const HIGH_BP_TIP: &str = "Reduce salt to <5g/day; DASH-style diet; monitor BP twice daily.";
pub const BP_CRISIS_TIP: &str = "Hypertensive crisis warning: seek immediate medical care.";
pub const HIGH_GLUCOSE_TIP: &str =
    "Limit refined sugars; prefer low-glycemic foods; walk 15–30 min after meals.";
pub const LOW_GLUCOSE_TIP: &str =
    "Carry fast-acting carbohydrates; review medication timing and meals.";
pub const DEFAULT_TIP: &str = "Stay hydrated, 7–8 hours sleep, and 30 minutes brisk walking daily.";

struct TipRule {
    applies: fn(&HealthRecord) -> bool,
    tip: &'static str,
}

fn bp_elevated(r: &HealthRecord) -> bool {
    r.systolic >= 140 || r.diastolic >= 90
}

fn bp_crisis(r: &HealthRecord) -> bool {
    r.systolic >= 180 || r.diastolic >= 120
}

fn glucose_high(r: &HealthRecord) -> bool {
    r.blood_glucose >= 180.0
}

fn glucose_low(r: &HealthRecord) -> bool {
    r.blood_glucose < 70.0
}

const RECORD_RULES: &[TipRule] = &[
    TipRule { applies: bp_elevated, tip: HIGH_BP_TIP },
    TipRule { applies: bp_crisis, tip: BP_CRISIS_TIP },
    TipRule { applies: glucose_high, tip: HIGH_GLUCOSE_TIP },
    TipRule { applies: glucose_low, tip: LOW_GLUCOSE_TIP },
];

fn bmi_tip(bmi: f64) -> &'static str {
    if bmi < 18.5 {
        UNDERWEIGHT_TIP
    } else if bmi < 25.0 {
        HEALTHY_WEIGHT_TIP
    } else {
        OVERWEIGHT_TIP
    }
}

/// Ordered tips; never empty. The BMI tip is skipped when BMI is
/// undefined, record tips when there is no record.
pub fn recommendations(profile: &PatientProfile, latest: Option<&HealthRecord>) -> Vec<&'static str> {
    let mut tips = Vec::new();
    if let Some(b) = bmi(profile.weight_kg, profile.height_cm) {
        tips.push(bmi_tip(b));
    }
    if let Some(record) = latest {
        tips.extend(RECORD_RULES.iter().filter(|r| (r.applies)(record)).map(|r| r.tip));
    }
    if tips.is_empty() {
        tips.push(DEFAULT_TIP);
    }
    tips
}
