use crate::models::{AlertSeverity, DeviceReading, HealthRecord, ReadingType};

/// What a matched rule emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertEvent {
    pub alert_type: &'static str,
    pub message: &'static str,
    pub severity: AlertSeverity,
}

pub const HYPERTENSIVE_CRISIS: AlertEvent = AlertEvent {
    alert_type: "hypertensive_crisis",
    message: "Critical blood pressure detected. Seek immediate care.",
    severity: AlertSeverity::Critical,
};

pub const HYPOGLYCEMIA: AlertEvent = AlertEvent {
    alert_type: "hypoglycemia",
    message: "Low blood glucose detected. Take fast-acting carbs.",
    severity: AlertSeverity::Warning,
};

pub const HYPERGLYCEMIA: AlertEvent = AlertEvent {
    alert_type: "hyperglycemia",
    message: "Very high blood glucose detected. Consider medical advice.",
    severity: AlertSeverity::Warning,
};

/// The vitals a rule can look at. Absent values never match.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VitalSigns {
    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
    pub glucose: Option<f64>,
}

impl From<&HealthRecord> for VitalSigns {
    fn from(r: &HealthRecord) -> Self {
        Self {
            systolic: Some(r.systolic),
            diastolic: Some(r.diastolic),
            glucose: Some(r.blood_glucose),
        }
    }
}

impl From<&DeviceReading> for VitalSigns {
    /// BP rules see only `bp` readings carrying both values; glucose rules
    /// see only `glucose` readings.
    fn from(r: &DeviceReading) -> Self {
        match r.reading_type {
            ReadingType::BloodPressure => match (r.systolic, r.diastolic) {
                (Some(s), Some(d)) => Self { systolic: Some(s), diastolic: Some(d), glucose: None },
                _ => Self::default(),
            },
            ReadingType::Glucose => Self { glucose: Some(r.value), ..Self::default() },
            ReadingType::Weight | ReadingType::Bmi | ReadingType::Waist => Self::default(),
        }
    }
}

struct AlertRule {
    fires: fn(&VitalSigns) -> bool,
    event: AlertEvent,
}

fn bp_crisis(v: &VitalSigns) -> bool {
    match (v.systolic, v.diastolic) {
        (Some(s), Some(d)) => s >= 180 || d >= 120,
        _ => false,
    }
}

fn glucose_low(v: &VitalSigns) -> bool {
    v.glucose.is_some_and(|g| g < 70.0)
}

fn glucose_very_high(v: &VitalSigns) -> bool {
    v.glucose.is_some_and(|g| g >= 300.0)
}

/// Evaluated in full and in order.
const ALERT_RULES: &[AlertRule] = &[
    AlertRule { fires: bp_crisis, event: HYPERTENSIVE_CRISIS },
    AlertRule { fires: glucose_low, event: HYPOGLYCEMIA },
    AlertRule { fires: glucose_very_high, event: HYPERGLYCEMIA },
];

pub fn evaluate(vitals: &VitalSigns) -> Vec<AlertEvent> {
    ALERT_RULES
        .iter()
        .filter(|rule| (rule.fires)(vitals))
        .map(|rule| rule.event)
        .collect()
}

pub fn evaluate_record(record: &HealthRecord) -> Vec<AlertEvent> {
    evaluate(&VitalSigns::from(record))
}

pub fn evaluate_reading(reading: &DeviceReading) -> Vec<AlertEvent> {
    evaluate(&VitalSigns::from(reading))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::now_utc;
    use uuid::Uuid;

    fn glucose(v: f64) -> VitalSigns {
        VitalSigns { glucose: Some(v), ..Default::default() }
    }

    fn reading(reading_type: ReadingType, value: f64, sys: Option<i32>, dia: Option<i32>) -> DeviceReading {
        DeviceReading {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            reading_type,
            value,
            unit: reading_type.default_unit().into(),
            systolic: sys,
            diastolic: dia,
            source: "manual".into(),
            recorded_at: now_utc(),
        }
    }

    #[test]
    fn glucose_thresholds() {
        assert_eq!(evaluate(&glucose(65.0)), vec![HYPOGLYCEMIA]);
        assert_eq!(evaluate(&glucose(310.0)), vec![HYPERGLYCEMIA]);
        assert!(evaluate(&glucose(150.0)).is_empty());
        assert!(evaluate(&glucose(70.0)).is_empty());
        assert_eq!(evaluate(&glucose(300.0)), vec![HYPERGLYCEMIA]);
    }

    #[test]
    fn bp_crisis_on_either_value() {
        let sys = VitalSigns { systolic: Some(180), diastolic: Some(80), glucose: None };
        let dia = VitalSigns { systolic: Some(150), diastolic: Some(120), glucose: None };
        let ok = VitalSigns { systolic: Some(179), diastolic: Some(119), glucose: None };
        assert_eq!(evaluate(&sys), vec![HYPERTENSIVE_CRISIS]);
        assert_eq!(evaluate(&dia), vec![HYPERTENSIVE_CRISIS]);
        assert!(evaluate(&ok).is_empty());
    }

    #[test]
    fn record_can_fire_multiple_rules_in_order() {
        let record = HealthRecord {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            systolic: 190,
            diastolic: 100,
            blood_glucose: 50.0,
            bmi: 25.0,
            timestamp: now_utc(),
        };
        let events = evaluate_record(&record);
        assert_eq!(events, vec![HYPERTENSIVE_CRISIS, HYPOGLYCEMIA]);
        assert_eq!(events[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn bp_reading_needs_both_values() {
        assert!(evaluate_reading(&reading(ReadingType::BloodPressure, 0.0, Some(200), None)).is_empty());
        assert_eq!(
            evaluate_reading(&reading(ReadingType::BloodPressure, 0.0, Some(200), Some(90))),
            vec![HYPERTENSIVE_CRISIS]
        );
    }

    #[test]
    fn glucose_rules_ignore_other_reading_types() {
        assert!(evaluate_reading(&reading(ReadingType::Weight, 50.0, None, None)).is_empty());
        // A bp reading's value is not a glucose value.
        assert!(evaluate_reading(&reading(ReadingType::BloodPressure, 0.0, None, None)).is_empty());
        assert_eq!(evaluate_reading(&reading(ReadingType::Glucose, 42.0, None, None)), vec![HYPOGLYCEMIA]);
    }
}
