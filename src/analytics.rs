//! Reading aggregates for dashboards and self-monitoring reports.
//!
//! Everything here works on already-scoped `DeviceReading` slices; the
//! loaders only pick the patient's rows.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::repository::{self, ReadingFilter};
use crate::db::DatabaseError;
use crate::models::{DeviceReading, ReadingType};

pub const DEFAULT_TIMESERIES_LIMIT: u32 = 100;
pub const CSV_HEADER: [&str; 6] = ["type", "value", "unit", "systolic", "diastolic", "recorded_at"];

// ═══════════════════════════════════════════════════════════
// Summary
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlucoseStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BloodPressureStats {
    pub max_sys: Option<i32>,
    pub min_sys: Option<i32>,
    pub max_dia: Option<i32>,
    pub min_dia: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub glucose: GlucoseStats,
    pub blood_pressure: BloodPressureStats,
    pub count_readings: usize,
}

fn of_type(readings: &[DeviceReading], t: ReadingType) -> impl Iterator<Item = &DeviceReading> {
    readings.iter().filter(move |r| r.reading_type == t)
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.into_iter().fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

pub fn summarize(readings: &[DeviceReading]) -> Summary {
    let glucose: Vec<f64> = of_type(readings, ReadingType::Glucose).map(|r| r.value).collect();
    let bp: Vec<&DeviceReading> = of_type(readings, ReadingType::BloodPressure).collect();
    let sys = || bp.iter().filter_map(|r| r.systolic);
    let dia = || bp.iter().filter_map(|r| r.diastolic);

    Summary {
        glucose: GlucoseStats {
            min: glucose.iter().copied().reduce(f64::min),
            max: glucose.iter().copied().reduce(f64::max),
            avg: mean(glucose.iter().copied()),
        },
        blood_pressure: BloodPressureStats {
            max_sys: sys().max(),
            min_sys: sys().min(),
            max_dia: dia().max(),
            min_dia: dia().min(),
        },
        count_readings: readings.len(),
    }
}

// ═══════════════════════════════════════════════════════════
// Time series
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlucosePoint {
    pub t: NaiveDateTime,
    pub v: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BpPoint {
    pub t: NaiveDateTime,
    pub sys: Option<i32>,
    pub dia: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub glucose: Vec<GlucosePoint>,
    pub bp: Vec<BpPoint>,
}

/// The newest `limit` glucose and bp readings, each returned oldest first.
pub fn timeseries(conn: &Connection, patient_id: &Uuid, limit: u32) -> Result<TimeSeries, DatabaseError> {
    let latest = |t| {
        let filter = ReadingFilter { reading_type: Some(t), limit: Some(limit), ..Default::default() };
        repository::list_device_readings(conn, std::slice::from_ref(patient_id), &filter)
    };
    let glucose = latest(ReadingType::Glucose)?
        .into_iter()
        .rev()
        .map(|r| GlucosePoint { t: r.recorded_at, v: r.value })
        .collect();
    let bp = latest(ReadingType::BloodPressure)?
        .into_iter()
        .rev()
        .map(|r| BpPoint { t: r.recorded_at, sys: r.systolic, dia: r.diastolic })
        .collect();
    Ok(TimeSeries { glucose, bp })
}

// ═══════════════════════════════════════════════════════════
// Daily / weekly aggregates
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyGlucose {
    pub day: NaiveDate,
    pub avg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyBp {
    pub day: NaiveDate,
    pub avg_sys: Option<f64>,
    pub avg_dia: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAggregates {
    pub glucose: Vec<DailyGlucose>,
    pub bp: Vec<DailyBp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadingCounts {
    pub glucose: usize,
    pub bp: usize,
    pub weight: usize,
    pub bmi: usize,
    pub waist: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub daily: DailyAggregates,
    pub counts: ReadingCounts,
}

fn by_day<'a>(readings: impl Iterator<Item = &'a DeviceReading>) -> BTreeMap<NaiveDate, Vec<&'a DeviceReading>> {
    let mut days: BTreeMap<NaiveDate, Vec<&DeviceReading>> = BTreeMap::new();
    for r in readings {
        days.entry(r.recorded_at.date()).or_default().push(r);
    }
    days
}

/// Average glucose per calendar day (UTC), oldest day first.
pub fn daily_glucose(readings: &[DeviceReading]) -> Vec<DailyGlucose> {
    by_day(of_type(readings, ReadingType::Glucose))
        .into_iter()
        .map(|(day, rows)| DailyGlucose { day, avg: mean(rows.iter().map(|r| r.value)) })
        .collect()
}

/// Average systolic/diastolic per calendar day (UTC), oldest day first.
pub fn daily_bp(readings: &[DeviceReading]) -> Vec<DailyBp> {
    by_day(of_type(readings, ReadingType::BloodPressure))
        .into_iter()
        .map(|(day, rows)| DailyBp {
            day,
            avg_sys: mean(rows.iter().filter_map(|r| r.systolic).map(f64::from)),
            avg_dia: mean(rows.iter().filter_map(|r| r.diastolic).map(f64::from)),
        })
        .collect()
}

pub fn count_by_type(readings: &[DeviceReading]) -> ReadingCounts {
    let mut counts = ReadingCounts::default();
    for r in readings {
        let slot = match r.reading_type {
            ReadingType::Glucose => &mut counts.glucose,
            ReadingType::BloodPressure => &mut counts.bp,
            ReadingType::Weight => &mut counts.weight,
            ReadingType::Bmi => &mut counts.bmi,
            ReadingType::Waist => &mut counts.waist,
        };
        *slot += 1;
    }
    counts
}

pub fn report(readings: &[DeviceReading]) -> Report {
    Report {
        daily: DailyAggregates { glucose: daily_glucose(readings), bp: daily_bp(readings) },
        counts: count_by_type(readings),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyGlucose {
    pub week_start: NaiveDate,
    pub avg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyBp {
    pub week_start: NaiveDate,
    pub avg_sys: Option<f64>,
    pub avg_dia: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Weekly {
    pub glucose: Vec<WeeklyGlucose>,
    pub bp: Vec<WeeklyBp>,
}

/// Monday of the ISO week containing `day`.
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

/// Weekly buckets (Monday start). Each bucket averages the daily
/// averages, so a busy day does not outweigh a quiet one.
pub fn weekly(readings: &[DeviceReading]) -> Weekly {
    let mut glucose_weeks: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for d in daily_glucose(readings) {
        let bucket = glucose_weeks.entry(week_start(d.day)).or_default();
        bucket.extend(d.avg);
    }
    let mut bp_weeks: BTreeMap<NaiveDate, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for d in daily_bp(readings) {
        let (sys, dia) = bp_weeks.entry(week_start(d.day)).or_default();
        sys.extend(d.avg_sys);
        dia.extend(d.avg_dia);
    }

    Weekly {
        glucose: glucose_weeks
            .into_iter()
            .map(|(week_start, avgs)| WeeklyGlucose { week_start, avg: mean(avgs) })
            .collect(),
        bp: bp_weeks
            .into_iter()
            .map(|(week_start, (sys, dia))| WeeklyBp { week_start, avg_sys: mean(sys), avg_dia: mean(dia) })
            .collect(),
    }
}

// ═══════════════════════════════════════════════════════════
// CSV
// ═══════════════════════════════════════════════════════════

/// Quote a field when it contains a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row(out: &mut String, fields: &[String]) {
    let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

/// RFC 4180 export, rows in the order given (callers pass newest first).
pub fn readings_csv(readings: &[DeviceReading]) -> String {
    let mut out = String::new();
    csv_row(&mut out, &CSV_HEADER.map(String::from));
    for r in readings {
        let opt = |v: Option<i32>| v.map(|x| x.to_string()).unwrap_or_default();
        csv_row(
            &mut out,
            &[
                r.reading_type.as_str().to_string(),
                r.value.to_string(),
                r.unit.clone(),
                opt(r.systolic),
                opt(r.diastolic),
                r.recorded_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            ],
        );
    }
    out
}

/// All readings for one patient, newest first.
pub fn patient_readings(conn: &Connection, patient_id: &Uuid) -> Result<Vec<DeviceReading>, DatabaseError> {
    repository::list_device_readings(conn, std::slice::from_ref(patient_id), &ReadingFilter::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Role;

    fn at(date: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M").unwrap()
    }

    fn glucose(pid: Uuid, v: f64, when: &str) -> DeviceReading {
        DeviceReading { recorded_at: at(when), ..fixtures::glucose_reading(pid, v) }
    }

    fn bp(pid: Uuid, sys: i32, dia: i32, when: &str) -> DeviceReading {
        DeviceReading { recorded_at: at(when), ..fixtures::bp_reading(pid, sys, dia) }
    }

    #[test]
    fn summary_of_mixed_readings() {
        let pid = Uuid::new_v4();
        let readings = vec![
            glucose(pid, 90.0, "2024-03-04 08:00"),
            glucose(pid, 150.0, "2024-03-04 20:00"),
            bp(pid, 130, 85, "2024-03-04 08:05"),
            bp(pid, 150, 95, "2024-03-05 08:05"),
        ];
        let s = summarize(&readings);
        assert_eq!(s.glucose, GlucoseStats { min: Some(90.0), max: Some(150.0), avg: Some(120.0) });
        assert_eq!(s.blood_pressure.max_sys, Some(150));
        assert_eq!(s.blood_pressure.min_dia, Some(85));
        assert_eq!(s.count_readings, 4);
    }

    #[test]
    fn summary_of_nothing_is_all_null() {
        let s = summarize(&[]);
        assert_eq!(s.glucose, GlucoseStats::default());
        assert_eq!(s.blood_pressure, BloodPressureStats::default());
        assert_eq!(s.count_readings, 0);
        let json = serde_json::to_value(&s).unwrap();
        assert!(json["glucose"]["avg"].is_null());
    }

    #[test]
    fn daily_averages_group_by_date() {
        let pid = Uuid::new_v4();
        let readings = vec![
            glucose(pid, 100.0, "2024-03-05 08:00"),
            glucose(pid, 140.0, "2024-03-05 20:00"),
            glucose(pid, 80.0, "2024-03-04 08:00"),
        ];
        let daily = daily_glucose(&readings);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].day, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(daily[1].avg, Some(120.0));
    }

    #[test]
    fn report_counts_every_type() {
        let pid = Uuid::new_v4();
        let mut weight = fixtures::glucose_reading(pid, 70.0);
        weight.reading_type = ReadingType::Weight;
        let readings = vec![glucose(pid, 100.0, "2024-03-05 08:00"), bp(pid, 120, 80, "2024-03-05 08:00"), weight];
        let r = report(&readings);
        assert_eq!(r.counts, ReadingCounts { glucose: 1, bp: 1, weight: 1, bmi: 0, waist: 0 });
        assert_eq!(r.daily.bp[0].avg_sys, Some(120.0));
    }

    #[test]
    fn week_starts_on_monday() {
        // 2024-03-07 is a Thursday
        let thu = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(week_start(thu), NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        let mon = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(week_start(mon), mon);
    }

    #[test]
    fn weekly_averages_daily_averages() {
        let pid = Uuid::new_v4();
        let readings = vec![
            // Monday: two readings, daily avg 100
            glucose(pid, 90.0, "2024-03-04 08:00"),
            glucose(pid, 110.0, "2024-03-04 20:00"),
            // Wednesday: one reading, daily avg 160
            glucose(pid, 160.0, "2024-03-06 08:00"),
            // Next Monday
            glucose(pid, 120.0, "2024-03-11 08:00"),
            bp(pid, 140, 90, "2024-03-05 08:00"),
        ];
        let w = weekly(&readings);
        assert_eq!(w.glucose.len(), 2);
        assert_eq!(w.glucose[0].week_start, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(w.glucose[0].avg, Some(130.0));
        assert_eq!(w.glucose[1].avg, Some(120.0));
        assert_eq!(w.bp[0].avg_dia, Some(90.0));
    }

    #[test]
    fn csv_has_fixed_column_order() {
        let pid = Uuid::new_v4();
        let readings = vec![bp(pid, 150, 95, "2024-03-05 08:05"), glucose(pid, 98.5, "2024-03-04 08:00")];
        let csv = readings_csv(&readings);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[0], "type,value,unit,systolic,diastolic,recorded_at");
        assert!(lines[1].starts_with("bp,"));
        assert!(lines[1].ends_with(",mmHg,150,95,2024-03-05T08:05:00Z"));
        assert_eq!(lines[2], "glucose,98.5,mg/dL,,,2024-03-04T08:00:00Z");
    }

    #[test]
    fn csv_quotes_special_characters() {
        assert_eq!(csv_field("mg,dL"), "\"mg,dL\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("plain"), "plain");
    }

    #[test]
    fn timeseries_is_latest_n_oldest_first() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "pat", Role::Patient);
        for (i, v) in [100.0, 110.0, 120.0].into_iter().enumerate() {
            let when = format!("2024-03-0{} 08:00", i + 1);
            repository::insert_device_reading(&conn, &glucose(p.id, v, &when)).unwrap();
        }
        repository::insert_device_reading(&conn, &bp(p.id, 130, 85, "2024-03-02 09:00")).unwrap();

        let ts = timeseries(&conn, &p.id, 2).unwrap();
        let values: Vec<f64> = ts.glucose.iter().map(|g| g.v).collect();
        assert_eq!(values, vec![110.0, 120.0]);
        assert_eq!(ts.bp.len(), 1);
        assert_eq!(ts.bp[0].sys, Some(130));
    }
}
