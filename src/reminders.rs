//! Background reminder jobs.
//!
//! A tokio task ticks every `reminder_interval` and runs:
//! 1. Appointment reminders for scheduled visits in the next 24 hours
//! 2. Medication reminders whose HH:MM fell between the previous tick and
//!    this one (local time)
//!
//! Both skip a patient who already got the same reminder today, so
//! running a job twice in one period does not spam.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rusqlite::Connection;
use serde_json::json;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::alerts::create_alert;
use crate::core_state::CoreState;
use crate::db::{now_utc, repository, DatabaseError};
use crate::models::AlertSeverity;
use crate::notification::{push_to_patient, Notifier, PushMessage};

pub const APPOINTMENT_REMINDER: &str = "appointment_reminder";
pub const MEDICATION_REMINDER: &str = "medication_reminder";

/// Alert type plus the push title and `data.type` that go with it.
struct ReminderKind {
    alert_type: &'static str,
    title: &'static str,
    push_type: &'static str,
}

const APPOINTMENT: ReminderKind = ReminderKind {
    alert_type: APPOINTMENT_REMINDER,
    title: "Appointment Reminder",
    push_type: "appointment",
};

const MEDICATION: ReminderKind = ReminderKind {
    alert_type: MEDICATION_REMINDER,
    title: "Medication Reminder",
    push_type: "medication",
};

/// How far ahead appointment reminders look.
const APPOINTMENT_WINDOW_HOURS: i64 = 24;

/// Create (and push) one reminder alert unless an identical one already
/// exists today. Returns true when a new alert was created.
fn remind_once(
    conn: &Connection,
    notifier: &Arc<dyn Notifier>,
    kind: &ReminderKind,
    patient_id: &uuid::Uuid,
    message: String,
    today: NaiveDate,
) -> Result<bool, DatabaseError> {
    if repository::alert_exists_on_day(conn, patient_id, kind.alert_type, &message, today)? {
        return Ok(false);
    }
    let alert = create_alert(conn, patient_id, kind.alert_type, message, AlertSeverity::Info)?;
    push_to_patient(
        conn,
        notifier,
        patient_id,
        PushMessage {
            title: kind.title.to_string(),
            body: alert.message,
            data: json!({ "type": kind.push_type }),
        },
    );
    Ok(true)
}

/// Remind about scheduled appointments in `[now, now + 24h]`.
pub fn run_appointment_reminders(
    conn: &Connection,
    notifier: &Arc<dyn Notifier>,
    now: NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let soon = now + Duration::hours(APPOINTMENT_WINDOW_HOURS);
    let mut created = 0;
    for appt in repository::list_scheduled_between(conn, &now, &soon)? {
        let message = format!(
            "Upcoming appointment: {} at {}",
            appt.title,
            appt.scheduled_for.format("%Y-%m-%d %H:%M UTC")
        );
        if remind_once(conn, notifier, &APPOINTMENT, &appt.patient_id, message, now.date())? {
            created += 1;
        }
    }
    Ok(created)
}

/// Reminder minutes one medication tick covers: `(after, until]` in local
/// time, wrapping at midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderWindow {
    after: NaiveTime,
    until: NaiveTime,
}

fn minute_of(t: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).unwrap_or(t)
}

impl ReminderWindow {
    /// Window for a tick at `now` after one at `previous`. The first tick,
    /// and any tick after the clock went backwards, covers only the
    /// current minute. A gap of a day or more covers the whole day.
    /// Returns `None` when the previous tick already covered this minute.
    pub fn for_tick(previous: Option<NaiveDateTime>, now: NaiveDateTime) -> Option<Self> {
        let until = minute_of(now.time());
        let after = match previous {
            Some(prev) if prev < now && now - prev >= Duration::days(1) => until,
            Some(prev) if prev < now => {
                let after = minute_of(prev.time());
                if after == until {
                    return None;
                }
                after
            }
            _ => until - Duration::minutes(1),
        };
        Some(Self { after, until })
    }
}

/// Remind about medications whose reminder time falls in `window`.
pub fn run_medication_reminders(
    conn: &Connection,
    notifier: &Arc<dyn Notifier>,
    window: ReminderWindow,
    today: NaiveDate,
) -> Result<usize, DatabaseError> {
    let mut created = 0;
    for med in repository::list_medications_due_between(conn, window.after, window.until)? {
        let message = format!("Time to take {} ({})", med.name, med.dosage);
        if remind_once(conn, notifier, &MEDICATION, &med.patient_id, message, today)? {
            created += 1;
        }
    }
    Ok(created)
}

// ═══════════════════════════════════════════════════════════
// Scheduler
// ═══════════════════════════════════════════════════════════

/// Handle for the reminder task. Dropping it also stops the task.
pub struct ReminderSchedulerHandle {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl ReminderSchedulerHandle {
    /// Stop after the current tick and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

impl Drop for ReminderSchedulerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

/// Spawn the reminder loop on the current tokio runtime.
pub fn start_reminder_scheduler(state: Arc<CoreState>) -> ReminderSchedulerHandle {
    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    let period = state.config().reminder_interval;

    let handle = tokio::spawn(async move {
        tracing::info!("Reminder scheduler started (every {}s)", period.as_secs());
        let mut ticker = tokio::time::interval(period);
        let mut last_tick = None;
        loop {
            tokio::select! {
                _ = signal.notified() => break,
                _ = ticker.tick() => last_tick = run_tick(&state, last_tick),
            }
        }
        tracing::info!("Reminder scheduler shutting down");
    });

    ReminderSchedulerHandle { shutdown, handle: Some(handle) }
}

/// Run both jobs once. Returns the local time the medication window now
/// reaches, or `previous` when the tick was skipped so the next one
/// catches up.
fn run_tick(state: &CoreState, previous: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
    let conn = match state.open_db() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(error = %e, "Reminder tick skipped: database unavailable");
            return previous;
        }
    };
    let notifier = state.notifier();
    let now = now_utc();

    match run_appointment_reminders(&conn, notifier, now) {
        Ok(0) => {}
        Ok(n) => tracing::info!(count = n, "Appointment reminders created"),
        Err(e) => tracing::warn!(error = %e, "Appointment reminder job failed"),
    }

    let local = chrono::Local::now().naive_local();
    let Some(window) = ReminderWindow::for_tick(previous, local) else {
        return previous;
    };
    match run_medication_reminders(&conn, notifier, window, now.date()) {
        Ok(0) => {}
        Ok(n) => tracing::info!(count = n, "Medication reminders created"),
        Err(e) => {
            tracing::warn!(error = %e, "Medication reminder job failed");
            return previous;
        }
    }
    Some(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Appointment, AppointmentStatus, Medication, Role};
    use crate::notification::NoopNotifier;
    use uuid::Uuid;

    fn notifier() -> Arc<dyn Notifier> {
        Arc::new(NoopNotifier)
    }

    fn appointment(patient_id: Uuid, title: &str, at: NaiveDateTime, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id,
            title: title.into(),
            scheduled_for: at,
            notes: String::new(),
            status,
            created_at: now_utc(),
        }
    }

    #[test]
    fn appointment_reminder_once_per_day() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "pat", Role::Patient);
        let now = now_utc();
        repository::insert_appointment(
            &conn,
            &appointment(p.id, "Clinic Visit", now + Duration::hours(3), AppointmentStatus::Scheduled),
        )
        .unwrap();

        assert_eq!(run_appointment_reminders(&conn, &notifier(), now).unwrap(), 1);
        assert_eq!(run_appointment_reminders(&conn, &notifier(), now).unwrap(), 0);

        let alerts = repository::list_alerts(&conn, &[p.id], false, None).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, APPOINTMENT_REMINDER);
        assert_eq!(alerts[0].severity, AlertSeverity::Info);
        assert!(alerts[0].message.starts_with("Upcoming appointment: Clinic Visit at "));
    }

    #[test]
    fn appointments_outside_window_or_not_scheduled_are_skipped() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "pat", Role::Patient);
        let now = now_utc();
        repository::insert_appointment(
            &conn,
            &appointment(p.id, "Far", now + Duration::days(3), AppointmentStatus::Scheduled),
        )
        .unwrap();
        repository::insert_appointment(
            &conn,
            &appointment(p.id, "Done", now + Duration::hours(1), AppointmentStatus::Completed),
        )
        .unwrap();
        assert_eq!(run_appointment_reminders(&conn, &notifier(), now).unwrap(), 0);
    }

    fn add_medication(conn: &Connection, patient_id: Uuid, name: &str, dosage: &str, hh: u32, mm: u32) {
        repository::insert_medication(
            conn,
            &Medication {
                id: Uuid::new_v4(),
                patient_id,
                name: name.into(),
                dosage: dosage.into(),
                frequency: "OD".into(),
                reminder_time: NaiveTime::from_hms_opt(hh, mm, 0).unwrap(),
            },
        )
        .unwrap();
    }

    fn local_at(today: NaiveDate, h: u32, m: u32, s: u32) -> NaiveDateTime {
        today.and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn medication_reminder_matches_minute_and_dedups() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "pat", Role::Patient);
        add_medication(&conn, p.id, "Metformin", "500mg", 8, 0);
        add_medication(&conn, p.id, "Amlodipine", "5mg", 20, 0);
        let today = now_utc().date();

        let eight_ish = ReminderWindow::for_tick(None, local_at(today, 8, 0, 42)).unwrap();
        assert_eq!(run_medication_reminders(&conn, &notifier(), eight_ish, today).unwrap(), 1);
        assert_eq!(run_medication_reminders(&conn, &notifier(), eight_ish, today).unwrap(), 0);

        let eight_pm = ReminderWindow::for_tick(None, local_at(today, 20, 0, 0)).unwrap();
        assert_eq!(run_medication_reminders(&conn, &notifier(), eight_pm, today).unwrap(), 1);

        let alerts = repository::list_alerts(&conn, &[p.id], false, None).unwrap();
        let messages: Vec<_> = alerts.iter().map(|a| a.message.as_str()).collect();
        assert!(messages.contains(&"Time to take Metformin (500mg)"));
        assert!(messages.contains(&"Time to take Amlodipine (5mg)"));
    }

    #[test]
    fn slow_ticks_still_catch_skipped_minutes() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::profile(&conn, "pat", Role::Patient);
        add_medication(&conn, p.id, "Metformin", "500mg", 8, 1);
        let today = now_utc().date();

        // Two ticks 120s apart, neither inside 08:01.
        let first = local_at(today, 8, 0, 30);
        let second = local_at(today, 8, 2, 30);
        let w1 = ReminderWindow::for_tick(None, first).unwrap();
        assert_eq!(run_medication_reminders(&conn, &notifier(), w1, today).unwrap(), 0);
        let w2 = ReminderWindow::for_tick(Some(first), second).unwrap();
        assert_eq!(run_medication_reminders(&conn, &notifier(), w2, today).unwrap(), 1);

        // The next window starts after 08:02 and does not repeat it.
        let w3 = ReminderWindow::for_tick(Some(second), local_at(today, 8, 4, 30)).unwrap();
        assert_eq!(run_medication_reminders(&conn, &notifier(), w3, today).unwrap(), 0);
    }

    #[test]
    fn window_edges() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let hm = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();

        // Same minute as the previous tick: nothing new to cover.
        assert_eq!(
            ReminderWindow::for_tick(Some(local_at(today, 8, 0, 5)), local_at(today, 8, 0, 50)),
            None
        );

        // Across midnight.
        let w = ReminderWindow::for_tick(
            Some(local_at(today, 23, 58, 10)),
            local_at(today.succ_opt().unwrap(), 0, 1, 10),
        )
        .unwrap();
        assert_eq!((w.after, w.until), (hm(23, 58), hm(0, 1)));

        // Clock stepped back: only the current minute.
        let w = ReminderWindow::for_tick(Some(local_at(today, 9, 30, 0)), local_at(today, 8, 45, 0)).unwrap();
        assert_eq!((w.after, w.until), (hm(8, 44), hm(8, 45)));

        // A day or more since the last tick covers every minute.
        let w = ReminderWindow::for_tick(Some(local_at(today, 7, 0, 0)), local_at(today, 7, 0, 0) + Duration::days(2))
            .unwrap();
        assert_eq!(w.after, w.until);
    }

    #[tokio::test]
    async fn scheduler_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::config::AppConfig::for_tests(dir.path().join("ncd.db"));
        config.reminder_interval = std::time::Duration::from_millis(10);
        let state = Arc::new(CoreState::new(config).unwrap());

        let handle = start_reminder_scheduler(Arc::clone(&state));
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        handle.shutdown().await;
    }
}
