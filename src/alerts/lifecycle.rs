use rusqlite::Connection;
use uuid::Uuid;

use super::AlertEvent;
use crate::authorization::{AccessError, AccessScope};
use crate::db::{now_utc, repository, DatabaseError};
use crate::models::{Alert, AlertSeverity};

pub const SNOOZE_MESSAGE: &str = "Reminder snoozed. We'll notify you later.";

pub fn create_alert(
    conn: &Connection,
    patient_id: &Uuid,
    alert_type: impl Into<String>,
    message: impl Into<String>,
    severity: AlertSeverity,
) -> Result<Alert, DatabaseError> {
    let alert = Alert {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        alert_type: alert_type.into(),
        message: message.into(),
        severity,
        resolved: false,
        created_at: now_utc(),
    };
    repository::insert_alert(conn, &alert)?;
    Ok(alert)
}

/// Persist one alert per matched rule, in rule order.
pub fn raise_alerts(
    conn: &Connection,
    patient_id: &Uuid,
    events: &[AlertEvent],
) -> Result<Vec<Alert>, DatabaseError> {
    let mut created = Vec::with_capacity(events.len());
    for event in events {
        let alert = create_alert(conn, patient_id, event.alert_type, event.message, event.severity)?;
        tracing::info!(
            patient = %patient_id,
            alert_type = event.alert_type,
            severity = event.severity.as_str(),
            "Alert raised"
        );
        created.push(alert);
    }
    Ok(created)
}

/// Alerts outside the caller's scope look exactly like missing ones.
fn scoped_alert(conn: &Connection, scope: &AccessScope, alert_id: &Uuid) -> Result<Alert, AccessError> {
    repository::get_alert(conn, alert_id)?
        .filter(|a| scope.contains(&a.patient_id))
        .ok_or_else(|| AccessError::NotFound("Alert".into()))
}

/// Mark resolved. Acknowledging twice is a no-op.
pub fn acknowledge(conn: &Connection, scope: &AccessScope, alert_id: &Uuid) -> Result<Alert, AccessError> {
    let mut alert = scoped_alert(conn, scope, alert_id)?;
    repository::resolve_alert(conn, alert_id)?;
    alert.resolved = true;
    Ok(alert)
}

/// Resolve the alert and schedule a follow-up by creating an `info`
/// alert `snoozed_<type>` right away. Each call creates exactly one
/// follow-up, also for already-resolved alerts. Returns the follow-up.
pub fn snooze(conn: &Connection, scope: &AccessScope, alert_id: &Uuid) -> Result<Alert, AccessError> {
    let alert = scoped_alert(conn, scope, alert_id)?;
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    repository::resolve_alert(&tx, alert_id)?;
    let follow_up = create_alert(
        &tx,
        &alert.patient_id,
        format!("snoozed_{}", alert.alert_type),
        SNOOZE_MESSAGE,
        AlertSeverity::Info,
    )?;
    tx.commit().map_err(DatabaseError::from)?;
    Ok(follow_up)
}
