//! Push delivery for alerts and reminders.
//!
//! Sends are fire-and-forget: the write path spawns them and moves on,
//! and every failure ends up as a `warn!` line, never an error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository;
use crate::models::Alert;

pub const FCM_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";
const FCM_TIMEOUT: Duration = Duration::from_secs(10);
const NOT_CONFIGURED: &str = "FCM_SERVER_KEY not configured";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("FCM_SERVER_KEY not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("FCM rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Result of one delivery attempt, as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub message: String,
}

impl From<Result<String, NotifyError>> for SendOutcome {
    fn from(result: Result<String, NotifyError>) -> Self {
        match result {
            Ok(message) => Self { success: true, message },
            Err(e) => Self { success: false, message: e.to_string() },
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, token: &str, title: &str, body: &str, data: &serde_json::Value) -> SendOutcome;
}

// ═══════════════════════════════════════════════════════════
// Implementations
// ═══════════════════════════════════════════════════════════

/// Firebase legacy HTTP API.
pub struct FcmNotifier {
    client: reqwest::Client,
    server_key: String,
    endpoint: String,
}

impl FcmNotifier {
    pub fn new(server_key: impl Into<String>) -> Result<Self, NotifyError> {
        Self::with_endpoint(server_key, FCM_ENDPOINT)
    }

    pub fn with_endpoint(server_key: impl Into<String>, endpoint: &str) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(FCM_TIMEOUT).build()?;
        Ok(Self {
            client,
            server_key: server_key.into(),
            endpoint: endpoint.to_string(),
        })
    }

    async fn try_send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> Result<String, NotifyError> {
        let payload = json!({
            "to": token,
            "notification": { "title": title, "body": body },
            "data": data,
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&payload)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if status.is_success() {
            Ok(text)
        } else {
            Err(NotifyError::Rejected { status: status.as_u16(), body: text })
        }
    }
}

#[async_trait]
impl Notifier for FcmNotifier {
    async fn send(&self, token: &str, title: &str, body: &str, data: &serde_json::Value) -> SendOutcome {
        self.try_send(token, title, body, data).await.into()
    }
}

/// Used when no server key is configured. Every send reports failure.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _: &str, _: &str, _: &str, _: &serde_json::Value) -> SendOutcome {
        SendOutcome::from(Err::<String, _>(NotifyError::NotConfigured))
    }
}

/// Pick the transport for the configured key.
pub fn notifier_from_key(server_key: Option<&str>) -> Arc<dyn Notifier> {
    match server_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => match FcmNotifier::new(key) {
            Ok(fcm) => Arc::new(fcm),
            Err(e) => {
                tracing::warn!(error = %e, "FCM client init failed, push disabled");
                Arc::new(NoopNotifier)
            }
        },
        None => {
            tracing::info!("{NOT_CONFIGURED}; push notifications disabled");
            Arc::new(NoopNotifier)
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Fan-out
// ═══════════════════════════════════════════════════════════

/// One message for every registered device of a patient.
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

impl PushMessage {
    pub fn for_alert(alert: &Alert) -> Self {
        Self {
            title: alert.alert_type.clone(),
            body: alert.message.clone(),
            data: json!({ "severity": alert.severity.as_str() }),
        }
    }
}

/// Look up the patient's push tokens and deliver in the background.
/// Lookup or delivery failures are logged and dropped.
pub fn push_to_patient(
    conn: &Connection,
    notifier: &Arc<dyn Notifier>,
    patient_id: &Uuid,
    message: PushMessage,
) {
    let tokens = match repository::list_push_tokens_for_profile(conn, patient_id) {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(patient = %patient_id, error = %e, "Push token lookup failed");
            return;
        }
    };
    if tokens.is_empty() {
        return;
    }
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        tracing::warn!("No async runtime, push skipped");
        return;
    };
    let notifier = Arc::clone(notifier);
    handle.spawn(async move {
        deliver(notifier.as_ref(), &tokens, &message).await;
    });
}

pub fn push_alert(conn: &Connection, notifier: &Arc<dyn Notifier>, alert: &Alert) {
    push_to_patient(conn, notifier, &alert.patient_id, PushMessage::for_alert(alert));
}

/// Send to each token in turn. Returns how many sends succeeded.
pub async fn deliver(notifier: &dyn Notifier, tokens: &[String], message: &PushMessage) -> usize {
    let mut delivered = 0;
    for token in tokens {
        let outcome = notifier.send(token, &message.title, &message.body, &message.data).await;
        if outcome.success {
            delivered += 1;
        } else {
            tracing::warn!(title = %message.title, reason = %outcome.message, "Push delivery failed");
        }
    }
    delivered
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Captures (token, title, body) for every send.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String, String)>>,
    }

    impl RecordingNotifier {
        pub fn sent(&self) -> Vec<(String, String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, token: &str, title: &str, body: &str, _: &serde_json::Value) -> SendOutcome {
            self.sent
                .lock()
                .unwrap()
                .push((token.to_string(), title.to_string(), body.to_string()));
            SendOutcome { success: true, message: "ok".into() }
        }
    }
}
