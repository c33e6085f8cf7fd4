//! Shared application state.
//!
//! `CoreState` is built once at startup and wrapped in `Arc`. It owns the
//! settings, the predictive-model service and the push transport; every
//! request opens its own SQLite connection through `open_db`.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db;
use crate::models::AuditAction;
use crate::notification::{notifier_from_key, Notifier};
use crate::risk::RiskModelService;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    config: AppConfig,
    /// Loaded once; a failed load is cached as the reason.
    risk_model: RiskModelService,
    notifier: Arc<dyn Notifier>,
}

impl CoreState {
    /// Build state from settings. Runs migrations once up front so a
    /// broken database fails at startup, not on the first request.
    pub fn new(config: AppConfig) -> Result<Self, CoreError> {
        db::open_database(&config.db_path)?;
        let risk_model = RiskModelService::load(config.risk_model_path.as_deref());
        let notifier = notifier_from_key(config.fcm_server_key.as_deref());
        Ok(Self { config, risk_model, notifier })
    }

    /// Swap in other collaborators (tests, embedding).
    pub fn with_parts(config: AppConfig, risk_model: RiskModelService, notifier: Arc<dyn Notifier>) -> Self {
        Self { config, risk_model, notifier }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn db_path(&self) -> &Path {
        &self.config.db_path
    }

    /// Open a fresh connection. Most common operation in handlers.
    pub fn open_db(&self) -> Result<Connection, CoreError> {
        db::open_database(&self.config.db_path).map_err(CoreError::Database)
    }

    pub fn risk_model(&self) -> &RiskModelService {
        &self.risk_model
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Append to the audit trail. A failed write is logged and dropped so
    /// it never fails the request that triggered it.
    pub fn record_audit(
        &self,
        conn: &Connection,
        account_id: Option<&Uuid>,
        entity: &str,
        object_id: &Uuid,
        action: AuditAction,
    ) {
        if let Err(e) = db::repository::insert_audit_entry(conn, account_id, entity, object_id, action) {
            tracing::warn!(entity, object = %object_id, error = %e, "Audit write failed");
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::notification::NoopNotifier;

    fn temp_state() -> (tempfile::TempDir, CoreState) {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::for_tests(dir.path().join("ncd.db"));
        let state = CoreState::new(config).unwrap();
        (dir, state)
    }

    #[test]
    fn new_creates_database() {
        let (dir, state) = temp_state();
        assert!(dir.path().join("ncd.db").exists());
        assert_eq!(state.db_path(), dir.path().join("ncd.db"));
        let conn = state.open_db().unwrap();
        assert_eq!(db::count_tables(&conn).unwrap(), 19);
    }

    #[test]
    fn missing_model_path_means_heuristic_only() {
        let (_dir, state) = temp_state();
        assert!(!state.risk_model().info().loaded);
    }

    #[test]
    fn bad_model_path_does_not_fail_startup() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::for_tests(dir.path().join("ncd.db"));
        config.risk_model_path = Some(dir.path().join("missing.json"));
        let state = CoreState::new(config).unwrap();
        assert!(state.risk_model().load_error().is_some());
    }

    #[test]
    fn record_audit_persists_entry() {
        let (_dir, state) = temp_state();
        let conn = state.open_db().unwrap();
        let p = db::repository::fixtures::profile(&conn, "pat", Role::Patient);
        let object = Uuid::new_v4();
        state.record_audit(&conn, Some(&p.account_id), "HealthRecord", &object, AuditAction::Create);

        let entries = db::repository::list_audit_entries(&conn, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entity, "HealthRecord");
        assert_eq!(entries[0].object_id, object.to_string());
    }

    #[test]
    fn with_parts_keeps_given_collaborators() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::for_tests(dir.path().join("ncd.db"));
        let state = CoreState::with_parts(config, RiskModelService::disabled(), Arc::new(NoopNotifier));
        assert!(state.risk_model().load_error().is_none());
    }
}
