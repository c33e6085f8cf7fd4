//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;
use crate::risk::ModelInfo;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub risk_model: ModelInfo,
    pub version: &'static str,
}

/// `GET /api/health`: liveness plus database and model status. Public.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let database = match ctx.core.open_db() {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database unavailable");
            false
        }
    };

    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
        risk_model: ctx.core.risk_model().info(),
        version: crate::config::APP_VERSION,
    })
}
