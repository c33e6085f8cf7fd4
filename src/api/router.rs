//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Auth validator → 2. Audit logger
//!
//! `/register`, `/login` and `/health` skip the auth layer. CORS is open
//! to any origin for browser clients.

use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Auth → Audit (innermost) → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/logout", post(endpoints::auth::logout))
        // Profiles
        .route(
            "/profile/me",
            get(endpoints::profiles::me).put(endpoints::profiles::update_me),
        )
        .route("/patients/:id", get(endpoints::profiles::patient))
        // Vitals
        .route(
            "/records",
            get(endpoints::records::list_records).post(endpoints::records::create_record),
        )
        .route(
            "/device-readings",
            get(endpoints::records::list_readings).post(endpoints::records::create_reading),
        )
        // Alerts
        .route("/alerts", get(endpoints::alerts::list))
        .route("/alerts/:id/acknowledge", post(endpoints::alerts::acknowledge))
        .route("/alerts/:id/snooze", post(endpoints::alerts::snooze))
        // Risk
        .route("/risk/me", get(endpoints::risk::risk_me))
        .route("/risk/:patient_id", get(endpoints::risk::risk_for))
        .route("/risk-ml/me", get(endpoints::risk::risk_ml_me))
        .route("/risk-ml/:patient_id", get(endpoints::risk::risk_ml_for))
        .route("/risk-ada/me", get(endpoints::risk::risk_ada_me))
        .route("/recommendations", get(endpoints::risk::recommendations))
        // Care plan
        .route(
            "/medications",
            get(endpoints::care_plan::list_medications).post(endpoints::care_plan::create_medication),
        )
        .route(
            "/appointments",
            get(endpoints::care_plan::list_appointments).post(endpoints::care_plan::create_appointment),
        )
        // Questionnaires
        .route(
            "/questionnaires",
            get(endpoints::questionnaires::list).post(endpoints::questionnaires::submit),
        )
        .route("/questionnaires/my", get(endpoints::questionnaires::my))
        .route(
            "/questionnaire-templates",
            get(endpoints::questionnaires::list_templates)
                .post(endpoints::questionnaires::create_template),
        )
        // Quizzes
        .route(
            "/quizzes",
            get(endpoints::quizzes::list).post(endpoints::quizzes::create),
        )
        .route("/quiz-questions", post(endpoints::quizzes::create_question))
        .route(
            "/quiz-responses",
            get(endpoints::quizzes::list_responses).post(endpoints::quizzes::submit),
        )
        // Assignments
        .route(
            "/assignments",
            get(endpoints::assignments::provider_list).post(endpoints::assignments::provider_assign),
        )
        .route(
            "/assignments/my-patients",
            get(endpoints::assignments::provider_my_patients),
        )
        .route(
            "/assignments/:patient_id",
            delete(endpoints::assignments::provider_unassign),
        )
        .route(
            "/worker-assignments",
            get(endpoints::assignments::worker_list).post(endpoints::assignments::worker_assign),
        )
        .route(
            "/worker-assignments/my-patients",
            get(endpoints::assignments::worker_my_patients),
        )
        .route(
            "/worker-assignments/:patient_id",
            delete(endpoints::assignments::worker_unassign),
        )
        // Consents and export
        .route(
            "/consents",
            get(endpoints::consents::list).post(endpoints::consents::upsert),
        )
        .route("/export", get(endpoints::export::patient_export))
        // Analytics
        .route("/analytics", get(endpoints::analytics::summary))
        .route("/analytics/timeseries", get(endpoints::analytics::timeseries))
        .route("/analytics/report", get(endpoints::analytics::report))
        .route("/analytics/weekly", get(endpoints::analytics::weekly))
        .route("/analytics/export", get(endpoints::analytics::export_csv))
        // Notifications
        .route(
            "/push-devices",
            get(endpoints::notifications::list_devices)
                .post(endpoints::notifications::register_device),
        )
        .route(
            "/push-devices/send-test",
            post(endpoints::notifications::send_test),
        )
        .route("/notifications", get(endpoints::notifications::feed))
        .route("/audit-logs", get(endpoints::notifications::audit_logs))
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes (audited, no auth required)
    let public = Router::new()
        .route("/register", post(endpoints::auth::register))
        .route("/login", post(endpoints::auth::login))
        .route("/health", get(endpoints::health::check))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected)
        .nest("/api", public)
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}
