//! Access logging middleware.
//!
//! Logs every API request with the caller, method, path and response
//! status. Runs innermost (after auth has injected `AuthContext`).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::AuthContext;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let caller = req
        .extensions()
        .get::<AuthContext>()
        .map(|a| a.account.username.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    let response = next.run(req).await;

    tracing::info!(
        caller = %caller,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        "API access"
    );

    response
}
