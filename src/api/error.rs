//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::accounts::AccountError;
use crate::authorization::AccessError;
use crate::core_state::CoreError;
use crate::quiz::QuizError;
use crate::risk::RiskError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {message}")]
    Validation { message: String, fields: Vec<String> },
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ApiError::Validation { message: message.into(), fields: vec![field.to_string()] }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, fields) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
                None,
            ),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, "FORBIDDEN", detail, None),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail, None),
            ApiError::Validation { message, fields } => {
                (StatusCode::BAD_REQUEST, "VALIDATION", message, Some(fields))
            }
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail, None),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message, fields },
        };
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            AccessError::Forbidden(reason) => ApiError::Forbidden(reason),
            AccessError::PatientRequired => ApiError::BadRequest("patient_id is required".into()),
            AccessError::Database(e) => e.into(),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation { message, fields } => ApiError::Validation { message, fields },
            AccountError::UsernameTaken => ApiError::invalid("username", "Username already exists"),
            AccountError::InvalidCredentials => ApiError::Unauthorized,
            AccountError::MissingProfile => ApiError::BadRequest("Account has no profile".into()),
            AccountError::Database(e) => e.into(),
        }
    }
}

impl From<RiskError> for ApiError {
    fn from(err: RiskError) -> Self {
        match err {
            RiskError::NoData => ApiError::NotFound("No health record found for this patient".into()),
        }
    }
}

impl From<QuizError> for ApiError {
    fn from(err: QuizError) -> Self {
        match err {
            QuizError::QuizNotFound => ApiError::NotFound("Quiz not found".into()),
            QuizError::Database(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
        assert!(json["error"].get("fields").is_none());
    }

    #[tokio::test]
    async fn validation_lists_fields() {
        let response = ApiError::Validation {
            message: "Missing required fields: age, sex".into(),
            fields: vec!["age".into(), "sex".into()],
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION");
        assert_eq!(json["error"]["fields"], serde_json::json!(["age", "sex"]));
    }

    #[tokio::test]
    async fn forbidden_returns_403() {
        let response = ApiError::Forbidden("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn internal_returns_500() {
        let response = ApiError::Internal("something broke".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        // Internal errors hide details from client
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[test]
    fn access_errors_map_to_statuses() {
        assert!(matches!(ApiError::from(AccessError::NotFound("Patient".into())), ApiError::NotFound(m) if m == "Patient not found"));
        assert!(matches!(ApiError::from(AccessError::Forbidden("x".into())), ApiError::Forbidden(_)));
        assert!(matches!(ApiError::from(AccessError::PatientRequired), ApiError::BadRequest(_)));
    }

    #[test]
    fn missing_record_is_not_found() {
        assert!(matches!(ApiError::from(RiskError::NoData), ApiError::NotFound(_)));
    }

    #[test]
    fn bad_credentials_are_unauthorized() {
        assert!(matches!(ApiError::from(AccountError::InvalidCredentials), ApiError::Unauthorized));
        assert!(matches!(ApiError::from(AccountError::UsernameTaken), ApiError::Validation { .. }));
    }
}
