use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Field-level validation detail surfaced in the error envelope.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Validation error without field details.
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Validation error pinned to a single field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        AppError::Validation {
            message: message.clone(),
            details: vec![FieldError::new(field, message)],
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

/// Hide internal detail from clients in production, keep it for the log.
fn guarded(generic: &str, detail: String) -> (String, String) {
    let client = if is_production() {
        generic.to_string()
    } else {
        detail.clone()
    };
    (client, detail)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;

        let (status, code, client_message, log_message) = match self {
            AppError::Config(e) => {
                let (client, log) = guarded("Configuration error", e.to_string());
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", client, log)
            }
            AppError::Auth(msg) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                msg.clone(),
                msg,
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone(), msg),
            AppError::Validation {
                message,
                details: fields,
            } => {
                if !fields.is_empty() {
                    details = Some(fields);
                }
                (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    message.clone(),
                    message,
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone(), msg),
            AppError::Gone(msg) => (StatusCode::GONE, "GONE", msg.clone(), msg),
            AppError::Database(e) => {
                let (client, log) = guarded("Internal server error", e.to_string());
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    client,
                    log,
                )
            }
            AppError::Upstream(msg) => {
                let (client, log) = guarded("Upstream service error", msg);
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", client, log)
            }
            AppError::Internal(msg) => {
                let (client, log) = guarded("Internal server error", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    client,
                    log,
                )
            }
        };

        // Always log the detailed error server-side
        tracing::error!(
            code = %code,
            status = %status.as_u16(),
            message = %log_message,
            "API error"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_carries_detail() {
        let err = AppError::invalid_field("title", "title must not be empty");
        match err {
            AppError::Validation { details, .. } => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "title");
            }
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (AppError::Auth("no token".into()), StatusCode::UNAUTHORIZED),
            (
                AppError::Forbidden("wrong tenant".into()),
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::NotFound("project 9 not found".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Conflict("version mismatch".into()),
                StatusCode::CONFLICT,
            ),
            (AppError::Gone("case 3 is deleted".into()), StatusCode::GONE),
            (
                AppError::Upstream("jira returned 500".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::validation("bad payload"),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, expected) in cases {
            let response = err.into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
