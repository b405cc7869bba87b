use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::utils::validation::FieldErrors;

pub type Result<T> = std::result::Result<T, Error>;

const SERVER_ERROR_MESSAGE: &str = "Server Error";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Validation failed: {}", .0.summary())]
    ValidationFailed(FieldErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict on {field}: {message}")]
    Conflict {
        field: &'static str,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Error::ValidationFailed(_) | Error::Conflict { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Config(_) | Error::Database(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn email_taken() -> Self {
        Error::Conflict {
            field: "email",
            message: "The email has already been taken.".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Error::MalformedPayload(message) | Error::NotFound(message) => {
                json!({ "message": message })
            }
            Error::ValidationFailed(errors) => {
                tracing::debug!(fields = ?errors.fields().collect::<Vec<_>>(), "validation failed");
                json!({
                    "message": errors.summary(),
                    "errors": errors,
                })
            }
            Error::Conflict { field, message } => json!({
                "message": message.clone(),
                "errors": { field: [message] },
            }),
            other => {
                tracing::error!(error = %other, "request failed");
                json!({ "message": SERVER_ERROR_MESSAGE })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => Error::email_taken(),
            other => Error::Database(other),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(format!("blocking task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value as JsonValue;

    async fn body_of(err: Error) -> (StatusCode, JsonValue) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_errors_carry_field_map() {
        let mut errors = FieldErrors::new();
        errors.add("name", "The name field is required.");
        errors.add("email", "The email field is required.");
        let (status, body) = body_of(Error::ValidationFailed(errors)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body["message"],
            "The name field is required. (and 1 more error)"
        );
        assert_eq!(body["errors"]["email"][0], "The email field is required.");
    }

    #[tokio::test]
    async fn malformed_payload_has_message_only() {
        let (status, body) = body_of(Error::MalformedPayload("Bad JSON received".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Bad JSON received");
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn conflict_renders_as_email_field_error() {
        let (status, body) = body_of(Error::email_taken()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"]["email"][0], "The email has already been taken.");
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_detail() {
        let (status, body) = body_of(Error::Internal("pool exhausted at 10.0.0.3".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Server Error");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            Error::from(sqlx::Error::RowNotFound),
            Error::NotFound(_)
        ));
    }
}
