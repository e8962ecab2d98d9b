use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Parent of {0} no longer exists")]
    MissingParent(String),
    #[error("Invalid document path: {0}")]
    InvalidPath(String),
}

/// A vote or option carried a `time` that is neither a timestamp nor null.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Malformed alarm time: {0}")]
pub struct MalformedTime(pub Value);

#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("Malformed change payload: {0}")]
    MalformedPayload(String),
    #[error("Could not apply delivered change: {0}")]
    Mirror(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl IntoResponse for TriggerError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            TriggerError::MalformedPayload(_) => {
                (StatusCode::BAD_REQUEST, "Malformed change payload")
            }
            TriggerError::Mirror(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Could not apply change")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        StoreError::Database(error.to_string())
    }
}

impl From<axum::extract::rejection::JsonRejection> for TriggerError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        TriggerError::MalformedPayload(rejection.body_text())
    }
}
