use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
///
/// Read/lookup failures are recoverable (logged, contribute nothing);
/// mutation failures are surfaced in the resolution report; credential
/// failures abort a run before any mutation.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Subject or target record missing, fatal for the run.
    NotFound(String),
    /// A single field/relationship/search query failed; run continues.
    LookupFailure(String),
    /// Malformed search expression rejected by the record store.
    InvalidCriteria(String),
    /// An update call was rejected by the record store.
    UpdateFailure(String),
    /// A delete call was rejected by the record store.
    DeleteFailure(String),
    /// Access token unavailable; fatal, nothing may be mutated.
    CredentialFailure(String),
    /// Transport-level error talking to the record store.
    ExternalApi(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::LookupFailure(msg) => write!(f, "Lookup failure: {}", msg),
            AppError::InvalidCriteria(msg) => write!(f, "Invalid criteria: {}", msg),
            AppError::UpdateFailure(msg) => write!(f, "Update failure: {}", msg),
            AppError::DeleteFailure(msg) => write!(f, "Delete failure: {}", msg),
            AppError::CredentialFailure(msg) => write!(f, "Credential failure: {}", msg),
            AppError::ExternalApi(msg) => write!(f, "External API error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::LookupFailure(msg) => {
                tracing::error!("Lookup failure: {}", msg);
                (StatusCode::BAD_GATEWAY, "Record store lookup failed".to_string())
            }
            AppError::InvalidCriteria(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::UpdateFailure(msg) => {
                tracing::error!("Update failure: {}", msg);
                (StatusCode::BAD_GATEWAY, "Record store rejected update".to_string())
            }
            AppError::DeleteFailure(msg) => {
                tracing::error!("Delete failure: {}", msg);
                (StatusCode::BAD_GATEWAY, "Record store rejected delete".to_string())
            }
            AppError::CredentialFailure(msg) => {
                tracing::error!("Credential failure: {}", msg);
                (StatusCode::UNAUTHORIZED, "CRM credentials unavailable".to_string())
            }
            AppError::ExternalApi(msg) => {
                tracing::error!("External API error: {}", msg);
                (StatusCode::BAD_GATEWAY, "External service error".to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                // Delegate to underlying error's response
                return source.clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApi(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    #[allow(dead_code)]
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AppError::ExternalApi("Connection timeout".to_string());
        let display = format!("{}", error);
        assert!(display.contains("External API error"));
        assert!(display.contains("Connection timeout"));

        let error = AppError::NotFound("Contact 123 not found".to_string());
        let display = format!("{}", error);
        assert!(display.contains("Not found"));
    }

    #[test]
    fn test_context_chain() {
        let base: Result<(), AppError> = Err(AppError::DeleteFailure("status 400".to_string()));
        let wrapped = base.context("deleting source contact");
        let display = format!("{}", wrapped.unwrap_err());
        assert!(display.contains("deleting source contact"));
        assert!(display.contains("Delete failure"));
    }
}
