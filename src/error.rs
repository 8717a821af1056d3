use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        Self::Database(format!("JSON serialization error: {}", err))
    }
}

impl From<QueryRejection> for AuditError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<JsonRejection> for AuditError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<sqlx::Error> for AuditError {
    fn from(err: sqlx::Error) -> Self {
        if is_transient_store_error(&err) {
            Self::PersistenceUnavailable(format!("Store unavailable: {}", err))
        } else {
            Self::Database(format!("Database error: {}", err))
        }
    }
}

/// Detect store failures that are expected to clear on their own.
///
/// Constraint violations and decode failures are not transient and must not
/// be retried.
pub fn is_transient_store_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => {
            let msg = db.message();
            msg.contains("database is locked") || msg.contains("database table is locked")
                || msg.contains("busy")
        }
        _ => false,
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Audit entry not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl AuditError {
    pub fn already_retracted(id: &str) -> Self {
        Self::Conflict(format!("Audit entry {} is already retracted", id))
    }

    pub fn retraction_not_retractable(id: &str) -> Self {
        Self::Conflict(format!(
            "Audit entry {} is a retraction record and cannot be retracted",
            id
        ))
    }

    pub fn timed_out(operation: &str) -> Self {
        Self::PersistenceUnavailable(format!("{} timed out", operation))
    }

    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PersistenceUnavailable(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PersistenceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuditError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            // Never reveal why a credential was refused
            Self::Unauthorized => serde_json::json!({ "error": "unauthorized" }),
            Self::Config(_) | Self::Database(_) => {
                tracing::error!("Internal error serving request: {}", self);
                serde_json::json!({ "error": "internal error" })
            }
            other => serde_json::json!({ "error": other.to_string() }),
        };

        if self.is_retryable() {
            (status, [(header::RETRY_AFTER, "1")], Json(body)).into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}

pub type Result<T, E = AuditError> = std::result::Result<T, E>;
