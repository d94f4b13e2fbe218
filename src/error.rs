//! Typed errors and HTTP envelope mapping.

use crate::response::{failure, status_label};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Registration-time misuse of entity definitions. Fails fast at startup,
/// never at request time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("entity '{entity}': identifier field '{field}' is not declared")]
    MissingIdField { entity: String, field: String },
    #[error("entity '{entity}': unique constraint references unknown field '{field}'")]
    UnknownConstraintField { entity: String, field: String },
    #[error("entity '{entity}': audit slot '{slot}' references unknown field '{field}'")]
    UnknownAuditField {
        entity: String,
        slot: &'static str,
        field: String,
    },
    #[error("entity '{entity}': no {backend} backend configured")]
    MissingBackend {
        entity: String,
        backend: &'static str,
    },
    #[error("entity '{entity}': {message}")]
    Invalid { entity: String, message: String },
    #[error("config load: {0}")]
    Load(String),
}

/// One violated unique-constraint group: the declared field set plus the
/// configured conflict message.
#[derive(Clone, Debug, Serialize)]
pub struct ConflictDescription {
    pub fields: Vec<String>,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("validation: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unique constraint violated: {}", describe_groups(.0))]
    UniqueViolation(Vec<ConflictDescription>),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("persistence: {0}")]
    Persistence(String),
}

fn describe_groups(groups: &[ConflictDescription]) -> String {
    groups
        .iter()
        .map(|g| g.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(db.message().to_string())
            }
            _ => AppError::Persistence(e.to_string()),
        }
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};
        // E11000: duplicate key on a unique index.
        let duplicate = match &*e.kind {
            ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == 11000,
            ErrorKind::BulkWrite(bw) => bw
                .write_errors
                .as_ref()
                .map(|errs| errs.iter().any(|we| we.code == 11000))
                .unwrap_or(false),
            _ => false,
        };
        if duplicate {
            AppError::Conflict(e.to_string())
        } else {
            AppError::Persistence(e.to_string())
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UniqueViolation(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "configuration_error",
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::UniqueViolation(_) => "unique_violation",
            AppError::Conflict(_) => "conflict",
            AppError::Persistence(_) => "persistence_error",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::UniqueViolation(groups) => serde_json::to_value(groups).ok(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = failure(
            self.to_string(),
            status.as_u16(),
            status_label(status),
            self.code(),
            self.details(),
        );
        (status, axum::Json(body)).into_response()
    }
}
