//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variables:\n{}", format_missing(.0))]
    MissingVariables(Vec<(&'static str, &'static str)>),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("invalid identifier in model declaration: {0:?}")]
    InvalidIdentifier(String),
    #[error("field '{field}' declares unsupported column type {sql_type:?}")]
    InvalidSqlType { field: String, sql_type: String },
    #[error("model '{0}' registered twice")]
    DuplicateModel(String),
    #[error("model '{model}' declares field '{field}' twice")]
    DuplicateField { model: String, field: String },
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("relationship '{model}.{field}' joins on '{join_field}', which is not a foreign key of '{model}'")]
    InvalidJoinField {
        model: String,
        field: String,
        join_field: String,
    },
    #[error("relationship cycle: {0}")]
    RelationshipCycle(String),
}

fn format_missing(vars: &[(&'static str, &'static str)]) -> String {
    vars.iter()
        .map(|(name, description)| format!("- {}: {}", name, description))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("could not connect to database: {0}")]
    Connection(#[source] sqlx::Error),
    #[error("unsupported field type: {0}")]
    UnsupportedType(String),
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("database operation exceeded {0:?}")]
    Timeout(Duration),
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::InvalidIdentifier(_) => (StatusCode::BAD_REQUEST, "invalid_identifier"),
            AppError::Connection(_) => (StatusCode::INTERNAL_SERVER_ERROR, "connection_error"),
            AppError::UnsupportedType(_) => (StatusCode::INTERNAL_SERVER_ERROR, "unsupported_type"),
            AppError::InvalidValue { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variables_lists_every_name() {
        let err = ConfigError::MissingVariables(vec![
            ("DB_USER", "Name of the database user"),
            ("DB_PASS", "Password of the database user"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("- DB_USER: Name of the database user"));
        assert!(msg.contains("- DB_PASS: Password of the database user"));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(AppError::NotFound("user".into()).status_and_code().0, StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Db(sqlx::Error::RowNotFound).status_and_code().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Db(sqlx::Error::PoolTimedOut).status_and_code().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::InvalidIdentifier("a b".into()).status_and_code().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Timeout(Duration::from_secs(1)).status_and_code().0,
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
