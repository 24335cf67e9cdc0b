use actix_web::{http::StatusCode, ResponseError};
use log::error;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

use crate::auth::AuthError;
use crate::response::response_from_error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{msg}")]
    Validation { field: String, msg: String },

    #[error(transparent)]
    Authentication(#[from] AuthError),

    #[error("authentication credentials were not provided")]
    Unauthenticated,

    #[error("you do not have permission to perform this action")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("system_exception")]
    System,
}

impl AppError {
    pub fn param_error(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), msg: msg.into() }
    }

    pub fn need_login() -> Self {
        Self::Unauthenticated
    }

    pub fn not_found(what: &'static str) -> Self {
        Self::NotFound(what)
    }

    pub fn system_exception() -> Self {
        Self::System
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Validation { .. } => 1,
            Self::Authentication(_) | Self::Unauthenticated => 3,
            Self::Forbidden => 4,
            Self::NotFound(_) => 5,
            Self::MethodNotAllowed => 6,
            Self::System => 99,
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Authentication(_) | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::System => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        response_from_error(self)
    }
}

/// Translates a failed write into a field-level validation error when the
/// store rejected it for a uniqueness constraint. `fields` pairs a column
/// fragment with the message reported for it; the first fragment found in
/// the driver message wins, otherwise the first pair is used.
pub fn integrity_error(err: DbErr, fields: &[(&str, &str)]) -> AppError {
    let violation = match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg)) => Some(msg),
        _ => {
            let msg = err.to_string();
            if msg.contains("UNIQUE") || msg.contains("Duplicate") {
                Some(msg)
            } else {
                None
            }
        }
    };

    let Some(detail) = violation else {
        error!("store write failed: {}", err);
        return AppError::system_exception();
    };

    let (field, msg) = fields
        .iter()
        .find(|(field, _)| detail.contains(field))
        .or_else(|| fields.first())
        .copied()
        .unwrap_or(("non_field_errors", "record already exists"));
    AppError::param_error(field, msg)
}

/// Logs a store failure and hides it behind a generic system error.
pub fn db_error(err: DbErr) -> AppError {
    error!("store query failed: {}", err);
    AppError::system_exception()
}
