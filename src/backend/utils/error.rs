use crate::common::{ErrorBody, ErrorResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

pub type BackendResult<T> = Result<T, BackendError>;

/// Field name -> message, reported with `VALIDATION_ERROR`.
pub type ValidationDetails = BTreeMap<String, String>;

#[derive(Debug)]
pub enum BackendError {
    NotFound(String),
    Conflict(String),
    Validation(ValidationDetails),
    BadRequest(String),
    PermissionDenied(String),
    Unauthorized(String),
    TooManyRequests,
    ServiceUnavailable(String),
    Internal(anyhow::Error),
}

impl BackendError {
    pub fn not_found(what: &str) -> Self {
        BackendError::NotFound(format!("{what} not found"))
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        BackendError::PermissionDenied(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        BackendError::BadRequest(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        BackendError::Conflict(message.into())
    }

    pub fn unauthorized() -> Self {
        BackendError::Unauthorized("Login required".to_string())
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let mut details = ValidationDetails::new();
        details.insert(field.to_string(), message.into());
        BackendError::Validation(details)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BackendError::NotFound(_) => StatusCode::NOT_FOUND,
            BackendError::Conflict(_) => StatusCode::CONFLICT,
            BackendError::Validation(_) | BackendError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BackendError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            BackendError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BackendError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            BackendError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            BackendError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BackendError::NotFound(_) => "NOT_FOUND",
            BackendError::Conflict(_) => "CONFLICT",
            BackendError::Validation(_) => "VALIDATION_ERROR",
            BackendError::BadRequest(_) => "BAD_REQUEST",
            BackendError::PermissionDenied(_) => "FORBIDDEN",
            BackendError::Unauthorized(_) => "UNAUTHORIZED",
            BackendError::TooManyRequests => "TOO_MANY_REQUESTS",
            BackendError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            BackendError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotFound(m)
            | BackendError::Conflict(m)
            | BackendError::BadRequest(m)
            | BackendError::PermissionDenied(m)
            | BackendError::Unauthorized(m)
            | BackendError::ServiceUnavailable(m) => write!(f, "{m}"),
            BackendError::Validation(details) => {
                write!(f, "Validation failed")?;
                for (field, message) in details {
                    write!(f, ", {field}: {message}")?;
                }
                Ok(())
            }
            BackendError::TooManyRequests => write!(f, "Too many requests"),
            BackendError::Internal(e) => std::fmt::Display::fmt(e, f),
        }
    }
}

impl<T> From<T> for BackendError
where
    T: Into<anyhow::Error>,
{
    fn from(t: T) -> Self {
        BackendError::Internal(t.into())
    }
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();
        let (message, details) = match self {
            BackendError::Internal(e) => {
                error!("{e:?}");
                ("Internal server error".to_string(), BTreeMap::new())
            }
            BackendError::Validation(details) => ("Validation failed".to_string(), details),
            other => (other.to_string(), BTreeMap::new()),
        };
        let body = ErrorResponse {
            success: false,
            error: ErrorBody {
                code,
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
