use lambda_http::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Machine-readable error codes returned in `errorCode`.
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
pub const ACCESS_DENIED: &str = "ACCESS_DENIED";
pub const UNHANDLED_EXCEPTION: &str = "UNHANDLED_EXCEPTION";

/// Every failure an operation can surface to a caller.
///
/// Errors travel as values up to the pipeline, which is the only place they become
/// responses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Requested resource was not found or does not exist.")]
    NotFound,
    #[error("Validation Failed: {message}")]
    ValidationFailed { message: String, errors: Vec<String> },
    #[error("Authorization Failed: {0}")]
    AccessDenied(String),
    #[error("Unhandled Exception: {0}")]
    Unhandled(String),
}

/// Wire shape of an error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody<'a> {
    pub error_message: String,
    pub error_code: &'static str,
    pub errors: &'a [String],
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::ValidationFailed {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn validation_with(message: impl Into<String>, errors: Vec<String>) -> Self {
        ApiError::ValidationFailed {
            message: message.into(),
            errors,
        }
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        ApiError::AccessDenied(message.into())
    }

    /// Wraps any foreign error, keeping its message.
    pub fn unhandled(err: impl std::fmt::Display) -> Self {
        ApiError::Unhandled(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            ApiError::AccessDenied(_) => StatusCode::FORBIDDEN,
            ApiError::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound => NOT_FOUND,
            ApiError::ValidationFailed { .. } => VALIDATION_FAILED,
            ApiError::AccessDenied(_) => ACCESS_DENIED,
            ApiError::Unhandled(_) => UNHANDLED_EXCEPTION,
        }
    }

    pub fn errors(&self) -> &[String] {
        match self {
            ApiError::ValidationFailed { errors, .. } => errors,
            _ => &[],
        }
    }

    pub fn body(&self) -> ErrorBody<'_> {
        ErrorBody {
            error_message: self.to_string(),
            error_code: self.code(),
            errors: self.errors(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound
        } else {
            ApiError::unhandled(err)
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::unhandled(err)
    }
}
