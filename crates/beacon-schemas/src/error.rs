//! Typed error contract shared by every layer of the Scheduler Core.
//!
//! Replaces substring-matching error classification: callers match on
//! `SchedulerError` variants, never on `.to_string()` content.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal: {0}")]
    Internal(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl SchedulerError {
    /// Stable machine-readable kind, independent of the human message.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::NotFound(_) => ErrorKind::NotFound,
            SchedulerError::Validation(_) => ErrorKind::Validation,
            SchedulerError::Unauthorized(_) => ErrorKind::Unauthorized,
            SchedulerError::Forbidden(_) => ErrorKind::Forbidden,
            SchedulerError::Conflict(_) => ErrorKind::Conflict,
            SchedulerError::Internal(_) => ErrorKind::Internal,
            SchedulerError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        SchedulerError::Internal(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        SchedulerError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        SchedulerError::NotFound(msg.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Unauthorized,
    Forbidden,
    Conflict,
    Internal,
    Unavailable,
}

impl ErrorKind {
    /// HTTP status code.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Validation => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::Internal => 500,
            ErrorKind::Unavailable => 503,
        }
    }

    pub fn code_name(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Validation => "INVALID_ARGUMENT",
            ErrorKind::Conflict => "ALREADY_EXISTS",
            ErrorKind::Unauthorized => "UNAUTHENTICATED",
            ErrorKind::Forbidden => "PERMISSION_DENIED",
            ErrorKind::Internal => "INTERNAL",
            ErrorKind::Unavailable => "UNAVAILABLE",
        }
    }
}

impl From<SchedulerError> for SchedulerResult<()> {
    fn from(e: SchedulerError) -> Self {
        Err(e)
    }
}
