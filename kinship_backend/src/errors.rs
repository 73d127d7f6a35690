//! Domain-level failures services raise through `anyhow`.
//!
//! Handlers downcast these back out of `anyhow::Error` to pick the HTTP
//! status; anything that is not a `DomainError` is a 500.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
}

impl DomainError {
    pub fn invalid(msg: impl Into<String>) -> anyhow::Error {
        Self::Invalid(msg.into()).into()
    }

    pub fn unauthorized(msg: impl Into<String>) -> anyhow::Error {
        Self::Unauthorized(msg.into()).into()
    }

    pub fn forbidden(msg: impl Into<String>) -> anyhow::Error {
        Self::Forbidden(msg.into()).into()
    }

    pub fn not_found(msg: impl Into<String>) -> anyhow::Error {
        Self::NotFound(msg.into()).into()
    }

    pub fn conflict(msg: impl Into<String>) -> anyhow::Error {
        Self::Conflict(msg.into()).into()
    }
}

/// True when the error chain bottoms out in a SQLite UNIQUE/constraint
/// violation.
pub fn is_constraint_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == rusqlite::ErrorCode::ConstraintViolation
        )
    })
}
