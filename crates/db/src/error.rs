//! Typed error types for the db crate.
//!
//! [`DbError`] is what backends return: driver faults, already classified
//! into constraint violations where the driver can tell. [`RepoError`] is
//! what repositories return to callers, tagged with an [`ErrorKind`].

use std::time::Duration;

use thiserror::Error;

use crate::scan::ScanError;

/// Backend-level failures.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote engine reported a failure for the statement.
    #[error("remote database error: {0}")]
    Remote(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("statement timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection pool is closed")]
    PoolClosed,

    #[error("schema error: {0}")]
    Schema(String),

    #[error("row scan failed: {0}")]
    Scan(#[from] ScanError),
}

/// Failure category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Internal,
}

impl ErrorKind {
    /// HTTP status code an API layer should answer with.
    pub fn status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Validation => 400,
            Self::Internal => 500,
        }
    }
}

/// Errors returned by repository and relationship operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("failed to {op} {entity}: {source}")]
    Internal {
        op: &'static str,
        entity: &'static str,
        #[source]
        source: DbError,
    },
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Wrap a backend fault with operation context.
    pub(crate) fn internal(op: &'static str, entity: &'static str) -> impl FnOnce(DbError) -> Self {
        move |source| Self::Internal { op, entity, source }
    }
}
