//! Store error taxonomy: integrity faults vs. reconnectable infrastructure.

use sea_orm::DbErr;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sea-orm.
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    /// The store rejected the data itself (constraint violation, bad value).
    #[error("integrity fault: {message}")]
    Integrity { message: String },

    /// A window referenced by key does not exist.
    #[error("window not found: {context}")]
    WindowNotFound { context: String },

    /// Invalid input to a store operation.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl StoreError {
    /// Create an integrity error.
    #[inline]
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Create a window-not-found error.
    #[inline]
    pub fn window_not_found(context: impl Into<String>) -> Self {
        Self::WindowNotFound {
            context: context.into(),
        }
    }

    /// Create an invalid-input error.
    #[inline]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Whether this failure is a reconnectable infrastructure fault.
    ///
    /// The loader reacquires its connection and retries the load once when
    /// this returns true; the progress store retries its own writes with
    /// backoff.
    pub fn is_reconnectable(&self) -> bool {
        match self {
            Self::Database(db_err) => is_reconnectable_db_error(db_err),
            _ => false,
        }
    }

    /// Whether this failure is a data/integrity fault.
    ///
    /// Integrity faults mark the page dead; retrying cannot fix the data.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }
}

/// Classify a sea-orm error as reconnectable infrastructure or not.
fn is_reconnectable_db_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(_) | DbErr::Query(_) => {
            let err_str = err.to_string().to_lowercase();
            // SQLite: database is locked, busy
            // PostgreSQL: connection refused, too many connections
            // General: timeout, connection reset
            err_str.contains("locked")
                || err_str.contains("busy")
                || err_str.contains("timeout")
                || err_str.contains("connection")
                || err_str.contains("temporarily unavailable")
        }
        _ => false,
    }
}

/// Whether a sea-orm error reports a constraint/data violation.
///
/// Used by the load sink to translate bulk-load rejections into
/// [`StoreError::Integrity`] so the loader marks the page dead instead of
/// retrying.
pub(crate) fn is_integrity_db_error(err: &DbErr) -> bool {
    let err_str = err.to_string().to_lowercase();
    err_str.contains("unique")
        || err_str.contains("constraint")
        || err_str.contains("foreign key")
        || err_str.contains("not null")
        || err_str.contains("check")
        || err_str.contains("duplicate key")
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
