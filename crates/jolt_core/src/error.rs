//! The raw database error shape and the pure classifiers that decide how the
//! transaction runner may react to one.
//!
//! The classification is correctness-critical: declaring a write "Fail" claims
//! the attempt left no durable state, and the dirty-reads checker builds its
//! failed-write set from exactly those claims. A misclassified non-idempotent
//! failure therefore corrupts the checker, so anything unrecognized is Fatal
//! and must propagate (surfacing as an indeterminate outcome for writes).

use {
    serde::{Deserialize, Serialize},
    std::fmt,
    thiserror::Error,
};

/// Broad driver-level error categories, as a SQL driver would surface them.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum DbErrorKind {
    /// The database aborted the transaction (serialization conflicts land here).
    TransactionAbort,
    /// An integrity constraint rejected the statement.
    IntegrityViolation,
    /// The connection failed or was refused.
    Connection,
    /// The driver-side statement timeout fired.
    Timeout,
    /// Anything else.
    Other,
}

/// A raw error from the database driver: category, optional SQLSTATE-style
/// code, and the server message text.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub struct DbError {
    pub kind: DbErrorKind,
    pub code: Option<String>,
    pub message: String,
}

impl DbError {
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
        DbError {
            kind,
            code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn abort(message: impl Into<String>) -> Self {
        DbError::new(DbErrorKind::TransactionAbort, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        DbError::new(DbErrorKind::Connection, message)
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        DbError::new(DbErrorKind::IntegrityViolation, message)
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{:?} [{code}]: {}", self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

/// What the transaction runner is allowed to do with a classified error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// Transient, no assumed side effect; the whole unit of work may be
    /// retried immediately.
    Retryable,
    /// An expected application-level rejection; surfaces as outcome Fail.
    LogicalFailure,
    /// A network fault before any statement executed. Guaranteed idempotent,
    /// so even a write may surface as outcome Fail.
    ConnectFailureDuringPrep,
    /// Unknown condition; must propagate. Writes become outcome Info.
    Fatal,
}

/// SQLSTATE code for a serialization failure (the update-race return code).
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

/// SQLSTATE code for a unique-constraint violation.
const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";

/// Message fragments that mark a transaction abort as a transient conflict.
const RETRYABLE_ABORT_PATTERNS: &[&str] = &[
    "restart transaction",
    "not serializable",
    // Selective-update write-intent race.
    "write intent",
    "maximum retries exceeded",
];

/// Classifies a transaction-abort error. Retryable only for the known
/// transient conflict shapes; anything else is Fatal.
pub fn classify_abort(error: &DbError) -> ErrorClass {
    if error.code.as_deref() == Some(SQLSTATE_SERIALIZATION_FAILURE) {
        return ErrorClass::Retryable;
    }
    if RETRYABLE_ABORT_PATTERNS
        .iter()
        .any(|p| error.message.contains(p))
    {
        return ErrorClass::Retryable;
    }
    ErrorClass::Fatal
}

/// Classifies an application-level rejection. Integrity-constraint violations
/// (by kind or by code) are expected and reportable; all else is Fatal.
pub fn classify_logical(error: &DbError) -> ErrorClass {
    if error.kind == DbErrorKind::IntegrityViolation
        || error.code.as_deref() == Some(SQLSTATE_UNIQUE_VIOLATION)
    {
        return ErrorClass::LogicalFailure;
    }
    ErrorClass::Fatal
}

/// Classifies an error raised while preparing a session, before any statement
/// of the unit of work ran. Only an outright connect failure qualifies, since
/// that guarantees no side effect occurred.
pub fn classify_prep(error: &DbError) -> ErrorClass {
    if error.message.contains("cannot connect") {
        return ErrorClass::ConnectFailureDuringPrep;
    }
    ErrorClass::Fatal
}

/// Full classification for an error raised by the body of a unit of work.
pub fn classify(error: &DbError) -> ErrorClass {
    match error.kind {
        DbErrorKind::TransactionAbort => classify_abort(error),
        DbErrorKind::IntegrityViolation => classify_logical(error),
        _ => match classify_logical(error) {
            ErrorClass::LogicalFailure => ErrorClass::LogicalFailure,
            _ => ErrorClass::Fatal,
        },
    }
}
