//! Unified error types and result handling.
//!
//! Every failure carries a stable machine-readable [`ErrorKind`] and a human-readable
//! message. Store errors coming out of `SeaORM` are classified on conversion so that
//! uniqueness rejections and transient connection failures stay distinguishable from
//! business-rule failures.

use sea_orm::{DbErr, RuntimeErr, SqlErr, sqlx};
use thiserror::Error;

// SQLite primary result codes; extended codes carry them in the low byte.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Errors produced by the records core.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced student, course, teacher, or enrollment does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The student already holds an active enrollment in the course
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflicting state
        message: String,
    },

    /// The course has prerequisites and none of them is approved for the student
    #[error("Student {student_id} has no approved prerequisite for course {course_id}")]
    PrerequisiteUnmet {
        /// Student attempting to enroll
        student_id: i64,
        /// Course with unmet prerequisites
        course_id: i64,
    },

    /// The operation is not legal for the enrollment's current state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Why the transition was refused
        message: String,
    },

    /// Malformed input
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// The store rejected a uniqueness constraint
    #[error("Integrity violation: {message}")]
    IntegrityViolation {
        /// Constraint details reported by the store
        message: String,
    },

    /// Transient store failure or lock wait timeout; safe to retry
    #[error("Unavailable: {message}")]
    Unavailable {
        /// What could not be reached or acquired
        message: String,
    },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Any other store error
    #[error("Database error: {0}")]
    Database(DbErr),
}

/// Stable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::Conflict`]
    Conflict,
    /// See [`Error::PrerequisiteUnmet`]
    PrerequisiteUnmet,
    /// See [`Error::InvalidState`]
    InvalidState,
    /// See [`Error::Validation`]
    ValidationError,
    /// See [`Error::IntegrityViolation`]
    IntegrityViolation,
    /// See [`Error::Unavailable`]
    Unavailable,
    /// Configuration and unclassified store failures
    Internal,
}

impl ErrorKind {
    /// Machine-readable name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::PrerequisiteUnmet => "prerequisite_unmet",
            Self::InvalidState => "invalid_state",
            Self::ValidationError => "validation_error",
            Self::IntegrityViolation => "integrity_violation",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Returns the stable kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::PrerequisiteUnmet { .. } => ErrorKind::PrerequisiteUnmet,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Validation { .. } => ErrorKind::ValidationError,
            Self::IntegrityViolation { .. } => ErrorKind::IntegrityViolation,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::Config { .. } | Self::Database(_) => ErrorKind::Internal,
        }
    }

    /// Only transient failures are worth retrying; business rules give the same answer twice.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Unavailable)
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}

/// True when the store refused the statement because another writer holds the
/// database, or no pooled connection became free in time.
fn is_contention(err: &DbErr) -> bool {
    let (DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e))) = err
    else {
        return false;
    };
    match e {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
        _ => false,
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(message)) = err.sql_err() {
            return Self::IntegrityViolation { message };
        }
        if is_contention(&err) {
            return Self::Unavailable {
                message: err.to_string(),
            };
        }
        match err {
            DbErr::ConnectionAcquire(e) => Self::Unavailable {
                message: e.to_string(),
            },
            DbErr::Conn(e) => Self::Unavailable {
                message: e.to_string(),
            },
            other => Self::Database(other),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
