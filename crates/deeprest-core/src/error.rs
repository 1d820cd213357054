//! Core error types for deeprest-core.
//!
//! Timer transitions, persistence and configuration each have their own
//! error enum so that callers can tell a rejected transition apart from a
//! failed write. `CoreError` wraps all of them for the CLI boundary.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::events::Event;
use crate::timer::TimerStatus;

/// Core error type for deeprest-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Rejected timer command
    #[error("Timer error: {0}")]
    Service(#[from] ServiceError),

    /// Session store errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Errors raised by the timer state machine.
///
/// A rejected operation never changes the timer state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// The operation is not allowed from the current state.
    #[error("cannot {operation} while {status}")]
    InvalidTransition {
        operation: &'static str,
        status: TimerStatus,
    },

    /// Interval durations must be at least one minute.
    #[error("invalid duration: {minutes} minutes (must be greater than zero)")]
    InvalidDuration { minutes: u64 },

    /// The rating request does not belong to the current focus interval.
    #[error("rating request for session {session_id} is no longer current")]
    StaleRatingRequest { session_id: String },
}

/// A command rejected by the focus service.
///
/// The clock may still have moved the timer on before the rejection, for
/// example by settling an expired rating prompt. Those events and any
/// failure to store what they finalized travel with the error.
#[derive(Error, Debug)]
pub struct ServiceError {
    #[source]
    pub timer: TimerError,
    pub events: Vec<Event>,
    pub persist_error: Option<StoreError>,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.timer)?;
        if let Some(e) = &self.persist_error {
            write!(f, "; session could not be saved: {e}")?;
        }
        Ok(())
    }
}

/// Persistence failures from a session store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Record rejected before writing
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] ValidationError),

    /// A session with this id was already appended
    #[error("Session {0} already exists")]
    DuplicateSession(String),

    /// The most recent stored session cannot be read back
    #[error("Last stored session is unreadable: {0}")]
    CorruptTail(String),

    /// Failed to encode or decode a stored value
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Store refused the write (e.g. disk full, unmounted volume)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end_time ({end}) must not precede start_time ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Rating outside 1..=5
    #[error("Invalid rating {value}: must be between 1 and 5")]
    InvalidRating { value: u8 },

    /// Rating present on a session that cannot carry one
    #[error("Rating not allowed: {0}")]
    RatingNotAllowed(String),

    /// Finalized record is missing a terminal field
    #[error("Session {id} is not finalized: missing end_time")]
    NotFinalized { id: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_message_names_operation_and_status() {
        let err = TimerError::InvalidTransition {
            operation: "pause",
            status: TimerStatus::Idle,
        };
        assert_eq!(err.to_string(), "cannot pause while idle");
    }

    #[test]
    fn service_error_converts_into_core_error() {
        let err: CoreError = ServiceError {
            timer: TimerError::InvalidDuration { minutes: 0 },
            events: Vec::new(),
            persist_error: None,
        }
        .into();
        assert!(matches!(
            err,
            CoreError::Service(ServiceError {
                timer: TimerError::InvalidDuration { minutes: 0 },
                ..
            })
        ));
        assert_eq!(
            err.to_string(),
            "Timer error: invalid duration: 0 minutes (must be greater than zero)"
        );
    }

    #[test]
    fn service_error_mentions_failed_write() {
        let err = ServiceError {
            timer: TimerError::InvalidTransition {
                operation: "start",
                status: TimerStatus::Running,
            },
            events: Vec::new(),
            persist_error: Some(StoreError::Locked),
        };
        assert_eq!(
            err.to_string(),
            "cannot start while running; session could not be saved: Database is locked"
        );
    }

    #[test]
    fn validation_error_converts_into_store_error() {
        let err: StoreError = ValidationError::InvalidRating { value: 9 }.into();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
    }
}
