//! Core error types for studynice-core.
//!
//! Invalid timer transitions are not errors (they are no-ops); everything in
//! here is either a caller contract violation or a failure of one of the
//! storage collaborators.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::timer::TimerState;

/// Core error type for studynice-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Timer contract violations
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// A check-in or aggregate collaborator failed
    #[error("Collaborator '{operation}' failed: {message}")]
    Collaborator {
        operation: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A check-in write was stored but the aggregate or stats refresh after it failed
    #[error("check-in for {date} saved, but recompute failed: {source}")]
    RecomputeFailed {
        date: NaiveDate,
        #[source]
        source: Box<CoreError>,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
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

    /// Key does not exist in the configuration tree
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("goal id must not be empty")]
    MissingGoalId,

    /// Quick-add minutes must be positive
    #[error("invalid minutes: {minutes} (must be greater than 0)")]
    InvalidMinutes { minutes: i64 },

    /// Date string is not YYYY-MM-DD
    #[error("invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("unknown goal: {0}")]
    UnknownGoal(String),

    #[error("unknown check-in: {0}")]
    UnknownCheckin(i64),
}

/// Timer contract violations.
///
/// Only `start` and commit can fail; `pause`/`resume`/`stop` never do.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TimerError {
    #[error("cannot start a session without a goal id")]
    MissingGoal,

    /// A session is in progress and must be discarded explicitly first
    #[error("a {state:?} session for goal '{goal_id}' is already active; discard it first")]
    SessionActive { goal_id: String, state: TimerState },

    #[error("session is {state:?}; stop it before committing")]
    NotFinished { state: TimerState },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) if e.code == rusqlite::ErrorCode::DatabaseLocked => {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
