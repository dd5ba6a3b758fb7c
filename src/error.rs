//! Error types for progress
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown todo/subtask, bad config)
//! - 3: Rejected input (unreadable import, unconfirmed reset)
//! - 4: Operation failed (io, locking, watcher)

use std::path::PathBuf;
use thiserror::Error;

use crate::codec::ImportError;

/// Exit codes for the progress CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const REJECTED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for progress operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Todo not found: {0}")]
    TodoNotFound(String),

    #[error("Subtask not found: {subtask} (in todo {todo})")]
    SubtaskNotFound { todo: String, subtask: String },

    #[error("Ambiguous id prefix '{prefix}' matches {matches} entries")]
    AmbiguousId { prefix: String, matches: usize },

    // Rejected input (exit code 3)
    #[error("Import rejected: {0}")]
    Import(#[from] ImportError),

    #[error("Reset not confirmed: type '{0}' to confirm")]
    ResetNotConfirmed(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::TodoNotFound(_)
            | Error::SubtaskNotFound { .. }
            | Error::AmbiguousId { .. } => exit_codes::USER_ERROR,

            Error::Import(_) | Error::ResetNotConfirmed(_) => exit_codes::REJECTED,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::StorageUnavailable(_)
            | Error::Watch(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output, when the error carries any
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::SubtaskNotFound { todo, subtask } => Some(serde_json::json!({
                "todo": todo,
                "subtask": subtask,
            })),
            Error::AmbiguousId { prefix, matches } => Some(serde_json::json!({
                "prefix": prefix,
                "matches": matches,
            })),
            Error::Import(ImportError::Shape(found)) => Some(serde_json::json!({
                "expected": "array",
                "found": found,
            })),
            _ => None,
        }
    }
}

/// Result type alias for progress operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
