//! Error types for taskview
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad arguments, invalid filter name, unknown task)
//! - 3: Rejected by the remote authority (authorization)
//! - 4: Operation failed (transport, IO, serialization)

use thiserror::Error;

/// Exit codes for the taskview CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const REJECTED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for taskview operations
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors, surfaced inline (exit code 2)
    #[error("Invalid filter name: {0}")]
    InvalidFilterName(String),

    #[error("Filter name already exists: {0}. Enable overwrite or choose a different name.")]
    FilterNameExists(String),

    #[error("Move rejected: task {task_id} is already in {status}")]
    NoOpMove { task_id: String, status: String },

    #[error("Conflicting criteria: both sides constrain {0}")]
    ConflictingCriteria(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Saved filter not found: {0}")]
    SavedFilterNotFound(String),

    // Remote authority refused the session (exit code 3)
    #[error("Not authorized: {0}")]
    Authorization(String),

    // Operation failures (exit code 4)
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(std::path::PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidFilterName(_)
            | Error::FilterNameExists(_)
            | Error::NoOpMove { .. }
            | Error::ConflictingCriteria(_)
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::TaskNotFound(_)
            | Error::SavedFilterNotFound(_) => exit_codes::USER_ERROR,

            Error::Authorization(_) => exit_codes::REJECTED,

            Error::Transport(_)
            | Error::Http(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Errors recovered locally and shown next to the offending field.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidFilterName(_) | Error::FilterNameExists(_) | Error::NoOpMove { .. }
        )
    }

    /// Errors raised by a remote call. Authorization counts as transport for
    /// rollback purposes.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Http(_) | Error::Authorization(_)
        )
    }

    /// Exit-code bucket as it appears in JSON output.
    pub fn kind(&self) -> &'static str {
        match self.exit_code() {
            exit_codes::USER_ERROR => "user_error",
            exit_codes::REJECTED => "rejected",
            _ => "operation_failed",
        }
    }

    /// Structured details for JSON output.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::NoOpMove { task_id, status } => Some(serde_json::json!({
                "task_id": task_id,
                "status": status,
            })),
            Error::FilterNameExists(name) | Error::InvalidFilterName(name) => {
                Some(serde_json::json!({ "field": "name", "value": name }))
            }
            Error::TaskNotFound(id) | Error::SavedFilterNotFound(id) => {
                Some(serde_json::json!({ "id": id }))
            }
            Error::InvalidConfig(message) | Error::InvalidArgument(message) => {
                Some(serde_json::json!({ "message": message }))
            }
            _ => None,
        }
    }
}

/// Result type alias for taskview operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    #[serde(rename = "message")]
    pub error: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: err.details(),
        }
    }
}
