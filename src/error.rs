//! Unified error handling for semlayer
//!
//! Every failure is one of three kinds: a local packaging problem, a failed
//! remote operation, or a missing/invalid local setting. The kinds are never
//! collapsed into each other as they propagate.

use std::fmt;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum SemLayerError {
    /// Local filesystem or archive-format failure
    #[error("Packaging error: {message} (path: {path})")]
    Packaging {
        message: String,
        path: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Any failure talking to the remote query engine
    #[error("Remote operation {operation} failed: {message}")]
    RemoteOperation {
        message: String,
        operation: RemoteOperationKind,
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Missing or invalid local setting, detected before any network call
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

/// Remote operations exposed by the query engine API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperationKind {
    ListColumns,
    ListDailyDatasources,
    SubmitChart,
    SubmitDbAuth,
    FetchCurrentConfig,
    FetchConfigByVersion,
    UploadConfig,
    TriggerBackfill,
}

impl fmt::Display for RemoteOperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RemoteOperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteOperationKind::ListColumns => "list_columns",
            RemoteOperationKind::ListDailyDatasources => "list_daily_datasources",
            RemoteOperationKind::SubmitChart => "submit_chart",
            RemoteOperationKind::SubmitDbAuth => "submit_db_auth",
            RemoteOperationKind::FetchCurrentConfig => "fetch_current_config",
            RemoteOperationKind::FetchConfigByVersion => "fetch_config_by_version",
            RemoteOperationKind::UploadConfig => "upload_config",
            RemoteOperationKind::TriggerBackfill => "trigger_backfill",
        }
    }
}

impl SemLayerError {
    pub fn packaging(message: impl Into<String>, path: impl AsRef<Path>) -> Self {
        SemLayerError::Packaging {
            message: message.into(),
            path: path.as_ref().display().to_string(),
            source: None,
        }
    }

    /// Packaging failure caused by an I/O error on `path`.
    pub fn io(context: &str, path: impl AsRef<Path>, err: io::Error) -> Self {
        SemLayerError::Packaging {
            message: format!("{context}: {err}"),
            path: path.as_ref().display().to_string(),
            source: Some(Box::new(err)),
        }
    }

    pub fn remote(operation: RemoteOperationKind, message: impl Into<String>) -> Self {
        SemLayerError::RemoteOperation {
            message: message.into(),
            operation,
            status: None,
            source: None,
        }
    }

    /// The server answered with a non-2xx status; `body` is its response text.
    pub fn rejected(operation: RemoteOperationKind, status: u16, body: impl Into<String>) -> Self {
        SemLayerError::RemoteOperation {
            message: body.into(),
            operation,
            status: Some(status),
            source: None,
        }
    }

    pub fn transport(operation: RemoteOperationKind, err: reqwest::Error) -> Self {
        SemLayerError::RemoteOperation {
            message: err.to_string(),
            operation,
            status: err.status().map(|s| s.as_u16()),
            source: Some(Box::new(err)),
        }
    }

    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        SemLayerError::Configuration {
            message: message.into(),
            field: field.map(str::to_string),
        }
    }

    /// The underlying message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            SemLayerError::Packaging { message, .. }
            | SemLayerError::RemoteOperation { message, .. }
            | SemLayerError::Configuration { message, .. } => message,
        }
    }

    /// HTTP status of a rejected remote call. `None` for transport failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            SemLayerError::RemoteOperation { status, .. } => *status,
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SemLayerError::Packaging { .. } => ErrorCategory::Packaging,
            SemLayerError::RemoteOperation { .. } => ErrorCategory::Remote,
            SemLayerError::Configuration { .. } => ErrorCategory::Configuration,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            SemLayerError::Packaging { message, path, .. } => {
                format!("Could not package configuration at {}: {}", path, message)
            }
            SemLayerError::RemoteOperation {
                message,
                operation,
                status,
                ..
            } => match status {
                Some(code) => format!(
                    "Query engine rejected {} (HTTP {}): {}",
                    operation, code, message
                ),
                None => format!("Query engine request {} failed: {}", operation, message),
            },
            SemLayerError::Configuration { message, field } => match field {
                Some(field) => format!("Configuration problem ({}): {}", field, message),
                None => format!("Configuration problem: {}", message),
            },
        }
    }

    /// Process exit status for this error. Always non-zero.
    pub fn exit_code(&self) -> u8 {
        match self.category() {
            ErrorCategory::Configuration => 2,
            ErrorCategory::Packaging => 3,
            ErrorCategory::Remote => 4,
        }
    }
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Packaging,
    Remote,
    Configuration,
}

impl ErrorCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            ErrorCategory::Packaging => "Packaging",
            ErrorCategory::Remote => "Remote operation",
            ErrorCategory::Configuration => "Configuration",
        }
    }
}

/// Result type alias for convenience
pub type SemResult<T> = Result<T, SemLayerError>;
