//! Error types and handling for the CLI
//!
//! This module provides error types and utilities for handling
//! various failure modes in the CLI application.

use kos_http::{ClassifiedError, ErrorKind};
use std::io;
use std::path::PathBuf;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for CLI operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A request failed; the message is already user-facing
    #[error("{0}")]
    Request(#[from] ClassifiedError),

    /// Login rejected; `message` is the text shown for it
    #[error("{message}")]
    Login {
        message: String,
        #[source]
        source: ClassifiedError,
    },

    /// Error from the kos-http library outside a request
    #[error("{0}")]
    Library(#[from] kos_http::Error),

    /// File not found
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument combination
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic error with context
    #[error("{message}")]
    Other { message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid arguments error
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs(message.into())
    }

    /// Create a generic error with message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// The classified request failure, if any
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            Self::Request(error) | Self::Login { source: error, .. } => Some(error),
            Self::Library(error) => error.as_classified(),
            _ => None,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        if let Some(error) = self.classified() {
            return match error.kind() {
                ErrorKind::Network => 10,
                ErrorKind::Authentication | ErrorKind::Permission => 11,
                ErrorKind::Server => 12,
                ErrorKind::Client => 13,
                ErrorKind::Encoding | ErrorKind::Setup => 14,
            };
        }
        match self {
            Self::Io(_) => 1,
            Self::Library(_) => 2,
            Self::FileNotFound { .. } => 3,
            Self::Config(_) => 5,
            Self::InvalidArgs(_) => 6,
            Self::Json(_) => 7,
            Self::Yaml(_) => 8,
            Self::Toml(_) => 9,
            Self::Request(_) | Self::Login { .. } | Self::Other { .. } => 99,
        }
    }

    /// Check if this error should display usage help
    pub fn should_show_help(&self) -> bool {
        matches!(self, Self::InvalidArgs(_))
    }
}

/// Format an error for display to the user
pub fn format_error(error: &Error, use_color: bool) -> String {
    let detail = match error.classified() {
        Some(classified) => match classified.status_code() {
            Some(status) => format!("{} (HTTP {}, {})", error, status, classified.kind()),
            None => format!("{} ({})", error, classified.kind()),
        },
        None => error.to_string(),
    };

    if use_color {
        use colored::Colorize;
        format!("{} {}", "Error:".red().bold(), detail)
    } else {
        format!("Error: {}", detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kos_http::http::{FailedResponse, RequestEcho, TransportFailure};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn status_error(status: u16) -> ClassifiedError {
        ClassifiedError::from_failure(&TransportFailure::Status {
            request: RequestEcho {
                method: "GET".into(),
                url: "https://kos.example.com/api/kos".into(),
                headers: BTreeMap::new(),
                params: BTreeMap::new(),
                body: None,
                timeout_ms: 30_000,
            },
            response: FailedResponse {
                status,
                headers: BTreeMap::new(),
                body: json!({"message": "Kos tidak ditemukan"}),
            },
        })
    }

    #[test]
    fn test_exit_codes_follow_error_kind() {
        assert_eq!(Error::from(status_error(404)).exit_code(), 13);
        assert_eq!(Error::from(status_error(401)).exit_code(), 11);
        assert_eq!(Error::from(status_error(503)).exit_code(), 12);
        assert_eq!(Error::from(ClassifiedError::setup("URL is required")).exit_code(), 14);
        assert_eq!(Error::config("bad").exit_code(), 5);
        assert!(Error::invalid_args("x").should_show_help());
    }

    #[test]
    fn test_format_error_includes_status() {
        let formatted = format_error(&Error::from(status_error(404)), false);
        assert_eq!(formatted, "Error: Kos tidak ditemukan (HTTP 404, client)");
        assert_eq!(format_error(&Error::other("boom"), false), "Error: boom");
    }
}
