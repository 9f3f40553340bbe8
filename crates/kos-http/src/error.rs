//! Error types for the kos HTTP library
//!
//! This module defines the crate-level error enum, using thiserror for
//! ergonomic error definitions and anyhow for opaque internal causes.
//! Request failures themselves are carried by
//! [`ClassifiedError`](crate::http::ClassifiedError); this enum wraps them
//! for callers that mix request calls with configuration or I/O work.

use std::fmt;
use thiserror::Error;
use serde::{Deserialize, Serialize};

use crate::http::ClassifiedError;

/// Main error type for kos-http operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (bad environment values, unusable base URL)
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A request could not be described well enough to be sent
    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        field: Option<String>,
    },

    /// A classified request failure
    #[error("HTTP error: {0}")]
    Http(#[from] ClassifiedError),

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic internal error with context
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Create a configuration error without an underlying cause
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// The classified request failure, if this error wraps one
    pub fn as_classified(&self) -> Option<&ClassifiedError> {
        match self {
            Error::Http(err) => Some(err),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Severity attached to every recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Non-fatal, the operation carried on
    Low,
    /// The request failed for a reason the caller can usually fix
    Medium,
    /// The request failed for a reason outside the caller's control
    High,
    /// Reserved for failures that leave the client unusable
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

// Conversion implementations
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal {
            message: err.to_string(),
            source: err,
        }
    }
}
