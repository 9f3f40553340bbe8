//! Error classification for failed requests
//!
//! Turns a [`TransportFailure`] into a [`ClassifiedError`]: a taxonomy kind,
//! a severity and a display-ready message. The taxonomy flags
//! (`is_network_error`, `is_auth_error`, `is_server_error`) are derived from
//! the kind and status so they can never disagree with each other.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::types::{RequestEcho, TransportFailure};
use crate::Severity;

/// Message used when no response was received
pub const NETWORK_ERROR_MESSAGE: &str =
    "Tidak dapat terhubung ke server. Periksa koneksi internet Anda.";

/// Message used when nothing better is known about a failure
pub const UNKNOWN_ERROR_MESSAGE: &str = "Terjadi kesalahan yang tidak diketahui";

/// Result type of the verb operations
pub type Result<T> = std::result::Result<T, ClassifiedError>;

/// Taxonomy of request failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response received (connectivity or timeout)
    Network,
    /// 401
    Authentication,
    /// 403
    Permission,
    /// 5xx
    Server,
    /// Any other non-2xx status
    Client,
    /// A multipart field could not be encoded
    Encoding,
    /// The request could not be built or sent
    Setup,
}

impl ErrorKind {
    /// Classify a received non-2xx status
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Permission,
            500..=u16::MAX => ErrorKind::Server,
            _ => ErrorKind::Client,
        }
    }

    /// Severity recorded for this kind of failure
    pub fn default_severity(&self) -> Severity {
        match self {
            ErrorKind::Network
            | ErrorKind::Authentication
            | ErrorKind::Permission
            | ErrorKind::Server => Severity::High,
            ErrorKind::Client | ErrorKind::Setup => Severity::Medium,
            ErrorKind::Encoding => Severity::Low,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Network => "network",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Permission => "permission",
            ErrorKind::Server => "server",
            ErrorKind::Client => "client",
            ErrorKind::Encoding => "encoding",
            ErrorKind::Setup => "setup",
        };
        f.write_str(name)
    }
}

/// The underlying failure a classified error was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalError {
    /// Description of the transport-level failure
    pub description: String,
    /// Snapshot of the request, when one was built
    pub request: Option<RequestEcho>,
    /// Whether the failure was a timeout
    pub timed_out: bool,
}

/// A failed request, classified
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ClassifiedError {
    status_code: Option<u16>,
    response_body: Option<Value>,
    message: String,
    kind: ErrorKind,
    severity: Severity,
    original: OriginalError,
}

impl ClassifiedError {
    /// Classify a transport failure
    pub fn from_failure(failure: &TransportFailure) -> Self {
        let original = OriginalError {
            description: failure.description(),
            request: failure.request().cloned(),
            timed_out: matches!(failure, TransportFailure::NoResponse { timed_out: true, .. }),
        };

        match failure {
            TransportFailure::Status { response, .. } => {
                let kind = ErrorKind::from_status(response.status);
                Self {
                    status_code: Some(response.status),
                    response_body: Some(response.body.clone()),
                    message: message_for_response(response.status, &response.body),
                    kind,
                    severity: kind.default_severity(),
                    original,
                }
            }
            TransportFailure::NoResponse { .. } => Self {
                status_code: None,
                response_body: None,
                message: NETWORK_ERROR_MESSAGE.to_string(),
                kind: ErrorKind::Network,
                severity: ErrorKind::Network.default_severity(),
                original,
            },
            TransportFailure::Setup { reason, .. } => Self {
                status_code: None,
                response_body: None,
                message: non_empty(reason).unwrap_or(UNKNOWN_ERROR_MESSAGE).to_string(),
                kind: ErrorKind::Setup,
                severity: ErrorKind::Setup.default_severity(),
                original,
            },
        }
    }

    /// A failure raised before anything was sent
    pub fn setup(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status_code: None,
            response_body: None,
            kind: ErrorKind::Setup,
            severity: ErrorKind::Setup.default_severity(),
            original: OriginalError {
                description: message.clone(),
                request: None,
                timed_out: false,
            },
            message,
        }
    }

    /// A non-fatal multipart encoding failure
    pub fn encoding(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status_code: None,
            response_body: None,
            kind: ErrorKind::Encoding,
            severity: ErrorKind::Encoding.default_severity(),
            original: OriginalError {
                description: message.clone(),
                request: None,
                timed_out: false,
            },
            message,
        }
    }

    /// HTTP status, absent when no response was received
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Parsed response body, absent when no response was received
    pub fn response_body(&self) -> Option<&Value> {
        self.response_body.as_ref()
    }

    /// Display-ready message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn original(&self) -> &OriginalError {
        &self.original
    }

    /// True iff no response was received from the peer
    pub fn is_network_error(&self) -> bool {
        self.kind == ErrorKind::Network
    }

    /// True iff the status is 401 or 403
    pub fn is_auth_error(&self) -> bool {
        matches!(self.status_code, Some(401) | Some(403))
    }

    /// True iff the status is 500 or above
    pub fn is_server_error(&self) -> bool {
        matches!(self.status_code, Some(code) if code >= 500)
    }

    /// True for 4xx statuses other than 401/403
    pub fn is_client_error(&self) -> bool {
        matches!(self.status_code, Some(code) if (400..500).contains(&code) && code != 401 && code != 403)
    }

    /// JSON report of the error, including the derived flags
    pub fn report(&self) -> Value {
        serde_json::json!({
            "statusCode": self.status_code,
            "responseBody": self.response_body,
            "message": self.message,
            "kind": self.kind,
            "severity": self.severity,
            "isNetworkError": self.is_network_error(),
            "isAuthError": self.is_auth_error(),
            "isServerError": self.is_server_error(),
            "originalError": self.original,
        })
    }
}

/// Default message for a status, if the table has one
pub fn status_message(status: u16) -> Option<&'static str> {
    let message = match status {
        400 => "Permintaan tidak valid",
        401 => "Akses ditolak - silakan login kembali",
        403 => "Anda tidak memiliki izin untuk aksi ini",
        404 => "Data yang diminta tidak ditemukan",
        408 => "Permintaan timeout - coba lagi",
        409 => "Konflik data - data mungkin sudah berubah",
        422 => "Data yang dikirim tidak valid",
        429 => "Terlalu banyak permintaan - coba lagi nanti",
        500 => "Kesalahan server internal",
        502 => "Server gateway bermasalah",
        503 => "Layanan tidak tersedia sementara",
        504 => "Gateway timeout",
        _ => return None,
    };
    Some(message)
}

/// Message for a received response
///
/// Server-provided text wins; the status table, the canonical reason phrase
/// and a generic `HTTP <code> Error` follow in that order.
pub fn message_for_response(status: u16, body: &Value) -> String {
    let from_body = body
        .get("message")
        .and_then(Value::as_str)
        .and_then(non_empty)
        .or_else(|| {
            body.get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .and_then(non_empty)
        })
        .or_else(|| body.get("error").and_then(Value::as_str).and_then(non_empty));

    if let Some(message) = from_body {
        return message.to_string();
    }

    status_message(status)
        .or_else(|| StatusCode::from_u16(status).ok().and_then(|s| s.canonical_reason()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {} Error", status))
}

fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::FailedResponse;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn echo() -> RequestEcho {
        RequestEcho {
            method: "GET".into(),
            url: "https://kos.example.com/api/kos".into(),
            headers: BTreeMap::new(),
            params: BTreeMap::new(),
            body: None,
            timeout_ms: 30_000,
        }
    }

    fn status_failure(status: u16, body: Value) -> TransportFailure {
        TransportFailure::Status {
            request: echo(),
            response: FailedResponse {
                status,
                headers: BTreeMap::new(),
                body,
            },
        }
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Authentication);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Permission);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::Client);
        assert_eq!(ErrorKind::from_status(422), ErrorKind::Client);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Server);
    }

    #[test]
    fn test_severity_by_kind() {
        assert_eq!(ErrorKind::Server.default_severity(), Severity::High);
        assert_eq!(ErrorKind::Network.default_severity(), Severity::High);
        assert_eq!(ErrorKind::Client.default_severity(), Severity::Medium);
        assert_eq!(ErrorKind::Setup.default_severity(), Severity::Medium);
        assert_eq!(ErrorKind::Encoding.default_severity(), Severity::Low);
    }

    #[test]
    fn test_server_message_wins() {
        let err = ClassifiedError::from_failure(&status_failure(
            422,
            json!({"message": "Email sudah terdaftar"}),
        ));
        assert_eq!(err.message(), "Email sudah terdaftar");
        assert!(err.is_client_error());
        assert_eq!(err.severity(), Severity::Medium);
    }

    #[test]
    fn test_nested_error_message() {
        let body = json!({"error": {"message": "Kos tidak ditemukan"}});
        assert_eq!(message_for_response(404, &body), "Kos tidak ditemukan");

        let body = json!({"error": "Profil belum dibuat"});
        assert_eq!(message_for_response(404, &body), "Profil belum dibuat");
    }

    #[test]
    fn test_status_table_fallback() {
        assert_eq!(message_for_response(404, &Value::Null), "Data yang diminta tidak ditemukan");
        assert_eq!(message_for_response(502, &json!({})), "Server gateway bermasalah");
        assert_eq!(message_for_response(418, &Value::Null), "I'm a teapot");
        assert_eq!(message_for_response(599, &Value::Null), "HTTP 599 Error");
    }

    #[test]
    fn test_network_failure() {
        let err = ClassifiedError::from_failure(&TransportFailure::NoResponse {
            request: echo(),
            reason: "operation timed out".into(),
            timed_out: true,
        });
        assert!(err.is_network_error());
        assert!(!err.is_server_error());
        assert!(!err.is_auth_error());
        assert_eq!(err.status_code(), None);
        assert_eq!(err.message(), NETWORK_ERROR_MESSAGE);
        assert!(err.original().timed_out);
    }

    #[test]
    fn test_setup_failure() {
        let err = ClassifiedError::from_failure(&TransportFailure::Setup {
            request: None,
            reason: String::new(),
        });
        assert_eq!(err.kind(), ErrorKind::Setup);
        assert_eq!(err.message(), UNKNOWN_ERROR_MESSAGE);
        assert!(!err.is_network_error() && !err.is_auth_error() && !err.is_server_error());
    }

    #[test]
    fn test_report_includes_flags() {
        let err = ClassifiedError::from_failure(&status_failure(401, Value::Null));
        let report = err.report();
        assert_eq!(report["isAuthError"], true);
        assert_eq!(report["statusCode"], 401);
        assert_eq!(report["message"], "Akses ditolak - silakan login kembali");
    }

    proptest! {
        #[test]
        fn prop_flags_follow_status(status in 300u16..600) {
            let err = ClassifiedError::from_failure(&status_failure(status, Value::Null));
            prop_assert_eq!(err.is_auth_error(), status == 401 || status == 403);
            prop_assert_eq!(err.is_server_error(), status >= 500);
            prop_assert!(!err.is_network_error());
            let flags = [err.is_network_error(), err.is_auth_error(), err.is_server_error()];
            prop_assert!(flags.iter().filter(|f| **f).count() <= 1);
        }
    }
}
