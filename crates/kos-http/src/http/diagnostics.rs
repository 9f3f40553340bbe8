//! Debug tracing of requests, responses and failures
//!
//! [`DebugTracer`] emits structured `tracing` events when the per-call debug
//! flag is on and stays silent otherwise. Credentials are redacted before
//! anything is traced.

use super::error::ClassifiedError;
use super::types::{TransportRequest, TransportResponse};

/// Per-call debug tracer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugTracer {
    enabled: bool,
}

impl DebugTracer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Trace an outbound request
    pub fn trace_request(&self, context: &str, request: &TransportRequest) {
        if !self.enabled {
            return;
        }
        let echo = request.echo();
        let body = echo.body.as_ref().map(|body| body.to_string()).unwrap_or_default();
        tracing::debug!(
            context,
            method = %echo.method,
            url = %echo.url,
            headers = %to_json(&echo.headers),
            params = %to_json(&echo.params),
            body = %body,
            body_size = request.body.as_ref().map(|b| b.approximate_size()).unwrap_or(0),
            timeout_ms = echo.timeout_ms,
            "outbound request"
        );
    }

    /// Trace a 2xx response
    pub fn trace_response(&self, context: &str, response: &TransportResponse) {
        if !self.enabled {
            return;
        }
        let header_names: Vec<&str> = response.headers.keys().map(String::as_str).collect();
        tracing::debug!(
            context,
            method = %response.request.method,
            url = %response.request.url,
            status = response.status,
            headers = ?header_names,
            data_size = response.body.to_string().len(),
            "response received"
        );
    }

    /// Trace a classified failure
    pub fn trace_error(&self, context: &str, url: &str, error: &ClassifiedError) {
        if !self.enabled {
            return;
        }
        tracing::error!(
            context,
            url,
            status = ?error.status_code(),
            kind = %error.kind(),
            error = %redaction::redact_sensitive(error.message()),
            "request failed"
        );
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Redaction of credentials in headers, JSON and free text
pub mod redaction {
    use std::collections::BTreeMap;
    use std::sync::OnceLock;

    use regex::Regex;
    use reqwest::header::HeaderMap;
    use serde_json::Value;

    const MASK: &str = "***";

    static BEARER_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    static TOKEN_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    static PASSWORD_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

    fn bearer_regex() -> Option<&'static Regex> {
        BEARER_REGEX
            .get_or_init(|| Regex::new(r"(?i)\bbearer\s+[a-z0-9._~+/=-]+").ok())
            .as_ref()
    }

    fn token_regex() -> Option<&'static Regex> {
        TOKEN_REGEX
            .get_or_init(|| {
                Regex::new(r#"(?i)(access_token|token|api[_-]?key)["']?\s*[=:]\s*["']?([a-z0-9._-]{6,})"#).ok()
            })
            .as_ref()
    }

    fn password_regex() -> Option<&'static Regex> {
        PASSWORD_REGEX
            .get_or_init(|| Regex::new(r#"(?i)(password|passwd|pwd)["']?\s*[=:]\s*["']?([^\s"',}]{1,})"#).ok())
            .as_ref()
    }

    /// Whether a header carries credentials
    pub fn is_sensitive_header(name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        name == "authorization"
            || name.contains("token")
            || name.contains("key")
            || name.contains("secret")
            || name.contains("cookie")
    }

    /// Whether a JSON key carries credentials
    pub fn is_sensitive_key(key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        key.contains("token")
            || key.contains("password")
            || key.contains("passwd")
            || key.contains("secret")
            || key == "authorization"
    }

    /// Header map as sorted name/value pairs with credentials masked
    pub fn redact_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
        headers
            .iter()
            .map(|(name, value)| {
                let value = if is_sensitive_header(name.as_str()) {
                    MASK.to_string()
                } else {
                    value.to_str().unwrap_or("<binary>").to_string()
                };
                (name.as_str().to_string(), value)
            })
            .collect()
    }

    /// Mask tokens and passwords in free text
    pub fn redact_sensitive(input: &str) -> String {
        let mut result = input.to_string();
        if let Some(regex) = bearer_regex() {
            result = regex.replace_all(&result, "Bearer ***").into_owned();
        }
        if let Some(regex) = token_regex() {
            result = regex.replace_all(&result, "$1=***").into_owned();
        }
        if let Some(regex) = password_regex() {
            result = regex.replace_all(&result, "$1=***").into_owned();
        }
        result
    }

    /// Mask sensitive members of a JSON value in place
    pub fn redact_json_value(value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    if is_sensitive_key(key) {
                        *val = Value::String(MASK.to_string());
                    } else {
                        redact_json_value(val);
                    }
                }
            }
            Value::Array(items) => items.iter_mut().for_each(redact_json_value),
            Value::String(text) => *text = redact_sensitive(text),
            _ => {}
        }
    }
}
