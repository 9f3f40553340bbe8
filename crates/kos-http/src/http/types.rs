//! Request and response shapes exchanged with the transport
//!
//! A [`TransportRequest`] is what the pipeline hands to a [`Transport`](super::Transport);
//! a [`TransportResponse`] or [`TransportFailure`] is what comes back. The
//! verb operations turn a successful response into a [`NormalizedResponse`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::diagnostics::redaction;
use super::encoder::{MultipartField, MultipartPayload};

/// Body of an outbound request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Structured body serialized as JSON
    Json(Value),
    /// URL-encoded parameter set
    Form(Vec<(String, String)>),
    /// Already encoded multipart payload
    Multipart(MultipartPayload),
    /// Raw `{key, value}` list; encoded as multipart when the encoding mode asks for it
    Fields(Vec<MultipartField>),
}

impl RequestBody {
    /// Whether the body is sent as `multipart/form-data`
    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }

    /// Whether the body is sent as `application/x-www-form-urlencoded`
    pub fn is_url_encoded(&self) -> bool {
        matches!(self, RequestBody::Form(_))
    }

    /// Whether the body is a JSON object or array
    pub fn is_structured(&self) -> bool {
        match self {
            RequestBody::Json(value) => value.is_object() || value.is_array(),
            RequestBody::Fields(_) => true,
            _ => false,
        }
    }

    /// JSON view of the body for tracing and telemetry
    ///
    /// Multipart payloads are summarized by part; file contents are never read.
    pub fn describe(&self) -> Value {
        match self {
            RequestBody::Json(value) => value.clone(),
            RequestBody::Form(pairs) => Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
            RequestBody::Multipart(payload) => payload.describe(),
            RequestBody::Fields(fields) => fields_as_json(fields),
        }
    }

    /// Approximate serialized size in bytes, used by the debug tracer
    pub fn approximate_size(&self) -> usize {
        match self {
            RequestBody::Json(value) => value.to_string().len(),
            RequestBody::Form(pairs) => pairs.iter().map(|(k, v)| k.len() + v.len() + 2).sum(),
            RequestBody::Multipart(payload) => payload.text_size(),
            RequestBody::Fields(fields) => fields_as_json(fields).to_string().len(),
        }
    }
}

/// JSON array of `{key, value}` objects, the non-multipart form of a field list
pub fn fields_as_json(fields: &[MultipartField]) -> Value {
    Value::Array(
        fields
            .iter()
            .map(|field| serde_json::json!({ "key": field.key, "value": field.value }))
            .collect(),
    )
}

/// Progress of a request body upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    /// Bytes handed to the network so far
    pub loaded: u64,
    /// Total body size in bytes
    pub total: u64,
}

impl UploadProgress {
    /// Completed fraction in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.loaded as f64 / self.total as f64
        }
    }
}

/// Shared upload-progress callback
#[derive(Clone)]
pub struct UploadProgressFn(Arc<dyn Fn(UploadProgress) + Send + Sync>);

impl UploadProgressFn {
    /// Wrap a callback
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    /// Report progress to the callback
    pub fn report(&self, progress: UploadProgress) {
        (self.0)(progress)
    }
}

impl fmt::Debug for UploadProgressFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UploadProgressFn(..)")
    }
}

/// A fully described outbound request
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub base_url: String,
    pub path: String,
    pub params: BTreeMap<String, String>,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    pub timeout: Duration,
    pub on_upload_progress: Option<UploadProgressFn>,
}

impl TransportRequest {
    /// Create a request with no params, headers or body
    pub fn new(method: Method, base_url: impl Into<String>, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            base_url: base_url.into(),
            path: path.into(),
            params: BTreeMap::new(),
            headers: HeaderMap::new(),
            body: None,
            timeout,
            on_upload_progress: None,
        }
    }

    /// Full URL: base URL joined with the path, then the query parameters
    ///
    /// Absolute paths (`http://`, `https://`) ignore the base URL.
    pub fn resolve_url(&self) -> Result<Url, url::ParseError> {
        let raw = if is_absolute(&self.path) {
            self.path.clone()
        } else if self.path.is_empty() {
            self.base_url.clone()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                self.path.trim_start_matches('/')
            )
        };

        let mut url = Url::parse(&raw)?;
        if !self.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Display form of the URL, falling back to the unparsed pieces
    pub fn display_url(&self) -> String {
        self.resolve_url()
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base_url, self.path))
    }

    /// Redacted, serializable snapshot of this request
    pub fn echo(&self) -> RequestEcho {
        RequestEcho {
            method: self.method.to_string(),
            url: self.display_url(),
            headers: redaction::redact_headers(&self.headers),
            params: self.params.clone(),
            body: self.body.as_ref().map(|body| {
                let mut described = body.describe();
                redaction::redact_json_value(&mut described);
                described
            }),
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

fn is_absolute(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Redacted snapshot of the request that produced a response or failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEcho {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub timeout_ms: u64,
}

/// Response received with a 2xx status
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    pub request: RequestEcho,
}

/// Response received with a status outside 2xx
#[derive(Debug, Clone)]
pub struct FailedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

/// Why a request did not produce a 2xx response
#[derive(Debug, Clone)]
pub enum TransportFailure {
    /// The peer answered with a non-2xx status
    Status {
        request: RequestEcho,
        response: FailedResponse,
    },
    /// The request went out but nothing came back
    NoResponse {
        request: RequestEcho,
        reason: String,
        timed_out: bool,
    },
    /// The request could not be built or sent at all
    Setup {
        request: Option<RequestEcho>,
        reason: String,
    },
}

impl TransportFailure {
    /// The request snapshot, when one was built
    pub fn request(&self) -> Option<&RequestEcho> {
        match self {
            TransportFailure::Status { request, .. } => Some(request),
            TransportFailure::NoResponse { request, .. } => Some(request),
            TransportFailure::Setup { request, .. } => request.as_ref(),
        }
    }

    /// Short description of the failure
    pub fn description(&self) -> String {
        match self {
            TransportFailure::Status { response, .. } => {
                format!("Request failed with status code {}", response.status)
            }
            TransportFailure::NoResponse { reason, timed_out: true, .. } => {
                format!("Request timed out: {}", reason)
            }
            TransportFailure::NoResponse { reason, .. } => format!("No response received: {}", reason),
            TransportFailure::Setup { reason, .. } => reason.clone(),
        }
    }
}

/// Successful result of a verb operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResponse {
    pub body: Value,
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub raw_request_config: RequestEcho,
}

impl NormalizedResponse {
    /// The body's top-level `message` string, if any
    pub fn message(&self) -> Option<&str> {
        self.body
            .get("message")
            .and_then(Value::as_str)
            .filter(|message| !message.trim().is_empty())
    }

    /// Deserialize the body into a typed value
    pub fn json<T: DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

impl From<TransportResponse> for NormalizedResponse {
    fn from(response: TransportResponse) -> Self {
        Self {
            body: response.body,
            status_code: response.status,
            headers: response.headers,
            raw_request_config: response.request,
        }
    }
}
