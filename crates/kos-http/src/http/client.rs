//! Verb operations
//!
//! GET, POST, PUT, PATCH and DELETE share one [`RequestSpec`] surface and one
//! internal `execute`; the public methods only supply per-verb defaults.
//! Every failure is classified, handed to the display policy, and returned.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

use super::auth::apply_bearer;
use super::builder::{ClientFactory, ClientOptions};
use super::diagnostics::DebugTracer;
use super::encoder::{MultipartField, RequestEncoder};
use super::error::{ClassifiedError, Result};
use super::pipeline::Phase;
use super::policy::{ErrorDisplayMode, ErrorPolicy, PolicyTargets};
use super::types::{
    NormalizedResponse, RequestBody, TransportFailure, UploadProgress, UploadProgressFn,
};
use crate::context::SessionContext;
use crate::notify::Notification;

/// Query parameter added by the cache buster
pub const CACHE_BUSTER_PARAM: &str = "_t";

/// How the body is put on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyEncoding {
    /// JSON, or URL-encoded for form bodies
    #[default]
    Structured,
    /// `multipart/form-data` built by the request encoder
    Multipart,
}

/// Side-effect policy of one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// `None` uses the verb default
    pub emit_success_notification: Option<bool>,
    pub handle_error_status: bool,
    pub error_display_mode: ErrorDisplayMode,
    /// `None` uses the configured debug flag
    pub debug: Option<bool>,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            emit_success_notification: None,
            handle_error_status: true,
            error_display_mode: ErrorDisplayMode::Toast,
            debug: None,
        }
    }
}

/// Input of a verb operation
#[derive(Debug, Clone, Default)]
pub struct RequestSpec {
    pub url: String,
    pub base_url: Option<String>,
    pub body: Option<RequestBody>,
    pub params: BTreeMap<String, String>,
    pub headers: Vec<(String, String)>,
    pub encoding: BodyEncoding,
    pub token: Option<String>,
    pub timeout: Option<Duration>,
    pub on_upload_progress: Option<UploadProgressFn>,
    pub cache_buster: bool,
    pub policy: CallPolicy,
}

impl RequestSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// JSON body
    pub fn with_json(self, body: Value) -> Self {
        self.with_body(RequestBody::Json(body))
    }

    /// URL-encoded body
    pub fn with_form<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.with_body(RequestBody::Form(
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }

    /// Field list sent as multipart
    pub fn with_fields(mut self, fields: Vec<MultipartField>) -> Self {
        self.encoding = BodyEncoding::Multipart;
        self.with_body(RequestBody::Fields(fields))
    }

    pub fn with_encoding(mut self, encoding: BodyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Explicit bearer token, preferred over the session token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Upload progress callback; used by POST and PUT
    pub fn with_upload_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        self.on_upload_progress = Some(UploadProgressFn::new(callback));
        self
    }

    /// Add `_t=<unix millis>` to GET requests
    pub fn with_cache_buster(mut self, enabled: bool) -> Self {
        self.cache_buster = enabled;
        self
    }

    pub fn with_success_notification(mut self, enabled: bool) -> Self {
        self.policy.emit_success_notification = Some(enabled);
        self
    }

    /// Whether failures trigger notifications and forced logout
    pub fn with_error_status_handling(mut self, enabled: bool) -> Self {
        self.policy.handle_error_status = enabled;
        self
    }

    pub fn with_error_display_mode(mut self, mode: ErrorDisplayMode) -> Self {
        self.policy.error_display_mode = mode;
        self
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.policy.debug = Some(enabled);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Put => Method::PUT,
            Verb::Patch => Method::PATCH,
            Verb::Delete => Method::DELETE,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }

    fn notifies_by_default(self) -> bool {
        self != Verb::Get
    }

    fn accepts_body(self) -> bool {
        self != Verb::Get
    }

    fn reports_upload_progress(self) -> bool {
        matches!(self, Verb::Post | Verb::Put)
    }

    fn success_title(self) -> &'static str {
        match self {
            Verb::Get => "Data berhasil dimuat",
            Verb::Post => "Berhasil",
            Verb::Put | Verb::Patch => "Berhasil Diperbarui",
            Verb::Delete => "Berhasil Dihapus",
        }
    }

    fn success_duration(self) -> Duration {
        match self {
            Verb::Post => Duration::from_millis(3000),
            _ => Duration::from_millis(2000),
        }
    }

    fn notifies_for_status(self, status: u16) -> bool {
        match self {
            Verb::Get => status == 200 || status == 201,
            _ => (200..300).contains(&status),
        }
    }
}

/// Verb operations bound to a session context
#[derive(Debug, Clone)]
pub struct HttpClient {
    context: SessionContext,
}

impl HttpClient {
    pub fn new(context: SessionContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub async fn get(&self, spec: RequestSpec) -> Result<NormalizedResponse> {
        self.execute(Verb::Get, spec).await
    }

    pub async fn post(&self, spec: RequestSpec) -> Result<NormalizedResponse> {
        self.execute(Verb::Post, spec).await
    }

    pub async fn put(&self, spec: RequestSpec) -> Result<NormalizedResponse> {
        self.execute(Verb::Put, spec).await
    }

    pub async fn patch(&self, spec: RequestSpec) -> Result<NormalizedResponse> {
        self.execute(Verb::Patch, spec).await
    }

    pub async fn delete(&self, spec: RequestSpec) -> Result<NormalizedResponse> {
        self.execute(Verb::Delete, spec).await
    }

    async fn execute(&self, verb: Verb, spec: RequestSpec) -> Result<NormalizedResponse> {
        let url = spec.url.trim();
        if url.is_empty() {
            return Err(ClassifiedError::setup("URL is required and must be a non-empty string"));
        }

        let config = self.context.config();
        let debug = spec.policy.debug.unwrap_or(config.debug_enabled);
        let tracer = DebugTracer::new(debug);
        let client = ClientFactory::new(&self.context).build(&ClientOptions {
            base_url: spec.base_url.clone(),
            timeout: spec.timeout,
            debug,
        });

        let mut request = client.request(verb.method(), url);
        request.params = spec.params.clone();
        if verb == Verb::Get && spec.cache_buster {
            request.params.insert(
                CACHE_BUSTER_PARAM.to_string(),
                chrono::Utc::now().timestamp_millis().to_string(),
            );
        }

        let body = match spec.body {
            Some(RequestBody::Json(Value::Null)) | None => None,
            Some(_) if !verb.accepts_body() => {
                tracing::warn!(method = verb.label(), url, "ignoring request body");
                None
            }
            Some(body) => Some(body),
        };

        let multipart = body.is_some() && spec.encoding == BodyEncoding::Multipart;
        request.body = match body {
            Some(body) if multipart => Some(RequestBody::Multipart(self.encode_multipart(body))),
            other => other,
        };

        if let Err(reason) = merge_headers(&mut request.headers, &spec.headers, spec.token.as_deref(), multipart) {
            let failure = TransportFailure::Setup {
                request: Some(request.echo()),
                reason,
            };
            let error = client.reject(Phase::Request, &failure);
            return Err(self.fail(verb, &spec.policy, &tracer, url, error));
        }

        if verb.reports_upload_progress() {
            request.on_upload_progress = spec.on_upload_progress.clone();
        }

        tracer.trace_request(&format!("{} Request", verb.label()), &request);

        match client.send(request).await {
            Ok(response) => {
                tracer.trace_response(&format!("{} Response", verb.label()), &response);
                let response = NormalizedResponse::from(response);
                self.notify_success(verb, &spec.policy, &response);
                Ok(response)
            }
            Err(error) => Err(self.fail(verb, &spec.policy, &tracer, url, error)),
        }
    }

    fn encode_multipart(&self, body: RequestBody) -> super::encoder::MultipartPayload {
        let encoder = RequestEncoder::new(self.context.config())
            .with_error_store(std::sync::Arc::clone(self.context.errors()));
        match body {
            RequestBody::Multipart(payload) => payload,
            RequestBody::Fields(fields) => encoder.encode_fields(&fields),
            RequestBody::Json(value) => encoder.encode_value(&value),
            RequestBody::Form(pairs) => {
                let fields: Vec<MultipartField> = pairs
                    .into_iter()
                    .map(|(key, value)| MultipartField::new(key, value))
                    .collect();
                encoder.encode_fields(&fields)
            }
        }
    }

    fn notify_success(&self, verb: Verb, policy: &CallPolicy, response: &NormalizedResponse) {
        let enabled = policy
            .emit_success_notification
            .unwrap_or_else(|| verb.notifies_by_default());
        if !enabled || !verb.notifies_for_status(response.status_code) {
            return;
        }
        if let Some(message) = response.message() {
            self.context.notifier().show(Notification::success(
                verb.success_title(),
                message,
                verb.success_duration(),
            ));
        }
    }

    fn fail(
        &self,
        verb: Verb,
        policy: &CallPolicy,
        tracer: &DebugTracer,
        url: &str,
        error: ClassifiedError,
    ) -> ClassifiedError {
        tracer.trace_error(&format!("{} Error", verb.label()), url, &error);

        let error_policy = ErrorPolicy {
            handle_error_status: policy.handle_error_status,
            display_mode: policy.error_display_mode,
        };
        let action = error_policy.apply(
            &error,
            &PolicyTargets {
                notifier: self.context.notifier().as_ref(),
                session: self.context.session(),
                store: self.context.errors(),
                logout_delay: self.context.config().logout_delay,
            },
        );
        tracing::debug!(method = verb.label(), url, action = ?action, "error policy applied");
        error
    }
}

/// Merge caller headers, then the explicit token
///
/// Multipart bodies drop any explicit `Content-Type`.
fn merge_headers(
    headers: &mut HeaderMap,
    extra: &[(String, String)],
    token: Option<&str>,
    multipart: bool,
) -> std::result::Result<(), String> {
    for (name, value) in extra {
        let header_name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| format!("invalid header name '{}'", name))?;
        let header_value = HeaderValue::from_str(value.trim())
            .map_err(|_| format!("invalid value for header '{}'", name))?;
        headers.insert(header_name, header_value);
    }

    if multipart {
        headers.remove(CONTENT_TYPE);
    }

    if let Some(token) = token {
        apply_bearer(headers, token)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;

    #[test]
    fn test_verb_defaults() {
        assert!(!Verb::Get.notifies_by_default());
        assert!(Verb::Post.notifies_by_default());
        assert!(Verb::Delete.notifies_by_default());
        assert!(Verb::Post.reports_upload_progress());
        assert!(!Verb::Patch.reports_upload_progress());
        assert_eq!(Verb::Patch.success_title(), "Berhasil Diperbarui");
        assert_eq!(Verb::Post.success_duration(), Duration::from_millis(3000));
    }

    #[test]
    fn test_get_notifies_only_for_200_and_201() {
        assert!(Verb::Get.notifies_for_status(200));
        assert!(Verb::Get.notifies_for_status(201));
        assert!(!Verb::Get.notifies_for_status(204));
        assert!(Verb::Delete.notifies_for_status(204));
    }

    #[test]
    fn test_merge_headers_token_wins() {
        let mut headers = HeaderMap::new();
        merge_headers(
            &mut headers,
            &[("Authorization".into(), "Bearer caller".into())],
            Some("explicit"),
            false,
        )
        .unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer explicit");
    }

    #[test]
    fn test_merge_headers_multipart_drops_content_type() {
        let mut headers = HeaderMap::new();
        merge_headers(
            &mut headers,
            &[("Content-Type".into(), "application/json".into())],
            None,
            true,
        )
        .unwrap();
        assert!(headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_merge_headers_rejects_bad_name() {
        let mut headers = HeaderMap::new();
        let err = merge_headers(&mut headers, &[("bad header".into(), "x".into())], None, false);
        assert!(err.is_err());
    }

    #[test]
    fn test_request_spec_builder() {
        let spec = RequestSpec::new("/kos")
            .with_param("page", 1)
            .with_param("limit", 10)
            .with_header("X-Trace", "abc")
            .with_error_display_mode(ErrorDisplayMode::Modal)
            .with_success_notification(false);
        assert_eq!(spec.params["page"], "1");
        assert_eq!(spec.headers.len(), 1);
        assert_eq!(spec.policy.error_display_mode, ErrorDisplayMode::Modal);
        assert_eq!(spec.policy.emit_success_notification, Some(false));
        assert!(spec.policy.handle_error_status);

        let multipart = RequestSpec::new("/kos").with_fields(vec![MultipartField::new("a", 1)]);
        assert_eq!(multipart.encoding, BodyEncoding::Multipart);
    }
}
