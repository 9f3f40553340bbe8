//! Request pipeline
//!
//! Ordered request stages run before a request is handed to the transport;
//! response stages observe the outcome. A request stage that fails stops the
//! pipeline and is reported like any other failure.

use std::sync::Arc;

use reqwest::header::{HeaderValue, CONTENT_TYPE};

use super::diagnostics::DebugTracer;
use super::error::ClassifiedError;
use super::types::{TransportFailure, TransportRequest, TransportResponse};
use crate::telemetry::{ErrorContext, ErrorStore};
use crate::Severity;

/// Where in the pipeline a failure surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A request stage failed before sending
    Request,
    /// The transport reported a failure
    Response,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Request => "request_interceptor",
            Phase::Response => "response_interceptor",
        }
    }
}

/// Transform applied to every outbound request
pub trait RequestStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, request: &mut TransportRequest) -> Result<(), String>;
}

/// Observer of every outcome
pub trait ResponseStage: Send + Sync {
    fn on_success(&self, _response: &TransportResponse) {}

    fn on_failure(&self, _phase: Phase, _failure: &TransportFailure, _error: &ClassifiedError) {}
}

/// Ordered request and response stages
#[derive(Default)]
pub struct Pipeline {
    request_stages: Vec<Box<dyn RequestStage>>,
    response_stages: Vec<Box<dyn ResponseStage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_stage(mut self, stage: impl RequestStage + 'static) -> Self {
        self.request_stages.push(Box::new(stage));
        self
    }

    pub fn with_response_stage(mut self, stage: impl ResponseStage + 'static) -> Self {
        self.response_stages.push(Box::new(stage));
        self
    }

    /// Run every request stage; the first failure becomes a setup failure
    pub fn prepare(&self, request: &mut TransportRequest) -> Result<(), TransportFailure> {
        for stage in &self.request_stages {
            if let Err(reason) = stage.apply(request) {
                return Err(TransportFailure::Setup {
                    request: Some(request.echo()),
                    reason: format!("{}: {}", stage.name(), reason),
                });
            }
        }
        Ok(())
    }

    pub fn succeeded(&self, response: &TransportResponse) {
        for stage in &self.response_stages {
            stage.on_success(response);
        }
    }

    pub fn failed(&self, phase: Phase, failure: &TransportFailure, error: &ClassifiedError) {
        for stage in &self.response_stages {
            stage.on_failure(phase, failure, error);
        }
    }
}

/// Sets `Content-Type` from the body kind
///
/// Multipart bodies lose any explicit content type so the transport can add
/// the boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentTypeNegotiation;

impl RequestStage for ContentTypeNegotiation {
    fn name(&self) -> &'static str {
        "content_type"
    }

    fn apply(&self, request: &mut TransportRequest) -> Result<(), String> {
        let Some(body) = &request.body else {
            return Ok(());
        };
        if body.is_multipart() {
            request.headers.remove(CONTENT_TYPE);
        } else if body.is_url_encoded() {
            request.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
        } else if body.is_structured() {
            request
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Ok(())
    }
}

/// Stamps `X-Platform` and `X-App-Version`
#[derive(Debug, Clone)]
pub struct MetadataStamp {
    platform: String,
    app_version: String,
}

impl MetadataStamp {
    pub fn new(platform: impl Into<String>, app_version: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            app_version: app_version.into(),
        }
    }
}

impl RequestStage for MetadataStamp {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn apply(&self, request: &mut TransportRequest) -> Result<(), String> {
        let platform = HeaderValue::from_str(&self.platform)
            .map_err(|_| format!("invalid platform tag '{}'", self.platform))?;
        let version = HeaderValue::from_str(&self.app_version)
            .map_err(|_| format!("invalid app version '{}'", self.app_version))?;
        request.headers.insert("x-platform", platform);
        request.headers.insert("x-app-version", version);
        Ok(())
    }
}

/// Traces the final request just before it is sent
#[derive(Debug, Clone, Copy)]
pub struct RequestTrace {
    tracer: DebugTracer,
}

impl RequestTrace {
    pub fn new(tracer: DebugTracer) -> Self {
        Self { tracer }
    }
}

impl RequestStage for RequestTrace {
    fn name(&self) -> &'static str {
        "request_trace"
    }

    fn apply(&self, request: &mut TransportRequest) -> Result<(), String> {
        self.tracer.trace_request("Request Interceptor", request);
        Ok(())
    }
}

/// Traces responses and failures
#[derive(Debug, Clone, Copy)]
pub struct ResponseTrace {
    tracer: DebugTracer,
}

impl ResponseTrace {
    pub fn new(tracer: DebugTracer) -> Self {
        Self { tracer }
    }
}

impl ResponseStage for ResponseTrace {
    fn on_success(&self, response: &TransportResponse) {
        self.tracer.trace_response("Response Interceptor", response);
    }

    fn on_failure(&self, phase: Phase, failure: &TransportFailure, error: &ClassifiedError) {
        let url = failure.request().map(|r| r.url.as_str()).unwrap_or_default();
        self.tracer.trace_error(phase.as_str(), url, error);
    }
}

/// Records every failure in the error store
pub struct FailureRecorder {
    store: Arc<ErrorStore>,
    platform: String,
}

impl FailureRecorder {
    pub fn new(store: Arc<ErrorStore>, platform: impl Into<String>) -> Self {
        Self {
            store,
            platform: platform.into(),
        }
    }
}

impl ResponseStage for FailureRecorder {
    fn on_failure(&self, phase: Phase, failure: &TransportFailure, error: &ClassifiedError) {
        let context = match failure.request() {
            Some(request) => ErrorContext::for_request(phase.as_str(), request),
            None => ErrorContext::new(phase.as_str()),
        }
        .with_platform(&self.platform);

        if let TransportFailure::NoResponse { reason, timed_out, .. } = failure {
            let context = context
                .with_extra("reason", serde_json::Value::String(reason.clone()))
                .with_extra("timed_out", serde_json::Value::Bool(*timed_out));
            self.store.record_classified(error, context);
            return;
        }

        match phase {
            Phase::Request => {
                let mut context = context;
                context.status_code = error.status_code();
                self.store
                    .record(error.kind(), Severity::High, error.message(), context);
            }
            Phase::Response => {
                self.store.record_classified(error, context);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::encoder::MultipartPayload;
    use crate::http::types::RequestBody;
    use crate::http::ErrorKind;
    use reqwest::Method;
    use serde_json::json;
    use std::time::Duration;

    fn request(body: Option<RequestBody>) -> TransportRequest {
        let mut req = TransportRequest::new(Method::POST, "https://kos.example.com/api", "/sewa", Duration::from_secs(30));
        req.body = body;
        req
    }

    struct Failing;

    impl RequestStage for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn apply(&self, _request: &mut TransportRequest) -> Result<(), String> {
            Err("boom".into())
        }
    }

    #[test]
    fn test_content_type_for_json() {
        let mut req = request(Some(RequestBody::Json(json!({"kos_id": 3}))));
        ContentTypeNegotiation.apply(&mut req).unwrap();
        assert_eq!(req.headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_content_type_for_form() {
        let mut req = request(Some(RequestBody::Form(vec![("a".into(), "1".into())])));
        ContentTypeNegotiation.apply(&mut req).unwrap();
        assert_eq!(req.headers[CONTENT_TYPE], "application/x-www-form-urlencoded");
    }

    #[test]
    fn test_content_type_removed_for_multipart() {
        let mut req = request(Some(RequestBody::Multipart(MultipartPayload::new())));
        req.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        ContentTypeNegotiation.apply(&mut req).unwrap();
        assert!(req.headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_metadata_stamp() {
        let mut req = request(None);
        MetadataStamp::new("android", "1.0.0").apply(&mut req).unwrap();
        assert_eq!(req.headers["x-platform"], "android");
        assert_eq!(req.headers["x-app-version"], "1.0.0");
    }

    #[test]
    fn test_failing_stage_becomes_setup_failure() {
        let pipeline = Pipeline::new()
            .with_request_stage(ContentTypeNegotiation)
            .with_request_stage(Failing);
        let mut req = request(None);

        match pipeline.prepare(&mut req) {
            Err(TransportFailure::Setup { request, reason }) => {
                assert!(request.is_some());
                assert_eq!(reason, "failing: boom");
            }
            other => panic!("expected setup failure, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_recorder_uses_phase() {
        let store = Arc::new(ErrorStore::default());
        let recorder = FailureRecorder::new(store.clone(), "ios");
        let failure = TransportFailure::Setup {
            request: Some(request(None).echo()),
            reason: "metadata: invalid platform tag".into(),
        };
        let error = ClassifiedError::from_failure(&failure);
        recorder.on_failure(Phase::Request, &failure, &error);

        let record = store.latest().unwrap();
        assert_eq!(record.kind, ErrorKind::Setup);
        assert_eq!(record.severity, Severity::High);
        assert_eq!(record.context.phase, "request_interceptor");
        assert_eq!(record.context.method.as_deref(), Some("POST"));
        assert_eq!(record.context.platform.as_deref(), Some("ios"));
    }
}
