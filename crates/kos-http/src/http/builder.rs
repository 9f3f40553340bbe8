//! Per-call client construction
//!
//! [`ClientFactory`] builds a fresh [`ApiClient`] for every verb call: base
//! URL, timeout and default headers resolved from the session context, and
//! the request pipeline assembled around the shared transport.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Method;

use super::auth::BearerAuth;
use super::diagnostics::DebugTracer;
use super::error::ClassifiedError;
use super::pipeline::{
    ContentTypeNegotiation, FailureRecorder, MetadataStamp, Phase, Pipeline, RequestTrace,
    ResponseTrace,
};
use super::transport::Transport;
use super::types::{TransportFailure, TransportRequest, TransportResponse};
use crate::context::SessionContext;

/// Per-call overrides for a client
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub debug: bool,
}

/// Builds configured clients from a session context
#[derive(Clone, Copy)]
pub struct ClientFactory<'a> {
    context: &'a SessionContext,
}

impl<'a> ClientFactory<'a> {
    pub fn new(context: &'a SessionContext) -> Self {
        Self { context }
    }

    /// A client with its own pipeline
    pub fn build(&self, options: &ClientOptions) -> ApiClient {
        let config = self.context.config();
        let tracer = DebugTracer::new(options.debug);

        let pipeline = Pipeline::new()
            .with_request_stage(ContentTypeNegotiation)
            .with_request_stage(BearerAuth::new(Arc::clone(self.context.session())))
            .with_request_stage(MetadataStamp::new(&config.platform_tag, &config.app_version))
            .with_request_stage(RequestTrace::new(tracer))
            .with_response_stage(ResponseTrace::new(tracer))
            .with_response_stage(FailureRecorder::new(
                Arc::clone(self.context.errors()),
                &config.platform_tag,
            ));

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        default_headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));

        ApiClient {
            base_url: config.resolve_base_url(options.base_url.as_deref()),
            timeout: options.timeout.unwrap_or(config.default_timeout),
            default_headers,
            pipeline,
            transport: Arc::clone(self.context.transport()),
        }
    }
}

/// A configured client for one call
pub struct ApiClient {
    base_url: String,
    timeout: Duration,
    default_headers: HeaderMap,
    pipeline: Pipeline,
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// A request carrying the client's base URL, timeout and default headers
    pub fn request(&self, method: Method, path: &str) -> TransportRequest {
        let mut request = TransportRequest::new(method, &self.base_url, path, self.timeout);
        request.headers = self.default_headers.clone();
        request
    }

    /// Run the pipeline and send
    pub async fn send(&self, mut request: TransportRequest) -> Result<TransportResponse, ClassifiedError> {
        if let Err(failure) = self.pipeline.prepare(&mut request) {
            return Err(self.reject(Phase::Request, &failure));
        }

        match self.transport.send(request).await {
            Ok(response) => {
                self.pipeline.succeeded(&response);
                Ok(response)
            }
            Err(failure) => Err(self.reject(Phase::Response, &failure)),
        }
    }

    /// Classify a failure and let the response stages observe it
    pub fn reject(&self, phase: Phase, failure: &TransportFailure) -> ClassifiedError {
        let error = ClassifiedError::from_failure(failure);
        self.pipeline.failed(phase, failure, &error);
        error
    }
}
