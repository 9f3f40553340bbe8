//! HTTP request/response pipeline
//!
//! This module provides:
//! - Verb operations (GET, POST, PUT, PATCH, DELETE) over one shared policy surface
//! - A per-call client factory with an explicit request pipeline
//! - Bearer authentication and platform metadata headers
//! - Multipart request encoding
//! - Error classification and display policy, including forced logout on 401
//! - Debug tracing with credential redaction

pub mod auth;
pub mod builder;
pub mod client;
pub mod diagnostics;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod transport;
pub mod types;

pub use auth::{normalize_bearer, strip_bearer, BearerAuth};
pub use builder::{ApiClient, ClientFactory, ClientOptions};
pub use client::{BodyEncoding, CallPolicy, HttpClient, RequestSpec};
pub use diagnostics::DebugTracer;
pub use encoder::{FileRef, MultipartField, MultipartPayload, Part, RequestEncoder};
pub use error::{status_message, ClassifiedError, ErrorKind, Result};
pub use pipeline::{Phase, Pipeline, RequestStage, ResponseStage};
pub use policy::{ErrorDisplayMode, ErrorPolicy, PolicyAction};
pub use transport::{multipart_form, ReqwestTransport, Transport};
pub use types::{
    FailedResponse, NormalizedResponse, RequestBody, RequestEcho, TransportFailure,
    TransportRequest, TransportResponse, UploadProgress, UploadProgressFn,
};

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
