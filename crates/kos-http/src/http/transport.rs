//! Transport primitive
//!
//! [`Transport`] is the only seam between the pipeline and the network. The
//! production implementation is [`ReqwestTransport`]; tests substitute a
//! scripted one.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::multipart::{Form, Part as FormPart};
use serde_json::Value;

use super::encoder::{MultipartPayload, Part};
use super::types::{
    fields_as_json, FailedResponse, RequestBody, RequestEcho, TransportFailure, TransportRequest,
    TransportResponse, UploadProgress, UploadProgressFn,
};

/// Size of the body chunks handed to the network when progress is reported
pub const UPLOAD_CHUNK_SIZE: usize = 16 * 1024;

/// Sends one request and reports a 2xx response or a failure
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure>;
}

/// [`Transport`] backed by a reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client using rustls
    pub fn new() -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| crate::Error::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e.into()),
            })?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure> {
        let echo = request.echo();
        let setup = |reason: String| TransportFailure::Setup {
            request: Some(echo.clone()),
            reason,
        };

        let url = request
            .resolve_url()
            .map_err(|e| setup(format!("Invalid URL '{}': {}", request.display_url(), e)))?;

        let mut headers = request.headers.clone();
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .timeout(request.timeout);

        if let Some(body) = &request.body {
            match encode_body(body, request.on_upload_progress.clone()).await.map_err(setup)? {
                EncodedBody::Bytes(bytes) => {
                    headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len() as u64));
                    builder = builder.body(progress_body(bytes, request.on_upload_progress.clone()));
                }
                EncodedBody::Multipart(form) => {
                    // reqwest sets the boundary content type and the length
                    headers.remove(CONTENT_TYPE);
                    headers.remove(CONTENT_LENGTH);
                    builder = builder.multipart(form);
                }
            }
        }

        let response = builder
            .headers(headers)
            .send()
            .await
            .map_err(|e| map_send_error(e, &echo))?;

        let status = response.status().as_u16();
        let response_headers = collect_headers(response.headers());
        let text = response.text().await.map_err(|e| TransportFailure::NoResponse {
            request: echo.clone(),
            reason: format!("Failed to read response body: {}", e),
            timed_out: e.is_timeout(),
        })?;
        let body = parse_body(&text);

        tracing::trace!(status, url = %echo.url, "transport exchange complete");

        if (200..300).contains(&status) {
            Ok(TransportResponse {
                status,
                headers: response_headers,
                body,
                request: echo,
            })
        } else {
            Err(TransportFailure::Status {
                request: echo,
                response: FailedResponse {
                    status,
                    headers: response_headers,
                    body,
                },
            })
        }
    }
}

enum EncodedBody {
    Bytes(Vec<u8>),
    Multipart(Form),
}

async fn encode_body(body: &RequestBody, progress: Option<UploadProgressFn>) -> Result<EncodedBody, String> {
    match body {
        RequestBody::Json(value) => Ok(EncodedBody::Bytes(serde_json::to_vec(value).map_err(|e| e.to_string())?)),
        RequestBody::Form(pairs) => Ok(EncodedBody::Bytes(
            url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish()
                .into_bytes(),
        )),
        RequestBody::Multipart(payload) => multipart_form(payload, progress)
            .await
            .map(EncodedBody::Multipart)
            .map_err(|e| e.to_string()),
        RequestBody::Fields(fields) => Ok(EncodedBody::Bytes(
            serde_json::to_vec(&fields_as_json(fields)).map_err(|e| e.to_string())?,
        )),
    }
}

/// Build the `multipart/form-data` form for a payload
///
/// File contents are read up front, so a missing file fails before anything
/// is sent. Upload progress counts file bytes across every file part.
pub async fn multipart_form(
    payload: &MultipartPayload,
    progress: Option<UploadProgressFn>,
) -> crate::Result<Form> {
    let mut contents = Vec::new();
    for part in payload.parts() {
        if let Part::File { file, .. } = part {
            let data = tokio::fs::read(file.path()).await.map_err(|e| crate::Error::Io {
                message: format!("Failed to read upload '{}': {}", file.uri, e),
                source: e,
            })?;
            contents.push(Bytes::from(data));
        }
    }

    let total: u64 = contents.iter().map(|data| data.len() as u64).sum();
    let counter = progress.map(|progress| ProgressCounter::new(progress, total));
    if let Some(counter) = counter.as_ref().filter(|_| total == 0) {
        counter.advance(0);
    }

    let mut contents = contents.into_iter();
    let mut form = Form::new().percent_encode_noop();
    for part in payload.parts() {
        form = match part {
            Part::Text { name, value } => form.text(name.clone(), value.clone()),
            Part::File { name, file } => {
                let data = contents.next().unwrap_or_default();
                let length = data.len() as u64;
                let body = counted_body(data, counter.clone());
                let part = FormPart::stream_with_length(body, length)
                    .file_name(file.file_name.clone())
                    .mime_str(&file.mime_type)
                    .map_err(|_| crate::Error::InvalidRequest {
                        message: format!("Invalid MIME type '{}' for upload '{}'", file.mime_type, file.uri),
                        field: Some(name.clone()),
                    })?;
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}

/// Cumulative upload progress shared by the chunks of one request
#[derive(Debug, Clone)]
struct ProgressCounter {
    progress: UploadProgressFn,
    loaded: Arc<AtomicU64>,
    total: u64,
}

impl ProgressCounter {
    fn new(progress: UploadProgressFn, total: u64) -> Self {
        Self {
            progress,
            loaded: Arc::new(AtomicU64::new(0)),
            total,
        }
    }

    fn advance(&self, bytes: u64) {
        let loaded = self.loaded.fetch_add(bytes, Ordering::SeqCst) + bytes;
        self.progress.report(UploadProgress {
            loaded,
            total: self.total,
        });
    }
}

/// Request body that reports progress as chunks are pulled by the connection
fn progress_body(bytes: Vec<u8>, progress: Option<UploadProgressFn>) -> reqwest::Body {
    let total = bytes.len() as u64;
    let counter = progress.map(|progress| ProgressCounter::new(progress, total));
    if let Some(counter) = counter.as_ref().filter(|_| total == 0) {
        counter.advance(0);
    }
    counted_body(Bytes::from(bytes), counter)
}

fn counted_body(data: Bytes, counter: Option<ProgressCounter>) -> reqwest::Body {
    let Some(counter) = counter.filter(|_| !data.is_empty()) else {
        return reqwest::Body::from(data);
    };

    let chunks: Vec<Bytes> = chunk_bytes(&data, UPLOAD_CHUNK_SIZE);
    let stream = futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
        counter.advance(chunk.len() as u64);
        Ok::<Bytes, std::io::Error>(chunk)
    }));
    reqwest::Body::wrap_stream(stream)
}

fn chunk_bytes(data: &Bytes, size: usize) -> Vec<Bytes> {
    (0..data.len())
        .step_by(size)
        .map(|start| data.slice(start..(start + size).min(data.len())))
        .collect()
}

fn map_send_error(error: reqwest::Error, request: &RequestEcho) -> TransportFailure {
    if error.is_builder() {
        return TransportFailure::Setup {
            request: Some(request.clone()),
            reason: error.to_string(),
        };
    }
    TransportFailure::NoResponse {
        request: request.clone(),
        reason: error.to_string(),
        timed_out: error.is_timeout(),
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    collected
}

/// JSON when the body parses as JSON, the raw text otherwise, null when empty
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
