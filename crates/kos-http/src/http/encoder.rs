//! Multipart request encoding
//!
//! [`RequestEncoder`] turns a list of `{key, value}` fields into a
//! [`MultipartPayload`]. File references become file parts, everything else
//! becomes a text part. A field that cannot be encoded is skipped and
//! recorded as a low-severity encoding error; the rest of the payload is
//! still built.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ClassifiedError;
use crate::config::ClientConfig;
use crate::telemetry::{ErrorContext, ErrorStore};

/// MIME type used when a file reference does not name one
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

const FILE_SCHEME: &str = "file://";

/// One `{key, value}` item of a multipart field list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipartField {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl MultipartField {
    /// Field with a scalar, object, array or null value
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Field carrying a file reference
    pub fn file(key: impl Into<String>, file: FileRef) -> Self {
        Self {
            key: key.into(),
            value: file.into_value(),
        }
    }
}

/// Reference to a local file to upload
///
/// Any object value with a `uri` member is treated as a file reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl FileRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// JSON form of the reference, as it appears in a field list
    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Recognize a file reference inside a field value
    ///
    /// `None` when the value is not a file reference at all; `Some(Err)` when
    /// it looks like one but cannot be used.
    fn detect(value: &Value) -> Option<std::result::Result<FileRef, String>> {
        let uri = value.as_object()?.get("uri")?;
        if uri.is_null() {
            return None;
        }
        let parsed = match uri.as_str() {
            Some(text) if !text.trim().is_empty() => {
                serde_json::from_value::<FileRef>(value.clone()).map_err(|e| e.to_string())
            }
            Some(_) => Err("file reference has an empty uri".to_string()),
            None => Err(format!("file reference uri must be a string, got {}", json_type(uri))),
        };
        Some(parsed)
    }
}

/// A file part ready to be sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePart {
    pub uri: String,
    pub file_name: String,
    pub mime_type: String,
}

impl FilePart {
    /// Local filesystem path behind the URI
    pub fn path(&self) -> &str {
        self.uri.strip_prefix(FILE_SCHEME).unwrap_or(&self.uri)
    }
}

/// One part of a multipart payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    Text { name: String, value: String },
    File { name: String, file: FilePart },
}

impl Part {
    pub fn name(&self) -> &str {
        match self {
            Part::Text { name, .. } | Part::File { name, .. } => name,
        }
    }
}

/// An ordered multipart form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultipartPayload {
    parts: Vec<Part>,
}

impl MultipartPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn push_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.push(Part::Text {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn push_file(&mut self, name: impl Into<String>, file: FilePart) {
        self.parts.push(Part::File {
            name: name.into(),
            file,
        });
    }

    /// Value of the first text part with this name
    pub fn text(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            Part::Text { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// JSON summary used in traces: text values and file descriptors, no file contents
    pub fn describe(&self) -> Value {
        Value::Array(
            self.parts
                .iter()
                .map(|part| match part {
                    Part::Text { name, value } => serde_json::json!({ "name": name, "value": value }),
                    Part::File { name, file } => serde_json::json!({
                        "name": name,
                        "fileName": file.file_name,
                        "type": file.mime_type,
                        "uri": file.uri,
                    }),
                })
                .collect(),
        )
    }

    /// Size of the text parts plus file names
    pub fn text_size(&self) -> usize {
        self.parts
            .iter()
            .map(|part| match part {
                Part::Text { name, value } => name.len() + value.len(),
                Part::File { name, file } => name.len() + file.file_name.len(),
            })
            .sum()
    }
}

/// Builds multipart payloads from field lists
#[derive(Debug, Clone)]
pub struct RequestEncoder {
    platform_tag: String,
    keep_file_scheme: bool,
    store: Option<Arc<ErrorStore>>,
}

impl RequestEncoder {
    /// Encoder for the platform named in `config`
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            platform_tag: config.platform_tag.clone(),
            keep_file_scheme: config.is_android(),
            store: None,
        }
    }

    /// Record per-field failures in this store
    pub fn with_error_store(mut self, store: Arc<ErrorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Encode an arbitrary JSON value
    ///
    /// Anything other than an array of `{key, value}` objects yields an empty
    /// payload and a warning.
    pub fn encode_value(&self, items: &Value) -> MultipartPayload {
        let Some(items) = items.as_array() else {
            tracing::warn!(
                received = json_type(items),
                "multipart encoder expects an array of fields"
            );
            return MultipartPayload::new();
        };

        let fields: Vec<MultipartField> = items
            .iter()
            .map(|item| MultipartField {
                key: item
                    .get("key")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                value: item.get("value").cloned().unwrap_or(Value::Null),
            })
            .collect();
        self.encode_fields(&fields)
    }

    /// Encode a field list
    pub fn encode_fields(&self, fields: &[MultipartField]) -> MultipartPayload {
        let mut payload = MultipartPayload::new();

        for (index, field) in fields.iter().enumerate() {
            if field.key.trim().is_empty() {
                tracing::warn!(index, "skipping multipart field without a key");
                continue;
            }

            if let Err(reason) = self.encode_field(&mut payload, field, index) {
                tracing::error!(key = %field.key, index, reason = %reason, "failed to encode multipart field");
                if let Some(store) = &self.store {
                    let error = ClassifiedError::encoding(format!(
                        "Failed to encode field '{}': {}",
                        field.key, reason
                    ));
                    store.record_classified(
                        &error,
                        ErrorContext::new("encode_multipart")
                            .with_platform(&self.platform_tag)
                            .with_extra("key", Value::String(field.key.clone()))
                            .with_extra("value_type", Value::String(json_type(&field.value).into())),
                    );
                }
            }
        }

        payload
    }

    fn encode_field(
        &self,
        payload: &mut MultipartPayload,
        field: &MultipartField,
        index: usize,
    ) -> std::result::Result<(), String> {
        if let Some(file) = FileRef::detect(&field.value) {
            let file = file?;
            let file_name = file
                .file_name
                .or(file.name)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| {
                    format!("file_{}_{}", chrono::Utc::now().timestamp_millis(), index)
                });
            let mime_type = file
                .mime_type
                .or(file.kind)
                .filter(|mime| !mime.is_empty())
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
            payload.push_file(
                &field.key,
                FilePart {
                    uri: self.normalize_uri(&file.uri),
                    file_name,
                    mime_type,
                },
            );
            return Ok(());
        }

        match &field.value {
            Value::Null => payload.push_text(&field.key, ""),
            Value::Object(_) => payload.push_text(&field.key, field.value.to_string()),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    payload.push_text(format!("{}[{}]", field.key, i), scalar_text(item));
                }
            }
            other => payload.push_text(&field.key, scalar_text(other)),
        }
        Ok(())
    }

    /// Strip `file://` from local URIs except on Android
    pub fn normalize_uri(&self, uri: &str) -> String {
        if self.keep_file_scheme {
            uri.to_string()
        } else {
            uri.strip_prefix(FILE_SCHEME).unwrap_or(uri).to_string()
        }
    }
}

/// Text form of a value: strings as-is, everything else as JSON
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
