//! In-memory error telemetry
//!
//! Every classified failure is recorded here with the context it happened
//! in, and logged through `tracing`. The store is bounded; the oldest
//! records are dropped first. It also holds the modal error state read by
//! whatever renders the error modal.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::http::{ClassifiedError, ErrorKind, RequestEcho};
use crate::Severity;

/// Number of records kept by [`ErrorStore::default`]
pub const DEFAULT_CAPACITY: usize = 50;

/// Where and on what a failure happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Pipeline phase (`request_interceptor`, `response_interceptor`, `encode_multipart`, ...)
    pub phase: String,
    pub endpoint: Option<String>,
    pub method: Option<String>,
    pub status_code: Option<u16>,
    pub request_body: Option<Value>,
    #[serde(default)]
    pub request_params: BTreeMap<String, String>,
    pub response_body: Option<Value>,
    pub platform: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl ErrorContext {
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            endpoint: None,
            method: None,
            status_code: None,
            request_body: None,
            request_params: BTreeMap::new(),
            response_body: None,
            platform: None,
            timestamp: Utc::now(),
            extra: BTreeMap::new(),
        }
    }

    /// Context filled from a request snapshot
    pub fn for_request(phase: impl Into<String>, request: &RequestEcho) -> Self {
        let mut context = Self::new(phase);
        context.endpoint = Some(request.url.clone());
        context.method = Some(request.method.clone());
        context.request_body = request.body.clone();
        context.request_params = request.params.clone();
        context
    }

    pub fn with_platform(mut self, platform: &str) -> Self {
        self.platform = Some(platform.to_string());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// One recorded failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: Uuid,
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,
    pub context: ErrorContext,
    pub recorded_at: DateTime<Utc>,
}

/// State read by a modal error consumer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorState {
    pub is_error: bool,
    pub message: String,
}

/// Bounded store of recent failures plus the modal error state
#[derive(Debug)]
pub struct ErrorStore {
    capacity: usize,
    records: Mutex<VecDeque<ErrorRecord>>,
    modal: Mutex<ErrorState>,
}

impl Default for ErrorStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ErrorStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            modal: Mutex::new(ErrorState::default()),
        }
    }

    /// Record a failure and log it
    pub fn record(
        &self,
        kind: ErrorKind,
        severity: Severity,
        message: impl Into<String>,
        context: ErrorContext,
    ) -> ErrorRecord {
        let record = ErrorRecord {
            id: Uuid::new_v4(),
            kind,
            severity,
            message: message.into(),
            context,
            recorded_at: Utc::now(),
        };

        match record.severity {
            Severity::Low | Severity::Medium => tracing::warn!(
                id = %record.id,
                kind = %record.kind,
                severity = %record.severity,
                phase = %record.context.phase,
                endpoint = ?record.context.endpoint,
                status = ?record.context.status_code,
                "{}",
                record.message
            ),
            Severity::High | Severity::Critical => tracing::error!(
                id = %record.id,
                kind = %record.kind,
                severity = %record.severity,
                phase = %record.context.phase,
                endpoint = ?record.context.endpoint,
                status = ?record.context.status_code,
                "{}",
                record.message
            ),
        }

        let mut records = lock(&self.records);
        if records.len() == self.capacity {
            records.pop_back();
        }
        records.push_front(record.clone());
        record
    }

    /// Record a classified failure with its own kind and severity
    pub fn record_classified(&self, error: &ClassifiedError, mut context: ErrorContext) -> ErrorRecord {
        if context.status_code.is_none() {
            context.status_code = error.status_code();
        }
        if context.response_body.is_none() {
            context.response_body = error.response_body().cloned();
        }
        self.record(error.kind(), error.severity(), error.message(), context)
    }

    /// Records, newest first
    pub fn records(&self) -> Vec<ErrorRecord> {
        lock(&self.records).iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<ErrorRecord> {
        lock(&self.records).front().cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.records).clear();
    }

    /// Raise the modal error with a message
    pub fn set_modal_error(&self, message: impl Into<String>) {
        *lock(&self.modal) = ErrorState {
            is_error: true,
            message: message.into(),
        };
    }

    pub fn modal_error(&self) -> ErrorState {
        lock(&self.modal).clone()
    }

    pub fn clear_modal_error(&self) {
        *lock(&self.modal) = ErrorState::default();
    }
}

// A poisoned lock only means another thread panicked mid-push; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
