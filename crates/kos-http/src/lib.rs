//! kos-http - HTTP request/response pipeline for the kos rental API
//!
//! This crate provides the network core of the kos client: five verb
//! operations sharing one policy surface, with authentication, platform
//! metadata, multipart encoding, debug tracing and a centralized error
//! taxonomy feeding user-facing notifications and forced logout.
//!
//! # Main Components
//!
//! - **Verb Operations**: [`HttpClient`] with GET/POST/PUT/PATCH/DELETE over [`RequestSpec`]
//! - **Error Classifier**: [`ClassifiedError`] and the display policy
//! - **Request Encoder**: multipart payloads from `{key, value}` field lists
//! - **Session Context**: configuration, session, notifications, telemetry and transport
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kos_http::{ClientConfig, MemorySession, RequestSpec, SessionContext};
//!
//! async fn example() -> kos_http::Result<()> {
//!     let session = Arc::new(MemorySession::with_token("token"));
//!     let context = SessionContext::new(ClientConfig::from_env()?, session)?;
//!     let response = context
//!         .http()
//!         .get(RequestSpec::new("/kos").with_param("page", 1).with_param("limit", 10))
//!         .await?;
//!     println!("{}", response.body);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod notify;
pub mod pagination;
pub mod session;
pub mod telemetry;

// Re-export main types for convenience
pub use config::ClientConfig;
pub use context::SessionContext;
pub use error::{Error, Result, Severity};
pub use http::{
    BodyEncoding, ClassifiedError, ErrorDisplayMode, ErrorKind, FileRef, HttpClient,
    MultipartField, NormalizedResponse, RequestBody, RequestSpec, Transport,
};
pub use notify::{Notification, NotificationKind, NotificationSink, RecordingNotifier, TracingNotifier};
pub use pagination::{Page, Pagination};
pub use session::{MemorySession, SessionAccessor};
pub use telemetry::{ErrorStore, ErrorState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
