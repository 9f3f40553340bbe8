//! Session context
//!
//! Everything a verb call reads besides its own arguments: configuration,
//! session, notification sink, error store and transport. The context is
//! passed explicitly and cloning it is cheap.

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::http::{HttpClient, ReqwestTransport, Transport};
use crate::notify::{NotificationSink, TracingNotifier};
use crate::session::SessionAccessor;
use crate::telemetry::ErrorStore;
use crate::Result;

#[derive(Clone)]
pub struct SessionContext {
    config: Arc<ClientConfig>,
    session: Arc<dyn SessionAccessor>,
    notifier: Arc<dyn NotificationSink>,
    errors: Arc<ErrorStore>,
    transport: Arc<dyn Transport>,
}

impl SessionContext {
    /// Context using the reqwest transport and logging notifications
    pub fn new(config: ClientConfig, session: Arc<dyn SessionAccessor>) -> Result<Self> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::with_transport(config, session, Arc::new(transport)))
    }

    /// Context using a custom transport
    pub fn with_transport(
        config: ClientConfig,
        session: Arc<dyn SessionAccessor>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            session,
            notifier: Arc::new(TracingNotifier),
            errors: Arc::new(ErrorStore::default()),
            transport,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_error_store(mut self, errors: Arc<ErrorStore>) -> Self {
        self.errors = errors;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<dyn SessionAccessor> {
        &self.session
    }

    pub fn notifier(&self) -> &Arc<dyn NotificationSink> {
        &self.notifier
    }

    pub fn errors(&self) -> &Arc<ErrorStore> {
        &self.errors
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Verb operations bound to this context
    pub fn http(&self) -> HttpClient {
        HttpClient::new(self.clone())
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("config", &self.config)
            .field("logged_in", &self.session.token().is_some())
            .field("recorded_errors", &self.errors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;

    #[test]
    fn test_new_context_uses_config() {
        let ctx = SessionContext::new(
            ClientConfig::default().with_base_url("https://kos.example.com/api"),
            Arc::new(MemorySession::new()),
        )
        .unwrap();
        assert_eq!(ctx.config().base_url, "https://kos.example.com/api");
        assert!(ctx.errors().is_empty());
        assert!(format!("{:?}", ctx).contains("logged_in: false"));
    }

    #[test]
    fn test_contexts_share_stores_when_cloned() {
        let ctx = SessionContext::new(ClientConfig::default(), Arc::new(MemorySession::new())).unwrap();
        let other = ctx.clone();
        ctx.errors().set_modal_error("gagal");
        assert!(other.errors().modal_error().is_error);
    }
}
