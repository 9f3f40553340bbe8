//! Session access
//!
//! The pipeline reads the current bearer token through [`SessionAccessor`]
//! and ends the session through it on a 401. [`MemorySession`] is the
//! in-process implementation; it also keeps the user profile and the
//! has-profile flag the login flow maintains.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Read access to the current session plus a way to end it
pub trait SessionAccessor: Send + Sync {
    /// Current bearer token, if logged in
    fn token(&self) -> Option<String>;

    /// End the session; calling it when already logged out is a no-op
    fn logout(&self);
}

/// Snapshot of a [`MemorySession`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub token: Option<String>,
    pub user: Option<Value>,
    pub has_profile: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            token: None,
            user: None,
            // Unknown until checked; assume a profile so nothing redirects early.
            has_profile: true,
        }
    }
}

/// Session state held in memory
#[derive(Debug, Default)]
pub struct MemorySession {
    state: RwLock<SessionState>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session already holding a token
    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.set_token(Some(token.into()));
        session
    }

    /// Replace the token; an empty token clears it
    pub fn set_token(&self, token: Option<String>) {
        self.write().token = token.filter(|t| !t.trim().is_empty());
    }

    pub fn set_profile(&self, user: Option<Value>) {
        self.write().user = user;
    }

    pub fn set_has_profile(&self, has_profile: bool) {
        self.write().has_profile = has_profile;
    }

    pub fn profile(&self) -> Option<Value> {
        self.read().user.clone()
    }

    pub fn has_profile(&self) -> bool {
        self.read().has_profile
    }

    pub fn is_logged_in(&self) -> bool {
        self.read().token.is_some()
    }

    pub fn snapshot(&self) -> SessionState {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionAccessor for MemorySession {
    fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    fn logout(&self) {
        let mut state = self.write();
        if state.token.is_some() {
            tracing::info!("session cleared");
        }
        *state = SessionState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_session_defaults() {
        let session = MemorySession::new();
        assert_eq!(session.token(), None);
        assert!(session.has_profile());
        assert!(!session.is_logged_in());
    }

    #[test]
    fn test_empty_token_clears() {
        let session = MemorySession::with_token("abc");
        assert_eq!(session.token().as_deref(), Some("abc"));
        session.set_token(Some("   ".into()));
        assert_eq!(session.token(), None);
    }

    #[test]
    fn test_logout_resets_everything() {
        let session = MemorySession::with_token("abc");
        session.set_profile(Some(json!({"id": 7, "name": "Rina"})));
        session.set_has_profile(false);

        session.logout();
        assert_eq!(session.snapshot(), SessionState::default());
    }

    #[test]
    fn test_logout_is_idempotent() {
        let session = MemorySession::with_token("abc");
        session.logout();
        let after_first = session.snapshot();
        session.logout();
        assert_eq!(session.snapshot(), after_first);
        assert_eq!(session.token(), None);
    }
}
