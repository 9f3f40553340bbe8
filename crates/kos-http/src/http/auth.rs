//! Bearer authentication
//!
//! Tokens are always sent as `Authorization: Bearer <token>` with exactly one
//! prefix, whether or not the caller already added it.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use super::pipeline::RequestStage;
use super::types::TransportRequest;
use crate::session::SessionAccessor;

const BEARER_PREFIX: &str = "Bearer ";

/// Token without its `Bearer` prefix; a bare `Bearer` is an empty token
pub fn strip_bearer(token: &str) -> &str {
    let token = token.trim();
    if token.eq_ignore_ascii_case(BEARER_PREFIX.trim_end()) {
        return "";
    }
    match token.get(..BEARER_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(BEARER_PREFIX) => token[BEARER_PREFIX.len()..].trim_start(),
        _ => token,
    }
}

/// `Bearer <token>`, without doubling an existing prefix
///
/// `None` when nothing is left after the prefix.
pub fn normalize_bearer(token: &str) -> Option<String> {
    let bare = strip_bearer(token);
    (!bare.is_empty()).then(|| format!("{}{}", BEARER_PREFIX, bare))
}

/// Set `Authorization` from a token, replacing any existing value
///
/// A token that is empty once its prefix is stripped leaves the headers untouched.
pub fn apply_bearer(headers: &mut HeaderMap, token: &str) -> Result<(), String> {
    let Some(bearer) = normalize_bearer(token) else {
        return Ok(());
    };
    let value = HeaderValue::from_str(&bearer)
        .map_err(|_| "token contains characters not allowed in a header".to_string())?;
    headers.insert(AUTHORIZATION, value);
    Ok(())
}

/// Request stage injecting the session token
///
/// An `Authorization` header already on the request wins and is only
/// normalized; otherwise the session's current token is used.
pub struct BearerAuth {
    session: Arc<dyn SessionAccessor>,
}

impl BearerAuth {
    pub fn new(session: Arc<dyn SessionAccessor>) -> Self {
        Self { session }
    }
}

impl RequestStage for BearerAuth {
    fn name(&self) -> &'static str {
        "bearer_auth"
    }

    fn apply(&self, request: &mut TransportRequest) -> Result<(), String> {
        let existing = match request.headers.get(AUTHORIZATION) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| "Authorization header is not valid text".to_string())?
                    .to_string(),
            ),
            None => None,
        };
        let existing = existing.filter(|value| !strip_bearer(value).is_empty());

        match existing.or_else(|| self.session.token()) {
            Some(token) => apply_bearer(&mut request.headers, &token),
            None => {
                request.headers.remove(AUTHORIZATION);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;
    use proptest::prelude::*;
    use reqwest::Method;
    use std::time::Duration;

    fn request() -> TransportRequest {
        TransportRequest::new(Method::GET, "https://kos.example.com/api", "/profile", Duration::from_secs(30))
    }

    #[test]
    fn test_normalize_bearer() {
        assert_eq!(normalize_bearer("abc").as_deref(), Some("Bearer abc"));
        assert_eq!(normalize_bearer("Bearer abc").as_deref(), Some("Bearer abc"));
        assert_eq!(normalize_bearer("bearer abc").as_deref(), Some("Bearer abc"));
        assert_eq!(normalize_bearer("  abc  ").as_deref(), Some("Bearer abc"));
    }

    #[test]
    fn test_bare_bearer_is_an_empty_token() {
        assert_eq!(normalize_bearer("Bearer"), None);
        assert_eq!(normalize_bearer("bearer "), None);
        assert_eq!(normalize_bearer("  BEARER  "), None);
        assert_eq!(normalize_bearer("Bearerabc").as_deref(), Some("Bearer Bearerabc"));

        let mut headers = HeaderMap::new();
        apply_bearer(&mut headers, "Bearer ").unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_bare_bearer_session_token_sends_no_header() {
        // Tokens set directly on the session are not filtered for a bare prefix.
        let stage = BearerAuth::new(Arc::new(MemorySession::with_token("Bearer")));
        let mut req = request();
        stage.apply(&mut req).unwrap();
        assert!(req.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_bare_bearer_header_falls_back_to_session() {
        let stage = BearerAuth::new(Arc::new(MemorySession::with_token("sess-1")));
        let mut req = request();
        req.headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer"));
        stage.apply(&mut req).unwrap();
        assert_eq!(req.headers[AUTHORIZATION], "Bearer sess-1");
    }

    #[test]
    fn test_session_token_injected() {
        let stage = BearerAuth::new(Arc::new(MemorySession::with_token("sess-1")));
        let mut req = request();
        stage.apply(&mut req).unwrap();
        assert_eq!(req.headers[AUTHORIZATION], "Bearer sess-1");
    }

    #[test]
    fn test_existing_header_wins() {
        let stage = BearerAuth::new(Arc::new(MemorySession::with_token("sess-1")));
        let mut req = request();
        req.headers.insert(AUTHORIZATION, HeaderValue::from_static("explicit"));
        stage.apply(&mut req).unwrap();
        assert_eq!(req.headers[AUTHORIZATION], "Bearer explicit");
    }

    #[test]
    fn test_no_token_no_header() {
        let stage = BearerAuth::new(Arc::new(MemorySession::new()));
        let mut req = request();
        stage.apply(&mut req).unwrap();
        assert!(req.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        let mut headers = HeaderMap::new();
        assert!(apply_bearer(&mut headers, "bad\ntoken").is_err());
    }

    proptest! {
        #[test]
        fn prop_single_bearer_prefix(token in "[A-Za-z0-9._~+/=-]{1,64}", prefixed in any::<bool>()) {
            prop_assume!(!token.eq_ignore_ascii_case("bearer"));
            let input = if prefixed { format!("Bearer {}", token) } else { token.clone() };
            let normalized = normalize_bearer(&input).unwrap();
            prop_assert_eq!(&normalized, &format!("Bearer {}", token));
            prop_assert_eq!(normalized.matches("Bearer ").count(), 1);
        }
    }
}
