//! Login and profile check

use std::sync::Arc;

use serde_json::{json, Value};

use crate::http::{ClassifiedError, HttpClient, RequestSpec};
use crate::session::MemorySession;
use crate::{Error, Result};

/// Body `error` the profile endpoint returns before a profile exists
pub const PROFILE_MISSING_ERROR: &str = "Profil belum dibuat";

/// Message shown when a failed login carries no server text
pub const LOGIN_FAILED_MESSAGE: &str = "Email atau password salah";

/// Result of a successful login
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub user: Option<Value>,
    pub has_profile: bool,
}

/// Authentication endpoints writing into a [`MemorySession`]
#[derive(Debug, Clone)]
pub struct AuthApi {
    http: HttpClient,
    session: Arc<MemorySession>,
}

impl AuthApi {
    /// `session` should be the same session the context reads tokens from
    pub fn new(http: HttpClient, session: Arc<MemorySession>) -> Self {
        Self { http, session }
    }

    /// `POST /auth/login`, store token and user, then check the profile
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let response = self
            .http
            .post(
                RequestSpec::new("/auth/login")
                    .with_json(json!({ "email": email, "password": password }))
                    .with_success_notification(false)
                    .with_error_status_handling(false),
            )
            .await?;

        let data = response.body.get("data");
        let token = data
            .and_then(|d| d.get("access_token"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidRequest {
                message: "Token tidak ditemukan dalam response".to_string(),
                field: Some("data.access_token".to_string()),
            })?;
        let user = data
            .and_then(|d| d.get("user"))
            .filter(|u| !u.is_null())
            .cloned();

        self.session.set_token(Some(token.to_string()));
        if user.is_some() {
            self.session.set_profile(user.clone());
        }
        tracing::info!("logged in");

        let has_profile = self.check_profile().await;
        Ok(LoginOutcome { user, has_profile })
    }

    /// `GET /profile` and update the session's has-profile flag
    ///
    /// Only a 404 or the "profile missing" error count as no profile; any
    /// other failure keeps the user out of the profile-completion flow.
    pub async fn check_profile(&self) -> bool {
        let result = self
            .http
            .get(
                RequestSpec::new("/profile")
                    .with_success_notification(false)
                    .with_error_status_handling(false),
            )
            .await;

        let has_profile = match result {
            Ok(_) => true,
            Err(error) => !is_profile_missing(&error),
        };
        self.session.set_has_profile(has_profile);
        has_profile
    }
}

/// Whether a profile request failed because no profile exists yet
pub fn is_profile_missing(error: &ClassifiedError) -> bool {
    error.status_code() == Some(404)
        || error
            .response_body()
            .and_then(|body| body.get("error"))
            .and_then(Value::as_str)
            == Some(PROFILE_MISSING_ERROR)
}

/// Message to show for a failed login
pub fn login_failure_message(error: &Error) -> String {
    match error {
        Error::Http(classified) => classified
            .response_body()
            .and_then(|body| body.get("error"))
            .and_then(Value::as_str)
            .unwrap_or(LOGIN_FAILED_MESSAGE)
            .to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{FailedResponse, RequestEcho, TransportFailure};
    use std::collections::BTreeMap;

    fn failure(status: u16, body: Value) -> ClassifiedError {
        ClassifiedError::from_failure(&TransportFailure::Status {
            request: RequestEcho {
                method: "GET".into(),
                url: "https://kos.example.com/api/profile".into(),
                headers: BTreeMap::new(),
                params: BTreeMap::new(),
                body: None,
                timeout_ms: 30_000,
            },
            response: FailedResponse {
                status,
                headers: BTreeMap::new(),
                body,
            },
        })
    }

    #[test]
    fn test_profile_missing_detection() {
        assert!(is_profile_missing(&failure(404, Value::Null)));
        assert!(is_profile_missing(&failure(400, json!({"error": "Profil belum dibuat"}))));
        assert!(!is_profile_missing(&failure(500, Value::Null)));
        assert!(!is_profile_missing(&failure(401, json!({"error": "Unauthorized"}))));
    }

    #[test]
    fn test_login_failure_message() {
        let err: Error = failure(401, json!({"error": "Password salah"})).into();
        assert_eq!(login_failure_message(&err), "Password salah");

        let err: Error = failure(500, Value::Null).into();
        assert_eq!(login_failure_message(&err), LOGIN_FAILED_MESSAGE);
    }
}
