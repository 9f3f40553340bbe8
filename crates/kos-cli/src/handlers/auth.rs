//! Login, profile and logout command handlers

use crate::cli::LoginArgs;
use crate::config::StoredSession;
use crate::error::{Error, Result};
use crate::logging::timing::Timer;
use crate::output::OutputWriter;
use kos_http::api::auth::{login_failure_message, AuthApi};
use kos_http::{SessionAccessor, SessionContext};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

#[derive(Debug, Serialize)]
struct LoginSummary {
    logged_in: bool,
    has_profile: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ProfileSummary {
    has_profile: bool,
}

/// Handle the login command
#[instrument(skip_all, fields(email = %args.email))]
pub async fn handle_login(
    args: LoginArgs,
    context: &SessionContext,
    session: &StoredSession,
    output: &mut OutputWriter,
) -> Result<()> {
    let _timer = Timer::with_details("login", &args.email);
    let auth = AuthApi::new(context.http(), session.memory().clone());

    let outcome = match auth.login(&args.email, &args.password).await {
        Ok(outcome) => outcome,
        Err(error) => {
            let message = login_failure_message(&error);
            warn!(error = %error, "login failed");
            return Err(match error {
                kos_http::Error::Http(source) => Error::Login { message, source },
                other => Error::Library(other),
            });
        }
    };

    session.save()?;
    info!(has_profile = outcome.has_profile, "session stored");

    if !outcome.has_profile {
        output.info("Profil belum dibuat");
    }
    output.data(&LoginSummary {
        logged_in: true,
        has_profile: outcome.has_profile,
        user: outcome.user,
    })
}

/// Handle the profile command
pub async fn handle_profile(context: &SessionContext, session: &StoredSession, output: &mut OutputWriter) -> Result<()> {
    if session.token().is_none() {
        return Err(Error::invalid_args("not logged in; run `kos login` first"));
    }
    let auth = AuthApi::new(context.http(), session.memory().clone());
    let has_profile = auth.check_profile().await;
    output.data(&ProfileSummary { has_profile })
}

/// Handle the logout command
pub fn handle_logout(session: &StoredSession, output: &mut OutputWriter) -> Result<()> {
    let was_logged_in = session.token().is_some();
    session.logout();
    if was_logged_in {
        output.info("Logged out");
    }
    Ok(())
}
