//! Display policy for classified errors
//!
//! Decides which user-facing side effects a failure gets: a toast, the modal
//! error state, nothing at all, and for a 401 the forced logout. The error
//! itself is always returned to the caller; this module never swallows it.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ClassifiedError;
use crate::notify::{Notification, NotificationSink};
use crate::session::SessionAccessor;
use crate::telemetry::ErrorStore;

pub const SESSION_EXPIRED_TITLE: &str = "Sesi Berakhir";
pub const SESSION_EXPIRED_MESSAGE: &str = "Silakan login kembali untuk melanjutkan";
pub const ACCESS_DENIED_TITLE: &str = "Akses Ditolak";
pub const ACCESS_DENIED_MESSAGE: &str = "Anda tidak memiliki izin untuk melakukan aksi ini";
pub const CONNECTION_PROBLEM_TITLE: &str = "Koneksi Bermasalah";
pub const SERVER_PROBLEM_TITLE: &str = "Server Bermasalah";
pub const SERVER_PROBLEM_MESSAGE: &str = "Mohon coba lagi dalam beberapa saat";
pub const GENERIC_ERROR_TITLE: &str = "Terjadi Kesalahan";

const ERROR_DURATION: Duration = Duration::from_millis(4000);
const NETWORK_ERROR_DURATION: Duration = Duration::from_millis(5000);

/// How generic failures are shown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorDisplayMode {
    #[default]
    Toast,
    Modal,
    Silent,
}

impl ErrorDisplayMode {
    /// Parse a mode name, falling back to `Toast` for anything unknown
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::debug!(mode = value, "unknown error display mode, using toast");
            ErrorDisplayMode::Toast
        })
    }
}

impl FromStr for ErrorDisplayMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "toast" => Ok(ErrorDisplayMode::Toast),
            "modal" => Ok(ErrorDisplayMode::Modal),
            "silent" => Ok(ErrorDisplayMode::Silent),
            other => Err(format!("unknown error display mode '{}'", other)),
        }
    }
}

/// Side effect taken for one failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// Side effects were switched off for this call
    Suppressed,
    /// Session-expired toast plus scheduled logout
    SessionExpired,
    AccessDenied,
    ConnectionProblem,
    ServerProblem,
    Toast,
    Modal,
    Silent,
}

/// Per-call error policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    pub handle_error_status: bool,
    pub display_mode: ErrorDisplayMode,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            handle_error_status: true,
            display_mode: ErrorDisplayMode::Toast,
        }
    }
}

/// What the policy needs to act on
pub struct PolicyTargets<'a> {
    pub notifier: &'a dyn NotificationSink,
    pub session: &'a Arc<dyn SessionAccessor>,
    pub store: &'a ErrorStore,
    pub logout_delay: Duration,
}

impl ErrorPolicy {
    /// Run the side effects for `error`
    pub fn apply(&self, error: &ClassifiedError, targets: &PolicyTargets<'_>) -> PolicyAction {
        if !self.handle_error_status {
            return PolicyAction::Suppressed;
        }

        match error.status_code() {
            Some(401) => {
                targets.notifier.show(Notification::error(
                    SESSION_EXPIRED_TITLE,
                    SESSION_EXPIRED_MESSAGE,
                    ERROR_DURATION,
                ));
                schedule_logout(Arc::clone(targets.session), targets.logout_delay);
                return PolicyAction::SessionExpired;
            }
            Some(403) => {
                targets.notifier.show(Notification::error(
                    ACCESS_DENIED_TITLE,
                    ACCESS_DENIED_MESSAGE,
                    ERROR_DURATION,
                ));
                return PolicyAction::AccessDenied;
            }
            _ => {}
        }

        if error.is_network_error() {
            targets.notifier.show(Notification::error(
                CONNECTION_PROBLEM_TITLE,
                error.message(),
                NETWORK_ERROR_DURATION,
            ));
            return PolicyAction::ConnectionProblem;
        }

        if error.is_server_error() {
            targets.notifier.show(Notification::error(
                SERVER_PROBLEM_TITLE,
                SERVER_PROBLEM_MESSAGE,
                ERROR_DURATION,
            ));
            return PolicyAction::ServerProblem;
        }

        match self.display_mode {
            ErrorDisplayMode::Toast => {
                targets.notifier.show(Notification::error(
                    GENERIC_ERROR_TITLE,
                    error.message(),
                    ERROR_DURATION,
                ));
                PolicyAction::Toast
            }
            ErrorDisplayMode::Modal => {
                targets.store.set_modal_error(error.message());
                PolicyAction::Modal
            }
            ErrorDisplayMode::Silent => PolicyAction::Silent,
        }
    }
}

/// End the session after `delay` without blocking the caller
///
/// Outside a tokio runtime the session ends immediately.
pub fn schedule_logout(session: Arc<dyn SessionAccessor>, delay: Duration) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                tokio::time::sleep(delay).await;
                tracing::info!("forcing logout after authentication failure");
                session.logout();
            });
        }
        Err(_) => {
            tracing::info!("forcing logout after authentication failure");
            session.logout();
        }
    }
}
