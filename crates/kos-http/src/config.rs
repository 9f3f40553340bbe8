//! Ambient client configuration
//!
//! The configuration source every request reads from: base URL, debug flag,
//! platform metadata and the default timeout. Values come from defaults,
//! then a `.env` file, then `KOS_*` environment variables.

use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};

/// Base URL used when neither the call nor the configuration supplies one
pub const DEFAULT_BASE_URL: &str = "https://kos.zemcode.my.id/api";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Delay between a 401 response and the forced logout
pub const DEFAULT_LOGOUT_DELAY: Duration = Duration::from_millis(1_000);

/// Default app version stamped into `X-App-Version`
pub const DEFAULT_APP_VERSION: &str = "1.0.0";

/// Configuration shared by every request issued through a session context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API base URL; empty means "use the built-in default"
    pub base_url: String,
    /// Default value of the per-call debug flag
    pub debug_enabled: bool,
    /// Value of the `X-Platform` header (`android`, `ios`, `linux`, ...)
    pub platform_tag: String,
    /// Value of the `X-App-Version` header
    pub app_version: String,
    /// Timeout applied when a call does not override it
    #[serde(with = "duration_millis")]
    pub default_timeout: Duration,
    /// Delay before a 401 forces the session to end
    #[serde(with = "duration_millis")]
    pub logout_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            debug_enabled: false,
            platform_tag: std::env::consts::OS.to_string(),
            app_version: DEFAULT_APP_VERSION.to_string(),
            default_timeout: DEFAULT_TIMEOUT,
            logout_delay: DEFAULT_LOGOUT_DELAY,
        }
    }
}

impl ClientConfig {
    /// Build a configuration from defaults, `.env` and `KOS_*` variables
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    ///
    /// Split from [`from_env`](Self::from_env) so tests can feed values
    /// without touching the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("KOS_BASE_URL") {
            if !url.trim().is_empty() {
                self.base_url = url.trim().to_string();
            }
        }

        if let Some(debug) = lookup("KOS_DEBUG") {
            self.debug_enabled = parse_flag(&debug);
        }

        if let Some(platform) = lookup("KOS_PLATFORM") {
            if !platform.trim().is_empty() {
                self.platform_tag = platform.trim().to_lowercase();
            }
        }

        if let Some(version) = lookup("KOS_APP_VERSION") {
            if !version.trim().is_empty() {
                self.app_version = version.trim().to_string();
            }
        }

        if let Some(timeout) = lookup("KOS_TIMEOUT_MS") {
            let millis = timeout.trim().parse::<u64>().map_err(|e| Error::Configuration {
                message: format!("KOS_TIMEOUT_MS must be a whole number of milliseconds, got '{}'", timeout),
                source: Some(anyhow::anyhow!(e)),
            })?;
            if millis == 0 {
                return Err(Error::configuration("KOS_TIMEOUT_MS cannot be zero"));
            }
            self.default_timeout = Duration::from_millis(millis);
        }

        Ok(())
    }

    /// Set the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the default debug flag
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug_enabled = enabled;
        self
    }

    /// Set the platform tag
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform_tag = platform.into();
        self
    }

    /// Set the app version
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    /// Set the default timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the delay before a forced logout
    pub fn with_logout_delay(mut self, delay: Duration) -> Self {
        self.logout_delay = delay;
        self
    }

    /// Resolve the base URL for one call
    ///
    /// Order: non-empty override, configured base URL, built-in default.
    pub fn resolve_base_url(&self, override_url: Option<&str>) -> String {
        override_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .or_else(|| Some(self.base_url.trim()).filter(|url| !url.is_empty()))
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string()
    }

    /// Whether file URIs keep their `file://` prefix on this platform
    pub fn is_android(&self) -> bool {
        self.platform_tag.eq_ignore_ascii_case("android")
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.default_timeout, Duration::from_millis(30_000));
        assert_eq!(config.logout_delay, Duration::from_millis(1_000));
        assert_eq!(config.app_version, "1.0.0");
        assert!(!config.debug_enabled);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ClientConfig::default();
        config
            .apply_env(lookup(&[
                ("KOS_BASE_URL", "https://staging.example.com/api "),
                ("KOS_DEBUG", "true"),
                ("KOS_PLATFORM", "Android"),
                ("KOS_APP_VERSION", "2.4.1"),
                ("KOS_TIMEOUT_MS", "5000"),
            ]))
            .unwrap();

        assert_eq!(config.base_url, "https://staging.example.com/api");
        assert!(config.debug_enabled);
        assert_eq!(config.platform_tag, "android");
        assert!(config.is_android());
        assert_eq!(config.app_version, "2.4.1");
        assert_eq!(config.default_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        let mut config = ClientConfig::default();
        let err = config
            .apply_env(lookup(&[("KOS_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("KOS_TIMEOUT_MS"));

        let err = config
            .apply_env(lookup(&[("KOS_TIMEOUT_MS", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("zero"));
    }

    #[test]
    fn test_base_url_resolution_order() {
        let config = ClientConfig::default().with_base_url("https://configured.example.com");
        assert_eq!(
            config.resolve_base_url(Some("https://override.example.com")),
            "https://override.example.com"
        );
        assert_eq!(config.resolve_base_url(Some("  ")), "https://configured.example.com");
        assert_eq!(config.resolve_base_url(None), "https://configured.example.com");

        let empty = ClientConfig::default().with_base_url("");
        assert_eq!(empty.resolve_base_url(None), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_config_serde_uses_millis() {
        let config = ClientConfig::default().with_timeout(Duration::from_millis(1500));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["default_timeout"], 1500);

        let back: ClientConfig = serde_json::from_value(serde_json::json!({
            "base_url": "https://x.example.com",
            "default_timeout": 2500
        }))
        .unwrap();
        assert_eq!(back.default_timeout, Duration::from_millis(2500));
        assert_eq!(back.app_version, DEFAULT_APP_VERSION);
    }
}
