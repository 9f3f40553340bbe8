//! Configuration management for the CLI
//!
//! This module handles loading and merging configuration from:
//! - Default values
//! - Configuration files (YAML/JSON/TOML)
//! - Environment variables
//! - Command-line arguments
//!
//! It also keeps the stored session token between invocations.

use crate::error::{Error, Result};
use kos_http::{ClientConfig, MemorySession, SessionAccessor};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API settings
    pub api: ApiConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Fallback bearer token, used when no session is stored
    pub token: Option<String>,
}

/// API settings; unset values keep the library defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub platform: Option<String>,
    pub app_version: Option<String>,
    pub timeout_ms: Option<u64>,
    pub debug: bool,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Use colored output by default
    pub color: bool,

    /// Show upload progress bars
    pub progress: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: true,
            progress: true,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        for path in Self::default_config_paths() {
            if path.exists() {
                match Self::from_file(&path) {
                    Ok(config) => {
                        tracing::debug!(path = %path.display(), "loaded configuration");
                        return Ok(config);
                    }
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "ignoring configuration file"),
                }
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file or default locations
    pub fn load_with_file(file: Option<&Path>) -> Result<Self> {
        match file {
            Some(path) => Self::from_file(path),
            None => Self::load(),
        }
    }

    /// Get default configuration file paths to check
    fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from(".kos.yaml"),
            PathBuf::from(".kos.toml"),
            PathBuf::from(".kos.json"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("kos").join("config.yaml"));
        }

        paths
    }

    /// Library configuration: file values, then `KOS_*` variables
    pub fn client_config<F>(&self, lookup: F) -> Result<ClientConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut client = ClientConfig::default().with_debug(self.api.debug);
        if let Some(url) = &self.api.base_url {
            client = client.with_base_url(url);
        }
        if let Some(platform) = &self.api.platform {
            client = client.with_platform(platform.to_lowercase());
        }
        if let Some(version) = &self.api.app_version {
            client = client.with_app_version(version);
        }
        if let Some(millis) = self.api.timeout_ms {
            if millis == 0 {
                return Err(Error::config("api.timeout_ms cannot be zero"));
            }
            client = client.with_timeout(Duration::from_millis(millis));
        }

        client.apply_env(lookup)?;
        Ok(client)
    }
}

/// Session token persisted between invocations
///
/// Logging out, locally or forced by a 401, removes the file.
#[derive(Debug)]
pub struct StoredSession {
    memory: Arc<MemorySession>,
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    token: Option<String>,
}

impl StoredSession {
    /// Session file in the user config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kos").join("session.json"))
    }

    /// Open the session at `path`, or an in-memory one when `path` is `None`
    pub fn open(path: Option<PathBuf>) -> Result<Self> {
        let memory = Arc::new(MemorySession::new());
        if let Some(file) = path.as_deref().filter(|p| p.exists()) {
            let stored: SessionFile = serde_json::from_str(&std::fs::read_to_string(file)?)?;
            memory.set_token(stored.token);
        }
        Ok(Self { memory, path })
    }

    /// Shared in-memory state
    pub fn memory(&self) -> &Arc<MemorySession> {
        &self.memory
    }

    /// Use `token` for this invocation without storing it
    pub fn override_token(&self, token: Option<String>) {
        if token.is_some() {
            self.memory.set_token(token);
        }
    }

    /// Write the current token to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = SessionFile {
            token: self.memory.token(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

impl SessionAccessor for StoredSession {
    fn token(&self) -> Option<String> {
        self.memory.token()
    }

    fn logout(&self) {
        self.memory.logout();
        if let Some(path) = &self.path {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove stored session");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kos.yaml");
        std::fs::write(
            &path,
            "api:\n  base_url: https://staging.kos.example.com/api\n  platform: iOS\n  timeout_ms: 5000\ntoken: abc\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert!(config.output.progress);

        let client = config.client_config(|_| None).unwrap();
        assert_eq!(client.base_url, "https://staging.kos.example.com/api");
        assert_eq!(client.platform_tag, "ios");
        assert_eq!(client.default_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_toml_config_file_and_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kos.toml");
        std::fs::write(&path, "[api]\nbase_url = \"https://file.example.com/api\"\ndebug = true\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        let client = config
            .client_config(|key| (key == "KOS_BASE_URL").then(|| "https://env.example.com/api".to_string()))
            .unwrap();
        assert_eq!(client.base_url, "https://env.example.com/api");
        assert!(client.debug_enabled);
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::from_file(Path::new("/nonexistent/kos.yaml"));
        assert!(matches!(result, Err(Error::FileNotFound { .. })));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = Config::default();
        config.api.timeout_ms = Some(0);
        assert!(matches!(config.client_config(|_| None), Err(Error::Config(_))));
    }

    #[test]
    fn test_stored_session_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kos").join("session.json");

        let session = StoredSession::open(Some(path.clone())).unwrap();
        assert_eq!(session.token(), None);
        session.memory().set_token(Some("stored-token".into()));
        session.save().unwrap();

        let reopened = StoredSession::open(Some(path.clone())).unwrap();
        assert_eq!(reopened.token().as_deref(), Some("stored-token"));

        reopened.logout();
        assert!(!path.exists());
        assert_eq!(reopened.token(), None);
        reopened.logout();
    }
}
