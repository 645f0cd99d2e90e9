//! Configuration types.
//!
//! # Configuration
//!
//! ```toml
//! [server]
//! url = "https://recipes.example.com/api"
//! timeout_secs = 30
//!
//! [session]
//! token_file = "~/.config/larder/session.json"
//! ```
//!
//! # Environment Variables
//!
//! - `LARDER_SERVER_URL` - Override `server.url`
//! - `LARDER_TOKEN_FILE` - Override `session.token_file`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Server URL used when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080/api";

/// Request timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Session file name inside the config directory.
pub const DEFAULT_TOKEN_FILE: &str = "session.json";

/// Environment variable overriding the server URL.
pub const SERVER_URL_ENV: &str = "LARDER_SERVER_URL";

/// Environment variable overriding the session file location.
pub const TOKEN_FILE_ENV: &str = "LARDER_TOKEN_FILE";

// ─────────────────────────────────────────────────────────────────────────────
// Root
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LarderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,
}

/// `[server]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the API, including any path prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// `[session]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Where the access/refresh token pair is persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

impl LarderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Merging is per field, so a project file that only sets `server.url`
    /// keeps the user's `server.timeout_secs`.
    pub fn merge(&mut self, other: LarderConfig) {
        if let Some(server) = other.server {
            let base = self.server.get_or_insert_with(ServerConfig::default);
            if server.url.is_some() {
                base.url = server.url;
            }
            if server.timeout_secs.is_some() {
                base.timeout_secs = server.timeout_secs;
            }
        }

        if let Some(session) = other.session {
            let base = self.session.get_or_insert_with(SessionConfig::default);
            if session.token_file.is_some() {
                base.token_file = session.token_file;
            }
        }
    }

    /// Resolve effective settings using the process environment.
    pub fn resolve(&self, config_dir: &Path) -> Result<ClientSettings> {
        self.resolve_with(config_dir, &EnvOverrides::from_env())
    }

    /// Resolve effective settings.
    ///
    /// Precedence: environment override, then config value, then default.
    pub fn resolve_with(&self, config_dir: &Path, env: &EnvOverrides) -> Result<ClientSettings> {
        let server = self.server.clone().unwrap_or_default();
        let session = self.session.clone().unwrap_or_default();

        let server_url = env
            .server_url
            .clone()
            .or(server.url)
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        if !(server_url.starts_with("http://") || server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "server.url".to_string(),
                reason: format!("'{}' is not an http(s) URL", server_url),
            });
        }

        let timeout_secs = server.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let token_file = env
            .token_file
            .clone()
            .or(session.token_file)
            .map(|p| expand_home(&p))
            .unwrap_or_else(|| config_dir.join(DEFAULT_TOKEN_FILE));

        Ok(ClientSettings {
            server_url,
            timeout: Duration::from_secs(timeout_secs),
            token_file,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Values taken from environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub server_url: Option<String>,
    pub token_file: Option<PathBuf>,
}

impl EnvOverrides {
    /// Read overrides from the process environment. Empty values are ignored.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            server_url: non_empty(SERVER_URL_ENV),
            token_file: non_empty(TOKEN_FILE_ENV).map(PathBuf::from),
        }
    }
}

/// Fully resolved settings for building a client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub server_url: String,
    pub timeout: Duration,
    pub token_file: PathBuf,
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
