//! Token storage and derived session state.
//!
//! A [`TokenStore`] is the single source of truth for the credential pair.
//! Both tokens are always written and cleared together, so an observer sees
//! either the previous pair or the new one.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Default session file name within the larder config directory.
pub const SESSION_FILE: &str = "session.json";

// ============================================================================
// Types
// ============================================================================

/// An access/refresh token pair as issued by the server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Short-lived bearer credential.
    pub access_token: String,
    /// Long-lived credential used only to mint a new access token.
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.access_token.is_empty() {
            return Err(Error::InvalidToken("access token is empty"));
        }
        if self.refresh_token.is_empty() {
            return Err(Error::InvalidToken("refresh token is empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Authentication status visible to the rest of the application.
///
/// The transitional refreshing state lives inside the request pipeline and
/// is never reported here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Anonymous,
    Authenticated,
}

/// Point-in-time view of the stored credentials.
///
/// Either token may be missing when the persisted file was edited by hand
/// or only partially written by an older client.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credentials {
    /// `Authenticated` iff both tokens are present.
    pub fn status(&self) -> SessionStatus {
        match (&self.access_token, &self.refresh_token) {
            (Some(_), Some(_)) => SessionStatus::Authenticated,
            _ => SessionStatus::Anonymous,
        }
    }

    /// Whether either token is held.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// The complete pair, if both tokens are present.
    pub fn pair(&self) -> Option<TokenPair> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            _ => None,
        }
    }
}

impl From<TokenPair> for Credentials {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: Some(pair.access_token),
            refresh_token: Some(pair.refresh_token),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

// ============================================================================
// TokenStore Trait
// ============================================================================

/// Storage for the current session's credentials.
#[async_trait]
pub trait TokenStore: Send + Sync + fmt::Debug {
    /// Snapshot both tokens under a single read.
    async fn credentials(&self) -> Credentials;

    /// Replace both tokens and persist them.
    ///
    /// Empty tokens are rejected; nothing else about the values is checked.
    async fn set_session(&self, tokens: TokenPair) -> Result<()>;

    /// Remove both tokens. Returns whether anything was stored before.
    ///
    /// Implementations must drop the in-memory session even when persisting
    /// the removal fails, and only then report the error.
    async fn clear_session(&self) -> Result<bool>;

    async fn access_token(&self) -> Option<String> {
        self.credentials().await.access_token
    }

    async fn refresh_token(&self) -> Option<String> {
        self.credentials().await.refresh_token
    }

    async fn status(&self) -> SessionStatus {
        self.credentials().await.status()
    }
}

/// Shared token store for use across async contexts.
pub type SharedTokenStore = Arc<dyn TokenStore>;

// ============================================================================
// FileTokenStore
// ============================================================================

/// Token store persisted as a JSON file.
///
/// The file is read once when the store is opened and rewritten on every
/// mutation, so a later process observes the latest session.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    cached: RwLock<Credentials>,
}

impl FileTokenStore {
    /// Open the store at `path`, loading any persisted session.
    ///
    /// A missing file means no session. An unreadable or corrupt file is
    /// logged and treated the same way, so the user can simply log in again.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cached = match Self::load(&path) {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
                Credentials::default()
            }
        };

        Self {
            path,
            cached: RwLock::new(cached),
        }
    }

    /// Open the default session file inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::open(data_dir.join(SESSION_FILE))
    }

    /// Path of the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<Credentials> {
        if !path.exists() {
            return Ok(Credentials::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Storage(format!("Failed to read session file: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("Failed to parse session file: {}", e)))
    }

    /// Write via a sibling temp file and rename so a crash never leaves a
    /// file holding one old and one new token.
    fn persist(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create session directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(credentials)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| Error::Storage(format!("Failed to write session file: {}", e)))?;
        restrict_permissions(&tmp);
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Storage(format!("Failed to replace session file: {}", e)))?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        tracing::warn!(path = %path.display(), error = %e, "could not restrict session file permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn credentials(&self) -> Credentials {
        self.cached.read().await.clone()
    }

    async fn set_session(&self, tokens: TokenPair) -> Result<()> {
        tokens.validate()?;
        let credentials = Credentials::from(tokens);

        let mut cache = self.cached.write().await;
        self.persist(&credentials)?;
        *cache = credentials;

        tracing::debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    async fn clear_session(&self) -> Result<bool> {
        let mut cache = self.cached.write().await;
        let had_tokens = !cache.is_empty();

        // The in-memory session ends even if the file cannot be removed.
        *cache = Credentials::default();

        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to delete session file: {}",
                    e
                )));
            }
        }

        tracing::debug!(path = %self.path.display(), had_tokens, "session cleared");
        Ok(had_tokens)
    }
}

// ============================================================================
// MemoryTokenStore
// ============================================================================

/// Token store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Credentials>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: RwLock::new(tokens.into()),
        }
    }

    /// Seed arbitrary (possibly partial) credentials.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            tokens: RwLock::new(credentials),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn credentials(&self) -> Credentials {
        self.tokens.read().await.clone()
    }

    async fn set_session(&self, tokens: TokenPair) -> Result<()> {
        tokens.validate()?;
        *self.tokens.write().await = tokens.into();
        Ok(())
    }

    async fn clear_session(&self) -> Result<bool> {
        let mut tokens = self.tokens.write().await;
        let had_tokens = !tokens.is_empty();
        *tokens = Credentials::default();
        Ok(had_tokens)
    }
}

/// Create a shared file-backed token store in `data_dir`.
pub fn create_token_store(data_dir: &Path) -> SharedTokenStore {
    Arc::new(FileTokenStore::in_dir(data_dir))
}

/// Create a shared in-memory token store.
pub fn create_memory_token_store() -> SharedTokenStore {
    Arc::new(MemoryTokenStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_starts_anonymous() {
        let temp = tempdir().unwrap();
        let store = FileTokenStore::in_dir(temp.path());

        assert_eq!(store.status().await, SessionStatus::Anonymous);
        assert!(store.access_token().await.is_none());
        assert!(store.refresh_token().await.is_none());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let temp = tempdir().unwrap();
        let store = FileTokenStore::in_dir(temp.path());
        store.set_session(TokenPair::new("A1", "R1")).await.unwrap();
        assert_eq!(store.status().await, SessionStatus::Authenticated);

        let reopened = FileTokenStore::in_dir(temp.path());
        assert_eq!(reopened.access_token().await.as_deref(), Some("A1"));
        assert_eq!(reopened.refresh_token().await.as_deref(), Some("R1"));
        assert_eq!(reopened.status().await, SessionStatus::Authenticated);
    }

    #[tokio::test]
    async fn test_file_store_uses_fixed_keys() {
        let temp = tempdir().unwrap();
        let store = FileTokenStore::in_dir(temp.path());
        store.set_session(TokenPair::new("A1", "R1")).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["accessToken"], "A1");
        assert_eq!(value["refreshToken"], "R1");
    }

    #[tokio::test]
    async fn test_file_store_clear_is_idempotent() {
        let temp = tempdir().unwrap();
        let store = FileTokenStore::in_dir(temp.path());
        store.set_session(TokenPair::new("A1", "R1")).await.unwrap();

        assert!(store.clear_session().await.unwrap());
        assert!(!store.clear_session().await.unwrap());
        assert!(!store.path().exists());
        assert_eq!(store.status().await, SessionStatus::Anonymous);

        let reopened = FileTokenStore::in_dir(temp.path());
        assert_eq!(reopened.status().await, SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_file_store_clear_drops_cache_when_delete_fails() {
        let temp = tempdir().unwrap();
        let store = FileTokenStore::in_dir(temp.path());
        store.set_session(TokenPair::new("A1", "R1")).await.unwrap();

        std::fs::remove_file(store.path()).unwrap();
        std::fs::create_dir(store.path()).unwrap();
        std::fs::write(store.path().join("keep"), "x").unwrap();

        assert!(matches!(store.clear_session().await, Err(Error::Storage(_))));
        assert!(store.credentials().await.is_empty());
        assert_eq!(store.status().await, SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_file_store_ignores_corrupt_file() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join(SESSION_FILE), "{not json").unwrap();

        let store = FileTokenStore::in_dir(temp.path());
        assert_eq!(store.status().await, SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_partial_file_is_anonymous() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join(SESSION_FILE),
            r#"{"accessToken":"A1"}"#,
        )
        .unwrap();

        let store = FileTokenStore::in_dir(temp.path());
        assert_eq!(store.access_token().await.as_deref(), Some("A1"));
        assert_eq!(store.status().await, SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_rejects_empty_tokens() {
        let store = MemoryTokenStore::new();
        let err = store.set_session(TokenPair::new("", "R1")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidToken(_)));

        let err = store.set_session(TokenPair::new("A1", "")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidToken(_)));
        assert_eq!(store.status().await, SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_memory_store_replaces_both_tokens() {
        let store = MemoryTokenStore::with_tokens(TokenPair::new("A1", "R1"));
        store.set_session(TokenPair::new("A2", "R2")).await.unwrap();

        let credentials = store.credentials().await;
        assert_eq!(credentials.pair(), Some(TokenPair::new("A2", "R2")));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let pair = TokenPair::new("secret-access", "secret-refresh");
        let rendered = format!("{:?}", pair);
        assert!(!rendered.contains("secret"));

        let rendered = format!("{:?}", Credentials::from(pair));
        assert!(!rendered.contains("secret"));
    }
}
