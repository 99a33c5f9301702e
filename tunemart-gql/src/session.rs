//! Session context: access-token storage and login redirection
//!
//! The client never touches global state directly. It reads and writes the
//! access token through [`SessionContext`], and when a session cannot be
//! recovered it asks the context to clear itself and send the user back to
//! the login entry point.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{GqlError, GqlResult};

/// Target used when a session is ended
pub const LOGIN_ROUTE: &str = "/";

#[async_trait]
pub trait SessionContext: Send + Sync {
    /// Current access token, if any
    async fn token(&self) -> Option<String>;

    /// Persist a freshly issued access token
    async fn set_token(&self, token: &str) -> GqlResult<()>;

    /// Forget all authentication state
    async fn clear_session(&self) -> GqlResult<()>;

    /// Send the user to the login entry point
    async fn navigate_to_login(&self, target: &str);
}

/// In-memory session, for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySession {
    token: RwLock<Option<String>>,
    navigations: RwLock<Vec<String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
            navigations: RwLock::new(Vec::new()),
        }
    }

    /// Every navigation target requested so far
    pub async fn navigations(&self) -> Vec<String> {
        self.navigations.read().await.clone()
    }
}

#[async_trait]
impl SessionContext for MemorySession {
    async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    async fn set_token(&self, token: &str) -> GqlResult<()> {
        *self.token.write().await = Some(token.to_string());
        Ok(())
    }

    async fn clear_session(&self) -> GqlResult<()> {
        *self.token.write().await = None;
        Ok(())
    }

    async fn navigate_to_login(&self, target: &str) {
        self.navigations.write().await.push(target.to_string());
    }
}

/// On-disk representation of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    pub saved_at: DateTime<Utc>,
}

/// Session persisted as JSON in the root folder
///
/// A terminal has no location bar, so `navigate_to_login` records the
/// request and logs a hint instead of redirecting.
#[derive(Debug)]
pub struct FileSession {
    path: PathBuf,
    state: RwLock<Option<StoredSession>>,
    login_required: RwLock<Option<String>>,
}

impl FileSession {
    /// Open the session file, treating a missing or corrupt file as signed out
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<StoredSession>(&bytes) {
                Ok(stored) => {
                    debug!(path = %path.display(), saved_at = %stored.saved_at, "Loaded session");
                    Some(stored)
                }
                Err(e) => {
                    warn!("Ignoring unreadable session file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Cannot read session file {}: {}", path.display(), e);
                None
            }
        };

        Self {
            path,
            state: RwLock::new(state),
            login_required: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn stored(&self) -> Option<StoredSession> {
        self.state.read().await.clone()
    }

    /// Target of the last `navigate_to_login`, if the session was ended
    pub async fn login_required(&self) -> Option<String> {
        self.login_required.read().await.clone()
    }

    async fn write_file(&self, stored: &StoredSession) -> GqlResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GqlError::Session(format!("{}: {}", parent.display(), e)))?;
        }
        let bytes = serde_json::to_vec_pretty(stored)?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| GqlError::Session(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl SessionContext for FileSession {
    async fn token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|stored| stored.access_token.clone())
    }

    async fn set_token(&self, token: &str) -> GqlResult<()> {
        let stored = StoredSession {
            access_token: token.to_string(),
            saved_at: Utc::now(),
        };
        self.write_file(&stored).await?;
        *self.state.write().await = Some(stored);
        info!(path = %self.path.display(), "Access token saved");
        Ok(())
    }

    async fn clear_session(&self) -> GqlResult<()> {
        *self.state.write().await = None;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GqlError::Session(format!("{}: {}", self.path.display(), e))),
        }
    }

    async fn navigate_to_login(&self, target: &str) {
        warn!("Session ended; sign in again with `tunemart login`");
        *self.login_required.write().await = Some(target.to_string());
    }
}
