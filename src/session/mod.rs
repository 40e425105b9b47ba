//! Session persistence
//!
//! A session is the browser's storage snapshot plus the time it was first
//! created. Persistence is best-effort in both directions: a missing or
//! unreadable file yields `None`, and a failed write is logged and dropped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Authenticated browsing context carried across runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub created_at: DateTime<Utc>,
    /// Driver-owned snapshot (cookies, local storage)
    pub storage: Option<serde_json::Value>,
}

impl Session {
    /// Unauthenticated session with nothing to restore
    pub fn fresh() -> Self {
        Self {
            created_at: Utc::now(),
            storage: None,
        }
    }

    /// Replace the storage snapshot, keeping the creation time
    pub fn refresh(&mut self, storage: serde_json::Value) {
        self.storage = Some(storage);
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}

/// Loads and persists the session between runs
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Previously persisted session, or `None` if there is nothing usable
    async fn load(&self) -> Option<Session>;

    /// Persist the session. Never fails; errors are logged.
    async fn save(&self, session: &Session);

    /// Forget the persisted session
    async fn clear(&self);
}

/// Session stored as JSON at a fixed path
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, session: &Session) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(session)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Option<Session> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored session at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Could not read session {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<Session>(&content) {
            Ok(session) => {
                info!(
                    "Loaded session from {} (created {})",
                    self.path.display(),
                    session.created_at.to_rfc3339()
                );
                Some(session)
            }
            Err(e) => {
                warn!("Ignoring unreadable session {}: {}", self.path.display(), e);
                None
            }
        }
    }

    async fn save(&self, session: &Session) {
        match self.write(session) {
            Ok(()) => debug!("Session saved to {}", self.path.display()),
            Err(e) => warn!("Failed to save session to {}: {}", self.path.display(), e),
        }
    }

    async fn clear(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove session {}: {}", self.path.display(), e);
            }
        }
    }
}
