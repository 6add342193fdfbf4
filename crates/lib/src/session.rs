//! Per-sender try-on sessions and the stores that hold them.
//!
//! A session tracks one image-collection cycle: an uploaded image waiting for the
//! "0"/"1" reply, and the confirmed person and garment images. Sessions are keyed by
//! sender (e.g. `whatsapp:+15551234567`) and removed once a try-on has been attempted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Sender identifier (phone-number-like string from the webhook `From` field).
pub type SenderId = String;

/// Image-collection progress for one sender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Media locator awaiting the "0"/"1" reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_media: Option<String>,
    /// True while waiting for the "0"/"1" reply.
    #[serde(default)]
    pub expecting_response: bool,
    /// Media locator confirmed as the person photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_image: Option<String>,
    /// Media locator confirmed as the garment photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub garment_image: Option<String>,
}

impl Session {
    /// Pending upload that still needs a role, if the sender is being asked for one.
    pub fn awaiting_role(&self) -> Option<&str> {
        if self.expecting_response {
            self.pending_media.as_deref()
        } else {
            None
        }
    }

    /// Both images, once confirmed: (person, garment).
    pub fn pair(&self) -> Option<(&str, &str)> {
        match (&self.user_image, &self.garment_image) {
            (Some(u), Some(g)) => Some((u.as_str(), g.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session store encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Keyed storage for sessions. Injected into the conversation tracker.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Return a copy of the sender's session if one exists.
    async fn get(&self, sender: &str) -> Result<Option<Session>, SessionStoreError>;
    /// Insert or replace the sender's session.
    async fn put(&self, sender: &str, session: Session) -> Result<(), SessionStoreError>;
    /// Remove the sender's session. Removing a missing session is not an error.
    async fn delete(&self, sender: &str) -> Result<(), SessionStoreError>;
}

/// In-memory store (lost on restart).
pub struct MemorySessionStore {
    inner: Arc<RwLock<HashMap<SenderId, Session>>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, sender: &str) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.inner.read().await.get(sender).cloned())
    }

    async fn put(&self, sender: &str, session: Session) -> Result<(), SessionStoreError> {
        self.inner.write().await.insert(sender.to_string(), session);
        Ok(())
    }

    async fn delete(&self, sender: &str) -> Result<(), SessionStoreError> {
        self.inner.write().await.remove(sender);
        Ok(())
    }
}

/// Sessions mirrored to a JSON file so an in-progress cycle survives a restart.
pub struct FileSessionStore {
    path: PathBuf,
    sessions: RwLock<HashMap<SenderId, Session>>,
}

impl FileSessionStore {
    /// Load store from path; if the file is missing or invalid, starts empty.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let sessions = match tokio::fs::read_to_string(&path).await {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                log::warn!("ignoring unreadable session file {}: {}", path.display(), e);
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            sessions: RwLock::new(sessions),
        }
    }

    async fn save(&self, sessions: &HashMap<SenderId, Session>) -> Result<(), SessionStoreError> {
        let json = serde_json::to_string_pretty(sessions)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, sender: &str) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.sessions.read().await.get(sender).cloned())
    }

    async fn put(&self, sender: &str, session: Session) -> Result<(), SessionStoreError> {
        let mut g = self.sessions.write().await;
        g.insert(sender.to_string(), session);
        self.save(&g).await
    }

    async fn delete(&self, sender: &str) -> Result<(), SessionStoreError> {
        let mut g = self.sessions.write().await;
        if g.remove(sender).is_some() {
            self.save(&g).await?;
        }
        Ok(())
    }
}
