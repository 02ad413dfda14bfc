use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::storage::{Storage, StorageError};

/// Storage key holding the id of the current page load's session
pub const SESSION_ID_KEY: &str = "session_id";

/// Identity of one page-load session, created once and passed to the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    id: String,
}

impl SessionContext {
    /// Starts a fresh session with a random id
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Reuses the session id cached in `storage`, or creates and caches one.
    pub async fn resume_or_create(storage: &dyn Storage) -> Result<Self, StorageError> {
        if let Some(id) = storage.get(SESSION_ID_KEY).await? {
            let id = id.trim();
            if !id.is_empty() {
                debug!(session = id, "Resumed session");
                return Ok(Self::with_id(id));
            }
        }

        let session = Self::new();
        storage.set(SESSION_ID_KEY, session.id.clone()).await?;
        info!(session = %session.id, "Created new session");
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Storage key of this session's thread
    pub fn thread_key(&self) -> String {
        format!("thread:{}", self.id)
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
