use ontap_core::Thread;
use thiserror::Error;
use tracing::debug;

use crate::session::SessionContext;
use crate::storage::{Storage, StorageError};

#[derive(Error, Debug)]
pub enum ThreadLoadError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("persisted thread is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Reads the session's thread. A session with nothing stored has an empty thread.
pub async fn load_thread(
    storage: &dyn Storage,
    session: &SessionContext,
) -> Result<Thread, ThreadLoadError> {
    let key = session.thread_key();
    match storage.get(&key).await? {
        Some(raw) => {
            let thread: Thread = serde_json::from_str(&raw)?;
            debug!(key = %key, messages = thread.len(), "Loaded thread");
            Ok(thread)
        }
        None => Ok(Thread::new()),
    }
}

/// Overwrites the stored thread with the full sequence.
pub async fn save_thread(
    storage: &dyn Storage,
    session: &SessionContext,
    thread: &Thread,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(thread)?;
    storage.set(&session.thread_key(), raw).await
}
