//! Key-value persistence for the panel
//!
//! Pages keep two kinds of values: the session identifier of the current
//! page load and the serialized thread of that session. Both go through the
//! [`Storage`] trait so the backend can be swapped without touching the panel.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::InMemoryStorage;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// String key-value store
#[async_trait]
pub trait Storage: Send + Sync + Debug {
    /// Returns `None` when nothing is stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrites the value stored under `key`
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Type alias for Arc-wrapped Storage trait objects
pub type StorageRef = Arc<dyn Storage>;
