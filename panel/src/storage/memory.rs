use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::storage::{Storage, StorageError};

/// In-memory implementation of Storage
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.read().map_err(|e| {
            StorageError::Backend(format!("Failed to acquire read lock: {}", e))
        })?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut values = self.values.write().map_err(|e| {
            StorageError::Backend(format!("Failed to acquire write lock: {}", e))
        })?;
        debug!(key, len = value.len(), "Stored value");
        values.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.write().map_err(|e| {
            StorageError::Backend(format!("Failed to acquire write lock: {}", e))
        })?;
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.get("k").await.unwrap(), None);

        storage.set("k", "v1".to_string()).await.unwrap();
        storage.set("k", "v2".to_string()).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), Some("v2".to_string()));

        storage.remove("k").await.unwrap();
        storage.remove("k").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clones_share_values() {
        let storage = InMemoryStorage::new();
        let other = storage.clone();
        storage.set("shared", "yes".to_string()).await.unwrap();
        assert_eq!(other.get("shared").await.unwrap(), Some("yes".to_string()));
    }
}
