//! In-memory storage backend.
//!
//! [`InMemoryBackend`] is a thread-safe [`StorageBackend`] over a
//! [`DashMap`]. It carries no domain logic and exists for tests and for
//! embedding the manager without a host store.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::store::backend::{StorageBackend, StorageError};

/// Thread-safe in-memory key-value store.
///
/// # Examples
///
/// ```
/// use publisher_tasks::{InMemoryBackend, StorageBackend};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let backend = InMemoryBackend::new();
/// backend.put("task/abc", b"{}").await.unwrap();
/// assert_eq!(backend.get("task/abc").await.unwrap(), Some(b"{}".to_vec()));
/// assert_eq!(backend.list("task/").await.unwrap(), vec!["abc".to_string()]);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: DashMap<String, Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.data.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .data
            .iter()
            .filter_map(|entry| entry.key().strip_prefix(prefix).map(str::to_string))
            .collect();
        // Deterministic order for callers that iterate.
        keys.sort();
        Ok(keys)
    }
}
