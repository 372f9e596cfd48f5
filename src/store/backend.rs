//! Opaque key-value storage backend trait.
//!
//! [`StorageBackend`] is the contract the host store satisfies: four raw
//! operations, no transactions, no domain logic. The manager is the sole
//! writer-side serialization; backends must not lock across calls or
//! interpret keys. Multi-key writes are not atomic -- the cross-key
//! invariants are re-established by the manager's stale sweep.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from raw storage operations.
///
/// Serialization failures are treated as storage errors throughout: the
/// codec helpers in [`crate::store`] map `serde_json` errors into
/// [`StorageError::Serialization`] so that callers see one failure class.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O or backend-specific failure (network, disk, host store).
    #[error("storage backend error: {message}")]
    Backend {
        /// Human-readable description of the failure.
        message: String,
        /// The underlying error, when available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A record failed to encode or decode.
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Creates a [`StorageError::Backend`] from a message, without an
    /// underlying source error.
    ///
    /// # Examples
    ///
    /// ```
    /// use publisher_tasks::StorageError;
    ///
    /// let err = StorageError::backend("connection reset");
    /// assert_eq!(err.to_string(), "storage backend error: connection reset");
    /// ```
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }
}

/// Key-value storage consumed by the task manager.
///
/// # Contract
///
/// - [`get`](StorageBackend::get) returns `None` for absent keys.
/// - [`put`](StorageBackend::put) creates or overwrites unconditionally.
/// - [`delete`](StorageBackend::delete) is idempotent; deleting an absent
///   key succeeds.
/// - [`list`](StorageBackend::list) returns the keys under `prefix` with
///   the prefix stripped, in unspecified order.
///
/// Implementations must be `Send + Sync`; admission, inspection, and the
/// worker's callbacks reach the store from different tasks.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves the value stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `value` under `key`, overwriting any previous value.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Removes `key`. Absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Lists the keys under `prefix`, with the prefix stripped.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
