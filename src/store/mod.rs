//! Storage codec: key builders and typed read/write helpers.
//!
//! The helpers here translate between [`TaskRecord`]s / log blobs and the
//! raw bytes of a [`StorageBackend`]. They hold no locks and enforce no
//! invariants; serializing every persistence transition is the manager's
//! job. Records are encoded as field-tagged JSON, so fields added later
//! stay readable against old data.

pub mod backend;
pub mod memory;

pub use backend::{StorageBackend, StorageError};
pub use memory::InMemoryBackend;

use crate::constants::{
    STORAGE_KEY_CURRENT_RUNNING_TASK, TASK_LOG_STORAGE_PREFIX, TASK_STORAGE_PREFIX,
};
use crate::domain::TaskRecord;

/// Builds the storage key of a task record: `task/<uuid>`.
///
/// # Examples
///
/// ```
/// assert_eq!(publisher_tasks::store::task_key("abc"), "task/abc");
/// ```
pub fn task_key(uuid: &str) -> String {
    format!("{TASK_STORAGE_PREFIX}{uuid}")
}

/// Builds the storage key of a task log blob: `task_log/<uuid>`.
///
/// # Examples
///
/// ```
/// assert_eq!(publisher_tasks::store::task_log_key("abc"), "task_log/abc");
/// ```
pub fn task_log_key(uuid: &str) -> String {
    format!("{TASK_LOG_STORAGE_PREFIX}{uuid}")
}

/// Reads and decodes the task record for `uuid`, or `None` if absent.
pub async fn get_task(
    storage: &dyn StorageBackend,
    uuid: &str,
) -> Result<Option<TaskRecord>, StorageError> {
    match storage.get(&task_key(uuid)).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encodes and writes `record` under its UUID key.
pub async fn put_task(
    storage: &dyn StorageBackend,
    record: &TaskRecord,
) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec(record)?;
    storage.put(&task_key(&record.uuid), &bytes).await
}

/// Reads the persisted log blob for `uuid`, or `None` if absent.
pub async fn get_task_log(
    storage: &dyn StorageBackend,
    uuid: &str,
) -> Result<Option<Vec<u8>>, StorageError> {
    storage.get(&task_log_key(uuid)).await
}

/// Writes the log blob for `uuid`. Called exactly once per task, at the
/// terminal transition.
pub async fn put_task_log(
    storage: &dyn StorageBackend,
    uuid: &str,
    log: &[u8],
) -> Result<(), StorageError> {
    storage.put(&task_log_key(uuid), log).await
}

/// Reads the current-running pointer, or `None` if no task is executing.
pub async fn current_running_task_uuid(
    storage: &dyn StorageBackend,
) -> Result<Option<String>, StorageError> {
    Ok(storage
        .get(STORAGE_KEY_CURRENT_RUNNING_TASK)
        .await?
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
}

/// Sets the current-running pointer to `uuid`.
pub async fn set_current_running_task(
    storage: &dyn StorageBackend,
    uuid: &str,
) -> Result<(), StorageError> {
    storage
        .put(STORAGE_KEY_CURRENT_RUNNING_TASK, uuid.as_bytes())
        .await
}

/// Clears the current-running pointer. Idempotent.
pub async fn clear_current_running_task(
    storage: &dyn StorageBackend,
) -> Result<(), StorageError> {
    storage.delete(STORAGE_KEY_CURRENT_RUNNING_TASK).await
}

/// Lists the UUIDs of all persisted task records.
pub async fn list_task_uuids(
    storage: &dyn StorageBackend,
) -> Result<Vec<String>, StorageError> {
    storage.list(TASK_STORAGE_PREFIX).await
}
