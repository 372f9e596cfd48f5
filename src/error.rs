//! Error types for task admission and inspection.
//!
//! [`TaskError`] is the error surface of [`TaskManager`](crate::manager::TaskManager)
//! and [`TaskPathRouter`](crate::router::TaskPathRouter). Action failures are
//! *not* represented here: an action error is captured into the task record's
//! `reason` field at the failed transition and observed by polling, never
//! returned from an admission call.

use thiserror::Error;

use crate::store::backend::StorageError;

/// Errors surfaced by admission, inspection, and path dispatch.
///
/// [`Busy`](TaskError::Busy) is a sentinel: callers of the strict
/// single-flight admission match on it to distinguish "work already
/// pending" from real failures.
///
/// # Examples
///
/// ```
/// use publisher_tasks::TaskError;
///
/// let err = TaskError::Busy;
/// assert_eq!(err.to_string(), "busy");
/// assert!(matches!(err, TaskError::Busy));
/// ```
#[derive(Debug, Error)]
pub enum TaskError {
    /// Strict single-flight admission rejected: a task is already
    /// running or queued.
    #[error("busy")]
    Busy,

    /// The bounded task channel is full; the task was not enqueued.
    #[error("task queue is full")]
    QueueOverflow,

    /// The worker is no longer accepting tasks (the manager was stopped).
    #[error("task worker is not running")]
    WorkerUnavailable,

    /// No task record exists for the given UUID.
    #[error("task not found: {uuid}")]
    NotFound {
        /// The UUID that was looked up.
        uuid: String,
    },

    /// The request path did not match any known operation.
    #[error("unknown path: {path}")]
    UnknownPath {
        /// The path that failed to dispatch.
        path: String,
    },

    /// A storage or serialization failure, propagated verbatim.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
