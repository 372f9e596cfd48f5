//! Task record -- the persisted representation of a task's lifecycle.
//!
//! [`TaskRecord`] is the unit of persistence: one record per admitted task,
//! keyed by UUID, carrying the lifecycle [`TaskStatus`], admission and
//! last-modification timestamps, and a failure reason. Records are encoded
//! as field-tagged JSON so that fields added later deserialize against old
//! data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a task.
///
/// The normal path is `Queued -> Running -> Completed | Failed`. `Canceled`
/// is reserved in the schema for forward compatibility but is never written
/// by the core: cancellation of a running task terminates as `Failed` with
/// the cancellation message as the reason.
///
/// Persisted as upper-case strings (`"QUEUED"`, `"RUNNING"`, ...).
///
/// # Examples
///
/// ```
/// use publisher_tasks::TaskStatus;
///
/// assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Running));
/// assert!(TaskStatus::Completed.is_terminal());
/// assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Running));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Admitted, persisted, waiting for the worker.
    Queued,
    /// Presently executing inside the worker.
    Running,
    /// The action returned success (terminal).
    Completed,
    /// The action returned an error, was canceled, or the record went
    /// stale across a restart (terminal).
    Failed,
    /// Reserved; never written by the core (terminal).
    Canceled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "QUEUED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Canceled => write!(f, "CANCELED"),
        }
    }
}

impl TaskStatus {
    /// Returns `true` for states that admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Returns `true` if moving from this status to `next` is a valid
    /// lifecycle transition.
    ///
    /// - `Queued` -> `Running` (worker pickup) or `Failed` (stale sweep)
    /// - `Running` -> `Completed`, `Failed`, or `Canceled`
    /// - terminal states reject everything, self-transitions included
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == next {
            return false;
        }
        match self {
            Self::Queued => matches!(next, Self::Running | Self::Failed),
            Self::Running => matches!(next, Self::Completed | Self::Failed | Self::Canceled),
            Self::Completed | Self::Failed | Self::Canceled => false,
        }
    }
}

/// Persisted record of one admitted task.
///
/// `reason` is empty unless the task ended in `Failed` (or, in schema
/// terms, `Canceled`). All fields round-trip through the codec, including
/// zero-valued timestamps and the empty reason.
///
/// # Examples
///
/// ```
/// use publisher_tasks::{TaskRecord, TaskStatus};
///
/// let record = TaskRecord::new_queued();
/// assert_eq!(record.status, TaskStatus::Queued);
/// assert_eq!(record.uuid.len(), 36);
/// assert_eq!(record.created, record.modified);
/// assert!(record.reason.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Opaque unique identifier, assigned at admission.
    pub uuid: String,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// Timestamp of admission.
    pub created: DateTime<Utc>,

    /// Timestamp of the last status change.
    pub modified: DateTime<Utc>,

    /// Free-form failure reason; empty unless the task failed.
    #[serde(default)]
    pub reason: String,
}

impl TaskRecord {
    /// Creates a fresh `Queued` record with a generated UUIDv4 and both
    /// timestamps set to now.
    pub fn new_queued() -> Self {
        let now = Utc::now();
        Self {
            uuid: Uuid::new_v4().to_string(),
            status: TaskStatus::Queued,
            created: now,
            modified: now,
            reason: String::new(),
        }
    }
}
