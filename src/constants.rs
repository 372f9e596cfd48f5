//! Storage key and queue constants.
//!
//! All persisted state lives under four key classes in the host's
//! key-value store:
//!
//! | Key | Value |
//! |---|---|
//! | `task/<uuid>` | encoded [`TaskRecord`](crate::domain::TaskRecord) |
//! | `task_log/<uuid>` | raw log bytes, written once at the terminal transition |
//! | `current_running_task` | UUID of the task presently executing, or absent |
//! | `queue_task/<uuid>` | legacy queue listing, swept at manager construction |

/// Prefix for persisted task records: `task/<uuid>`.
pub const TASK_STORAGE_PREFIX: &str = "task/";

/// Prefix for persisted task logs: `task_log/<uuid>`.
pub const TASK_LOG_STORAGE_PREFIX: &str = "task_log/";

/// Singleton key naming the UUID of the task presently executing.
pub const STORAGE_KEY_CURRENT_RUNNING_TASK: &str = "current_running_task";

/// Legacy queue listing prefix. Older plugin versions tracked queued
/// tasks under this prefix; the manager only deletes these keys now.
pub const LEGACY_QUEUE_TASK_PREFIX: &str = "queue_task/";

/// Capacity of the bounded task channel between admission and the worker.
pub const TASK_QUEUE_CAPACITY: usize = 128;

/// Failure reason written onto records left QUEUED or RUNNING by a
/// previous process life.
pub const STALE_TASK_REASON: &str =
    "stale task record left over from a process restart or crash";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_prefixes_are_distinct() {
        let prefixes = [
            TASK_STORAGE_PREFIX,
            TASK_LOG_STORAGE_PREFIX,
            LEGACY_QUEUE_TASK_PREFIX,
        ];
        for (i, a) in prefixes.iter().enumerate() {
            for (j, b) in prefixes.iter().enumerate() {
                if i != j {
                    assert!(!a.starts_with(b), "{a} must not shadow {b}");
                }
            }
        }
    }

    #[test]
    fn current_running_task_key_is_not_prefixed() {
        assert!(!STORAGE_KEY_CURRENT_RUNNING_TASK.contains('/'));
    }
}
