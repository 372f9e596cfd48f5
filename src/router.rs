//! Path router: maps the host's path-shaped requests onto manager calls.
//!
//! The host daemon hands requests down as URL-shaped selectors. The router
//! validates parameters, dispatches to [`TaskManager`], and marshals
//! responses as JSON values; it contains no domain logic.
//!
//! | Path | Operation |
//! |---|---|
//! | `task/` | list task records |
//! | `task/<uuid>` | read task status |
//! | `task/<uuid>/log` | read task log (live buffer while running) |
//! | `task/<uuid>/cancel` | cancel the running task |
//! | `target/` | enumerate configured publishing targets |

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::TaskError;
use crate::manager::TaskManager;
use crate::store::StorageError;

/// One configured publishing destination, as enumerated by `target/`.
///
/// # Examples
///
/// ```
/// use publisher_tasks::PublishTarget;
///
/// let target = PublishTarget {
///     name: "stable".to_string(),
///     repository_url: "https://repo.example.com/stable".to_string(),
/// };
/// let json = serde_json::to_value(&target).unwrap();
/// assert_eq!(json["name"], "stable");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishTarget {
    /// Target name used by release callers.
    pub name: String,

    /// URL of the repository the target publishes into.
    pub repository_url: String,
}

/// Thin adapter from request paths to [`TaskManager`] operations.
pub struct TaskPathRouter {
    manager: Arc<TaskManager>,
    targets: Vec<PublishTarget>,
}

impl TaskPathRouter {
    /// Creates a router over `manager` with no configured targets.
    pub fn new(manager: Arc<TaskManager>) -> Self {
        Self {
            manager,
            targets: Vec::new(),
        }
    }

    /// Sets the publishing targets enumerated by `target/`.
    pub fn with_targets(mut self, targets: Vec<PublishTarget>) -> Self {
        self.targets = targets;
        self
    }

    /// Dispatches a request path onto the matching operation.
    ///
    /// # Errors
    ///
    /// [`TaskError::UnknownPath`] when no operation matches,
    /// [`TaskError::NotFound`] when a UUID segment addresses no record,
    /// and storage errors verbatim.
    pub async fn handle(&self, path: &str) -> Result<Value, TaskError> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match segments.as_slice() {
            ["task"] => self.handle_task_list().await,
            ["task", uuid] if !uuid.is_empty() => self.handle_task_status(uuid).await,
            ["task", uuid, "log"] if !uuid.is_empty() => self.handle_task_log(uuid).await,
            ["task", uuid, "cancel"] if !uuid.is_empty() => self.handle_task_cancel(uuid).await,
            ["target"] => self.handle_target_list(),
            _ => Err(TaskError::UnknownPath {
                path: path.to_string(),
            }),
        }
    }

    /// `task/`: all task records, newest first.
    pub async fn handle_task_list(&self) -> Result<Value, TaskError> {
        let tasks = self.manager.list_tasks().await?;
        let tasks = serde_json::to_value(tasks).map_err(StorageError::from)?;
        Ok(json!({ "tasks": tasks }))
    }

    /// `task/<uuid>`: the persisted record.
    pub async fn handle_task_status(&self, uuid: &str) -> Result<Value, TaskError> {
        let record = self
            .manager
            .get_task(uuid)
            .await?
            .ok_or_else(|| TaskError::NotFound {
                uuid: uuid.to_string(),
            })?;
        Ok(serde_json::to_value(record).map_err(StorageError::from)?)
    }

    /// `task/<uuid>/log`: the live buffer while the job runs, the
    /// persisted blob afterwards. Log bytes are rendered lossily as UTF-8.
    pub async fn handle_task_log(&self, uuid: &str) -> Result<Value, TaskError> {
        if self.manager.get_task(uuid).await?.is_none() {
            return Err(TaskError::NotFound {
                uuid: uuid.to_string(),
            });
        }
        let log = self.manager.get_task_log(uuid).await?.unwrap_or_default();
        Ok(json!({
            "uuid": uuid,
            "log": String::from_utf8_lossy(&log),
        }))
    }

    /// `task/<uuid>/cancel`: cancel the running task; `canceled` reports
    /// whether the UUID matched the in-flight job.
    pub async fn handle_task_cancel(&self, uuid: &str) -> Result<Value, TaskError> {
        let canceled = self.manager.cancel_task_by_uuid(uuid);
        Ok(json!({
            "uuid": uuid,
            "canceled": canceled,
        }))
    }

    /// `target/`: the configured publishing targets.
    pub fn handle_target_list(&self) -> Result<Value, TaskError> {
        let targets = serde_json::to_value(&self.targets).map_err(StorageError::from)?;
        Ok(json!({ "targets": targets }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::action;
    use crate::store::{InMemoryBackend, StorageBackend};
    use tokio_util::sync::CancellationToken;

    async fn router() -> (TaskPathRouter, Arc<TaskManager>) {
        let backend: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
        let manager = TaskManager::new(backend).await.unwrap();
        (
            TaskPathRouter::new(Arc::clone(&manager)).with_targets(vec![PublishTarget {
                name: "stable".to_string(),
                repository_url: "https://repo.example.com/stable".to_string(),
            }]),
            manager,
        )
    }

    async fn wait_completed(manager: &TaskManager, uuid: &str) {
        loop {
            if let Some(record) = manager.get_task(uuid).await.unwrap() {
                if record.status == crate::domain::TaskStatus::Completed {
                    return;
                }
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn task_list_path_lists_records() {
        let (router, manager) = router().await;

        let empty = router.handle("task/").await.unwrap();
        assert_eq!(empty["tasks"], json!([]));

        let uuid = manager
            .add_task(CancellationToken::new(), action(|_ctx| async { Ok(()) }))
            .await
            .unwrap();
        wait_completed(&manager, &uuid).await;

        let listed = router.handle("task/").await.unwrap();
        assert_eq!(listed["tasks"][0]["uuid"], json!(uuid));
        assert_eq!(listed["tasks"][0]["status"], json!("COMPLETED"));

        manager.stop().await;
    }

    #[tokio::test]
    async fn task_status_path_reads_record() {
        let (router, manager) = router().await;
        let uuid = manager
            .add_task(CancellationToken::new(), action(|_ctx| async { Ok(()) }))
            .await
            .unwrap();
        wait_completed(&manager, &uuid).await;

        let status = router.handle(&format!("task/{uuid}")).await.unwrap();
        assert_eq!(status["uuid"], json!(uuid));
        assert_eq!(status["status"], json!("COMPLETED"));
        assert_eq!(status["reason"], json!(""));

        manager.stop().await;
    }

    #[tokio::test]
    async fn task_status_path_unknown_uuid_is_not_found() {
        let (router, manager) = router().await;
        let result = router.handle("task/no-such-task").await;
        assert!(matches!(result, Err(TaskError::NotFound { uuid }) if uuid == "no-such-task"));
        manager.stop().await;
    }

    #[tokio::test]
    async fn task_log_path_reads_persisted_log() {
        let (router, manager) = router().await;
        let uuid = manager
            .add_task(
                CancellationToken::new(),
                action(|ctx| async move {
                    ctx.log().append_str("published 3 artifacts");
                    Ok(())
                }),
            )
            .await
            .unwrap();
        wait_completed(&manager, &uuid).await;

        let log = router.handle(&format!("task/{uuid}/log")).await.unwrap();
        assert_eq!(log["uuid"], json!(uuid));
        assert_eq!(log["log"], json!("published 3 artifacts"));

        manager.stop().await;
    }

    #[tokio::test]
    async fn task_log_path_unknown_uuid_is_not_found() {
        let (router, manager) = router().await;
        let result = router.handle("task/missing/log").await;
        assert!(matches!(result, Err(TaskError::NotFound { .. })));
        manager.stop().await;
    }

    #[tokio::test]
    async fn task_cancel_path_reports_unmatched_uuid() {
        let (router, manager) = router().await;
        let result = router.handle("task/nothing-running/cancel").await.unwrap();
        assert_eq!(result["canceled"], json!(false));
        manager.stop().await;
    }

    #[tokio::test]
    async fn target_path_enumerates_configured_targets() {
        let (router, manager) = router().await;
        let targets = router.handle("target/").await.unwrap();
        assert_eq!(targets["targets"][0]["name"], json!("stable"));
        assert_eq!(
            targets["targets"][0]["repository_url"],
            json!("https://repo.example.com/stable")
        );
        manager.stop().await;
    }

    #[tokio::test]
    async fn unknown_paths_are_rejected() {
        let (router, manager) = router().await;
        for path in ["", "release", "task/x/unknown", "task//log", "target/x"] {
            let result = router.handle(path).await;
            assert!(
                matches!(result, Err(TaskError::UnknownPath { .. })),
                "path {path:?} should not dispatch"
            );
        }
        manager.stop().await;
    }
}
