//! Task manager: admission control, lifecycle persistence, recovery.
//!
//! [`TaskManager`] is the front door of the crate. It owns the storage
//! handle, the bounded channel into the [`Worker`], and the mutex that
//! serializes every persistence transition. Admission follows one
//! discipline everywhere: acquire the mutex, decide, write the QUEUED
//! record, release the mutex, then send to the channel. The mutex is never
//! held across the send -- a full queue must not deadlock an admission
//! against an in-progress lifecycle callback.
//!
//! # Recovery
//!
//! Two sweeps re-establish the cross-key invariants after a crash:
//!
//! - inside the started callback, any record still RUNNING belongs to a
//!   previous process life and is rewritten to FAILED;
//! - at construction (default on), RUNNING *and* QUEUED residue is marked
//!   FAILED -- the channel is necessarily empty at that point, so neither
//!   can correspond to live work -- and legacy `queue_task/` keys are
//!   removed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::{LEGACY_QUEUE_TASK_PREFIX, STALE_TASK_REASON, TASK_QUEUE_CAPACITY};
use crate::domain::{TaskRecord, TaskStatus};
use crate::error::TaskError;
use crate::job::{Action, Task};
use crate::store::{self, StorageBackend, StorageError};
use crate::worker::{TaskCallbacks, Worker};

/// Manager configuration.
///
/// | Setting | Default | Description |
/// |---|---|---|
/// | `queue_capacity` | 128 | Bound of the admission channel |
/// | `sweep_on_start` | `true` | Sweep stale records at construction |
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Capacity of the bounded task channel. Admissions that find the
    /// channel full fail with [`TaskError::QueueOverflow`].
    pub queue_capacity: usize,

    /// Whether construction sweeps stale QUEUED/RUNNING records and legacy
    /// queue keys before the worker starts.
    pub sweep_on_start: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: TASK_QUEUE_CAPACITY,
            sweep_on_start: true,
        }
    }
}

/// Which stale record classes a sweep rewrites.
#[derive(Debug, Clone, Copy)]
enum StaleScope {
    /// Only RUNNING records; used inside the started callback, where the
    /// task being started is still QUEUED.
    RunningOnly,
    /// RUNNING and QUEUED records; used at construction, where the empty
    /// channel proves both classes are crash residue.
    RunningAndQueued,
}

/// Storage handle plus the mutex serializing persistence transitions.
/// Shared between the manager (admission) and the worker (callbacks).
struct LifecycleState {
    storage: Arc<dyn StorageBackend>,
    lock: tokio::sync::Mutex<()>,
}

impl LifecycleState {
    /// Terminal transition shared by the completed and failed callbacks:
    /// clear the pointer, flip the record, persist the captured log.
    async fn finish_task(
        &self,
        uuid: &str,
        log: Vec<u8>,
        error: Option<anyhow::Error>,
    ) -> Result<(), TaskError> {
        let _guard = self.lock.lock().await;
        let storage = self.storage.as_ref();

        store::clear_current_running_task(storage).await?;

        let mut record = store::get_task(storage, uuid)
            .await?
            .unwrap_or_else(|| panic!("task {uuid:?} not found in storage"));

        record.modified = Utc::now();
        record.status = match &error {
            Some(_) => TaskStatus::Failed,
            None => TaskStatus::Completed,
        };
        if let Some(err) = error {
            record.reason = err.to_string();
        }

        store::put_task(storage, &record).await?;
        store::put_task_log(storage, uuid, &log).await?;

        debug!(task_uuid = %uuid, status = %record.status, "task finished");
        Ok(())
    }
}

#[async_trait]
impl TaskCallbacks for LifecycleState {
    async fn task_started(&self, uuid: &str) -> Result<(), TaskError> {
        let _guard = self.lock.lock().await;
        let storage = self.storage.as_ref();

        // A record still RUNNING here was left behind by a previous
        // process life; the worker runs one job at a time and this one is
        // only now starting.
        mark_stale_tasks_as_failed(storage, StaleScope::RunningOnly).await?;

        store::clear_current_running_task(storage).await?;

        let mut record = store::get_task(storage, uuid)
            .await?
            .unwrap_or_else(|| panic!("task {uuid:?} not found in storage"));

        debug_assert!(
            record.status.can_transition_to(TaskStatus::Running),
            "task {uuid} started from status {}",
            record.status
        );
        record.status = TaskStatus::Running;
        record.modified = Utc::now();
        store::put_task(storage, &record).await?;

        store::set_current_running_task(storage, uuid).await?;
        Ok(())
    }

    async fn task_completed(&self, uuid: &str, log: Vec<u8>) -> Result<(), TaskError> {
        self.finish_task(uuid, log, None).await
    }

    async fn task_failed(
        &self,
        uuid: &str,
        log: Vec<u8>,
        error: anyhow::Error,
    ) -> Result<(), TaskError> {
        self.finish_task(uuid, log, Some(error)).await
    }
}

/// Serializes long-running publish actions: one at a time, persisted
/// lifecycle, inspectable and cancelable while in flight.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use publisher_tasks::{action, InMemoryBackend, TaskManager};
/// use tokio_util::sync::CancellationToken;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let manager = TaskManager::new(Arc::new(InMemoryBackend::new()))
///     .await
///     .unwrap();
///
/// let uuid = manager
///     .add_task(
///         CancellationToken::new(),
///         action(|ctx| async move {
///             ctx.log().append_str("publishing\n");
///             Ok(())
///         }),
///     )
///     .await
///     .unwrap();
/// assert!(!uuid.is_empty());
/// # manager.stop().await;
/// # });
/// ```
pub struct TaskManager {
    state: Arc<LifecycleState>,
    queue: mpsc::Sender<Task>,
    worker: Worker,
}

impl TaskManager {
    /// Creates a manager with the default [`ManagerConfig`] and starts its
    /// worker. Must be called inside a tokio runtime.
    pub async fn new(storage: Arc<dyn StorageBackend>) -> Result<Arc<Self>, TaskError> {
        Self::with_config(storage, ManagerConfig::default()).await
    }

    /// Creates a manager with an explicit configuration.
    pub async fn with_config(
        storage: Arc<dyn StorageBackend>,
        config: ManagerConfig,
    ) -> Result<Arc<Self>, TaskError> {
        let state = Arc::new(LifecycleState {
            storage,
            lock: tokio::sync::Mutex::new(()),
        });

        if config.sweep_on_start {
            sweep_at_construction(state.storage.as_ref()).await?;
        }

        let (queue, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let callbacks: Arc<dyn TaskCallbacks> = state.clone();
        let worker = Worker::spawn(receiver, callbacks);

        Ok(Arc::new(Self {
            state,
            queue,
            worker,
        }))
    }

    /// Strict single-flight admission: succeeds only when nothing is
    /// running or queued, otherwise returns [`TaskError::Busy`].
    ///
    /// On success the returned UUID addresses the persisted record; the
    /// action starts asynchronously (there is no ordering guarantee
    /// between this call returning and the action having started).
    pub async fn run_task(
        &self,
        scope: CancellationToken,
        act: Action,
    ) -> Result<String, TaskError> {
        let record = {
            let _guard = self.state.lock.lock().await;
            let storage = self.state.storage.as_ref();

            if store::current_running_task_uuid(storage).await?.is_some() {
                return Err(TaskError::Busy);
            }
            if !self.queue_is_empty() || has_queued_record(storage).await? {
                return Err(TaskError::Busy);
            }
            self.persist_queued().await?
        };
        self.enqueue(record, scope, act).await
    }

    /// Unconditional admission: always persists and enqueues (subject to
    /// channel capacity).
    pub async fn add_task(
        &self,
        scope: CancellationToken,
        act: Action,
    ) -> Result<String, TaskError> {
        let record = {
            let _guard = self.state.lock.lock().await;
            self.persist_queued().await?
        };
        self.enqueue(record, scope, act).await
    }

    /// Coalescing admission: enqueues only when no QUEUED record exists,
    /// otherwise returns `Ok(None)` without admitting.
    pub async fn add_optional_task(
        &self,
        scope: CancellationToken,
        act: Action,
    ) -> Result<Option<String>, TaskError> {
        let record = {
            let _guard = self.state.lock.lock().await;
            if has_queued_record(self.state.storage.as_ref()).await? {
                return Ok(None);
            }
            self.persist_queued().await?
        };
        self.enqueue(record, scope, act).await.map(Some)
    }

    /// Cancels the currently running task if its UUID matches.
    ///
    /// Returns `false` for unknown, queued, or already finished tasks.
    /// Cancellation is cooperative: the terminal status arrives later,
    /// as FAILED with the action's cancellation message.
    pub fn cancel_task_by_uuid(&self, uuid: &str) -> bool {
        self.worker.cancel_running_job(uuid)
    }

    /// Reads the persisted record for `uuid`, or `None` if absent.
    pub async fn get_task(&self, uuid: &str) -> Result<Option<TaskRecord>, TaskError> {
        Ok(store::get_task(self.state.storage.as_ref(), uuid).await?)
    }

    /// Reads the log for `uuid`: the live buffer while the job runs, the
    /// persisted blob afterwards, `None` if neither exists.
    pub async fn get_task_log(&self, uuid: &str) -> Result<Option<Vec<u8>>, TaskError> {
        let mut live = None;
        if self
            .worker
            .hold_running_job(uuid, |job| live = Some(job.log_snapshot()))
        {
            return Ok(live);
        }
        Ok(store::get_task_log(self.state.storage.as_ref(), uuid).await?)
    }

    /// Lists all persisted task records, newest first.
    pub async fn list_tasks(&self) -> Result<Vec<TaskRecord>, TaskError> {
        let storage = self.state.storage.as_ref();
        let mut records = Vec::new();
        for uuid in store::list_task_uuids(storage).await? {
            if let Some(record) = store::get_task(storage, &uuid).await? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(records)
    }

    /// Stops the worker: cancels the running job, drains no further
    /// tasks, and returns after the in-flight job's terminal callback.
    /// Admissions after this fail with [`TaskError::WorkerUnavailable`].
    pub async fn stop(&self) {
        self.worker.stop().await;
    }

    /// Manager wired to a parked queue and no worker loop, for admission
    /// tests that inspect the channel directly.
    #[cfg(test)]
    fn with_parked_worker(
        storage: Arc<dyn StorageBackend>,
        queue_capacity: usize,
    ) -> (Self, mpsc::Receiver<Task>) {
        let state = Arc::new(LifecycleState {
            storage,
            lock: tokio::sync::Mutex::new(()),
        });
        let (queue, receiver) = mpsc::channel(queue_capacity);
        (
            Self {
                state,
                queue,
                worker: Worker::detached(),
            },
            receiver,
        )
    }

    fn queue_is_empty(&self) -> bool {
        self.queue.capacity() == self.queue.max_capacity()
    }

    /// Writes a fresh QUEUED record. Caller holds the manager mutex.
    async fn persist_queued(&self) -> Result<TaskRecord, TaskError> {
        let record = TaskRecord::new_queued();
        store::put_task(self.state.storage.as_ref(), &record).await?;
        debug!(task_uuid = %record.uuid, "task admitted");
        Ok(record)
    }

    /// Sends the task to the worker, outside the manager mutex. On a full
    /// or closed channel the QUEUED record is rolled back so it cannot
    /// wedge later admissions.
    async fn enqueue(
        &self,
        record: TaskRecord,
        scope: CancellationToken,
        act: Action,
    ) -> Result<String, TaskError> {
        let uuid = record.uuid;
        match self.queue.try_send(Task::new(uuid.clone(), scope, act)) {
            Ok(()) => Ok(uuid),
            Err(send_err) => {
                let admission_err = match send_err {
                    TrySendError::Full(_) => TaskError::QueueOverflow,
                    TrySendError::Closed(_) => TaskError::WorkerUnavailable,
                };
                let _guard = self.state.lock.lock().await;
                if let Err(delete_err) = self
                    .state
                    .storage
                    .delete(&store::task_key(&uuid))
                    .await
                {
                    warn!(
                        task_uuid = %uuid,
                        error = %delete_err,
                        "failed to roll back record of unenqueued task"
                    );
                }
                Err(admission_err)
            }
        }
    }
}

/// Returns `true` if any persisted record is still QUEUED.
async fn has_queued_record(storage: &dyn StorageBackend) -> Result<bool, StorageError> {
    for uuid in store::list_task_uuids(storage).await? {
        if let Some(record) = store::get_task(storage, &uuid).await? {
            if record.status == TaskStatus::Queued {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Rewrites stale records to FAILED with the stale reason. Returns the
/// number of records swept. Caller holds the manager mutex (or is the
/// constructor, before any concurrency exists).
async fn mark_stale_tasks_as_failed(
    storage: &dyn StorageBackend,
    scope: StaleScope,
) -> Result<usize, StorageError> {
    let mut swept = 0;
    for uuid in store::list_task_uuids(storage).await? {
        let Some(mut record) = store::get_task(storage, &uuid).await? else {
            continue;
        };
        let stale = match record.status {
            TaskStatus::Running => true,
            TaskStatus::Queued => matches!(scope, StaleScope::RunningAndQueued),
            _ => false,
        };
        if !stale {
            continue;
        }

        warn!(task_uuid = %uuid, status = %record.status, "marking stale task record as failed");
        record.status = TaskStatus::Failed;
        record.modified = Utc::now();
        record.reason = STALE_TASK_REASON.to_string();
        store::put_task(storage, &record).await?;
        swept += 1;
    }
    Ok(swept)
}

/// Construction-time recovery: both stale record classes, the pointer,
/// and the legacy queue listing.
async fn sweep_at_construction(storage: &dyn StorageBackend) -> Result<(), StorageError> {
    let swept = mark_stale_tasks_as_failed(storage, StaleScope::RunningAndQueued).await?;
    store::clear_current_running_task(storage).await?;

    for suffix in storage.list(LEGACY_QUEUE_TASK_PREFIX).await? {
        storage
            .delete(&format!("{LEGACY_QUEUE_TASK_PREFIX}{suffix}"))
            .await?;
    }

    if swept > 0 {
        info!(count = swept, "swept stale task records at startup");
    }
    Ok(())
}
