//! Single-consumer worker loop.
//!
//! The worker drains the bounded task channel one task at a time on a
//! dedicated tokio task. For each dequeued [`Task`] it builds a [`Job`],
//! publishes it as the current job, fires the started callback, runs the
//! action, and fires exactly one terminal callback with the captured log.
//! Callback failures are logged and do not alter the sequence; the worker
//! never retries, never restarts a failed action, and never drops a
//! dequeued task.
//!
//! Inspection of the in-flight job (`has` / `hold` / `cancel`) goes
//! through the current-job slot, guarded by a mutex shared between the
//! loop and inspectors.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::job::{Job, Task};

/// Lifecycle callbacks the worker fires around each job.
///
/// The manager implements this to persist lifecycle transitions. Callback
/// errors are surfaced to the worker, which logs them and proceeds -- the
/// side effect of a callback is persistence, and a persistence failure
/// must not wedge the execution loop.
#[async_trait]
pub trait TaskCallbacks: Send + Sync {
    /// Fired after the job is published as current, before the action runs.
    async fn task_started(&self, uuid: &str) -> Result<(), TaskError>;

    /// Fired when the action returns success, with the full log.
    async fn task_completed(&self, uuid: &str, log: Vec<u8>) -> Result<(), TaskError>;

    /// Fired when the action returns an error, with the full log and the
    /// error itself.
    async fn task_failed(
        &self,
        uuid: &str,
        log: Vec<u8>,
        error: anyhow::Error,
    ) -> Result<(), TaskError>;
}

type CurrentJobSlot = Arc<Mutex<Option<Arc<Job>>>>;

/// Handle to the worker loop: inspection, cancellation, shutdown.
///
/// The loop itself runs detached; dropping the handle does not stop it.
/// Use [`stop`](Worker::stop) for an orderly shutdown.
pub struct Worker {
    current: CurrentJobSlot,
    shutdown: CancellationToken,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Spawns the worker loop over `receiver`, firing `callbacks` around
    /// each job. Must be called inside a tokio runtime.
    pub fn spawn(receiver: mpsc::Receiver<Task>, callbacks: Arc<dyn TaskCallbacks>) -> Self {
        let current: CurrentJobSlot = Arc::new(Mutex::new(None));
        let shutdown = CancellationToken::new();

        let join = tokio::spawn(worker_loop(
            receiver,
            callbacks,
            Arc::clone(&current),
            shutdown.clone(),
        ));

        Self {
            current,
            shutdown,
            join: Mutex::new(Some(join)),
        }
    }

    /// Returns `true` iff the current job exists and its UUID matches.
    pub fn has_running_job(&self, uuid: &str) -> bool {
        self.lock_current()
            .as_ref()
            .is_some_and(|job| job.uuid() == uuid)
    }

    /// If the current job matches `uuid`, invokes `f` with a borrow of it
    /// while holding the slot mutex and returns `true`.
    ///
    /// `f` must not block: the same mutex gates the worker's clear-slot
    /// step, so holding it delays the next task's bookkeeping.
    pub fn hold_running_job<F>(&self, uuid: &str, f: F) -> bool
    where
        F: FnOnce(&Job),
    {
        let guard = self.lock_current();
        match guard.as_ref() {
            Some(job) if job.uuid() == uuid => {
                f(job);
                true
            }
            _ => false,
        }
    }

    /// If the current job matches `uuid`, cancels its scope and returns
    /// `true`. Unknown or not-yet-started UUIDs return `false`.
    pub fn cancel_running_job(&self, uuid: &str) -> bool {
        let guard = self.lock_current();
        match guard.as_ref() {
            Some(job) if job.uuid() == uuid => {
                job.cancel();
                true
            }
            _ => false,
        }
    }

    /// Stops the loop: cancels the current job's scope, drains no further
    /// tasks, and waits until the in-flight job's terminal callback has
    /// completed. Idempotent.
    ///
    /// # Panics
    ///
    /// Re-raises the panic if the loop itself panicked (a lifecycle
    /// callback hit an invariant violation).
    pub async fn stop(&self) {
        if let Some(job) = self.lock_current().clone() {
            job.cancel();
        }
        self.shutdown.cancel();

        let join = self
            .join
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(join) = join {
            // The loop only ends between jobs, so joining it waits out the
            // terminal callback.
            if let Err(err) = join.await {
                if err.is_panic() {
                    // A panicked loop means a lifecycle invariant was
                    // violated; that must stay fatal, not be absorbed here.
                    std::panic::resume_unwind(err.into_panic());
                }
                tracing::error!(error = %err, "worker loop task failed");
            }
        }
    }

    /// Builds a handle with no loop behind it, for admission tests that
    /// park the queue.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
            shutdown: CancellationToken::new(),
            join: Mutex::new(None),
        }
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<Arc<Job>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn worker_loop(
    mut receiver: mpsc::Receiver<Task>,
    callbacks: Arc<dyn TaskCallbacks>,
    current: CurrentJobSlot,
    shutdown: CancellationToken,
) {
    loop {
        let task = tokio::select! {
            // Shutdown wins over a ready task: stop must drain nothing.
            biased;
            _ = shutdown.cancelled() => break,
            task = receiver.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };

        let job = Arc::new(Job::new(task));
        let uuid = job.uuid().to_string();
        tracing::debug!(task_uuid = %uuid, "worker picked up task");

        set_current(&current, Some(Arc::clone(&job)));

        if let Err(err) = callbacks.task_started(&uuid).await {
            tracing::error!(task_uuid = %uuid, error = %err, "task started callback failed");
        }

        let result = job.run().await;
        let log = job.log_snapshot();

        let callback_result = match result {
            Ok(()) => callbacks.task_completed(&uuid, log).await,
            Err(action_err) => callbacks.task_failed(&uuid, log, action_err).await,
        };
        if let Err(err) = callback_result {
            tracing::error!(task_uuid = %uuid, error = %err, "task terminal callback failed");
        }

        set_current(&current, None);
    }
}

fn set_current(slot: &CurrentJobSlot, job: Option<Arc<Job>>) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = job;
}
