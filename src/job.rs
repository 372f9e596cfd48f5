//! Job: the live execution envelope of one task inside the worker.
//!
//! A [`Task`] is the transient queue element an admission produces; the
//! worker turns it into a [`Job`] on dequeue. The job derives a child
//! cancellation token from the task's base token (so cancelling the job
//! never cancels the caller's scope), installs a [`LogBuffer`], and runs
//! the action exactly once with an [`ActionContext`] carrying both.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::log_buffer::LogBuffer;

/// Boxed future returned by an action.
pub type ActionFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// The unit of work: a one-shot closure from [`ActionContext`] to a
/// fallible future. The returned error becomes the task's failure reason.
pub type Action = Box<dyn FnOnce(ActionContext) -> ActionFuture + Send>;

/// Wraps an async closure into a boxed [`Action`].
///
/// # Examples
///
/// ```
/// use publisher_tasks::action;
///
/// let act = action(|ctx| async move {
///     ctx.log().append_str("publishing v1.2.3\n");
///     if ctx.is_cancelled() {
///         anyhow::bail!("publish canceled");
///     }
///     Ok(())
/// });
/// # let _ = act;
/// ```
pub fn action<F, Fut>(f: F) -> Action
where
    F: FnOnce(ActionContext) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Box::new(move |ctx| Box::pin(f(ctx)))
}

/// Execution scope handed to an action: the job's cancellation token and
/// its log buffer.
///
/// Cancellation is cooperative. The action is responsible for observing
/// the token (via [`is_cancelled`](ActionContext::is_cancelled) or
/// [`cancelled`](ActionContext::cancelled)) and returning an error; that
/// error surfaces as the task's failure reason.
#[derive(Clone)]
pub struct ActionContext {
    cancellation: CancellationToken,
    log: LogBuffer,
}

impl ActionContext {
    /// Returns the job's cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns `true` once the job has been canceled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves when the job is canceled. Intended for `tokio::select!`
    /// against the action's own work.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }

    /// Returns the job's log buffer.
    pub fn log(&self) -> &LogBuffer {
        &self.log
    }
}

/// Queue element carrying an admitted task to the worker.
pub struct Task {
    pub(crate) uuid: String,
    pub(crate) base: CancellationToken,
    pub(crate) action: Action,
}

impl Task {
    pub(crate) fn new(uuid: String, base: CancellationToken, action: Action) -> Self {
        Self { uuid, base, action }
    }

    /// Returns the UUID assigned at admission.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }
}

/// Live execution envelope of a task.
///
/// Owned by the worker for the duration of the run; inspectors only ever
/// see a borrow guarded by the worker's mutex. The job does not interpret
/// the action's result -- the worker does.
pub struct Job {
    task_uuid: String,
    cancellation: CancellationToken,
    log: LogBuffer,
    action: Mutex<Option<Action>>,
}

impl Job {
    /// Builds a job from a dequeued task, deriving a fresh cancellable
    /// scope from the task's base token.
    pub(crate) fn new(task: Task) -> Self {
        Self {
            task_uuid: task.uuid,
            cancellation: task.base.child_token(),
            log: LogBuffer::new(),
            action: Mutex::new(Some(task.action)),
        }
    }

    /// Returns the UUID of the underlying task.
    pub fn uuid(&self) -> &str {
        &self.task_uuid
    }

    /// Returns a copy of the log written so far.
    pub fn log_snapshot(&self) -> Vec<u8> {
        self.log.snapshot()
    }

    /// Cancels the job's scope. The action observes this cooperatively.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Runs the action and returns its result unchanged.
    ///
    /// # Panics
    ///
    /// Panics if called twice; the worker runs each job exactly once.
    pub async fn run(&self) -> anyhow::Result<()> {
        let action = self
            .action
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| panic!("job {} already ran its action", self.task_uuid));

        let ctx = ActionContext {
            cancellation: self.cancellation.clone(),
            log: self.log.clone(),
        };
        action(ctx).await
    }
}
