//! Task-manager core for a release-publishing secrets plugin.
//!
//! This crate accepts long-running publish actions, executes them one at a
//! time under the host process, and exposes status, log, and cancellation
//! against persistent state. The host's key-value store is consumed
//! through the opaque [`StorageBackend`] trait; everything above it is the
//! crate's responsibility:
//!
//! - [`log_buffer`] - thread-safe append-only log, readable mid-flight
//! - [`job`] - execution envelope: cancellable scope, log buffer, action
//! - [`worker`] - single-consumer loop with inspection and cancellation
//! - [`store`] - storage codec and fixed-key conventions
//! - [`manager`] - admission policies, lifecycle persistence, recovery
//! - [`router`] - path-shaped adapters onto the manager
//!
//! # Lifecycle
//!
//! ```text
//! admission -> QUEUED -> RUNNING -> COMPLETED | FAILED
//! ```
//!
//! Admission persists a QUEUED record and enqueues the task; the worker
//! flips it to RUNNING on pickup and to a terminal status when the action
//! returns. Cancellation is cooperative and terminates as FAILED with the
//! cancellation message as the reason. Stale records left by a crash are
//! swept to FAILED on the next start.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use publisher_tasks::{action, InMemoryBackend, TaskManager, TaskStatus};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let manager = TaskManager::new(Arc::new(InMemoryBackend::new()))
//!     .await
//!     .unwrap();
//!
//! let uuid = manager
//!     .add_task(
//!         CancellationToken::new(),
//!         action(|ctx| async move {
//!             ctx.log().append_str("release published\n");
//!             Ok(())
//!         }),
//!     )
//!     .await
//!     .unwrap();
//!
//! // Callers poll the record for the terminal status.
//! loop {
//!     let record = manager.get_task(&uuid).await.unwrap().unwrap();
//!     if record.status == TaskStatus::Completed {
//!         break;
//!     }
//!     tokio::task::yield_now().await;
//! }
//! # manager.stop().await;
//! # });
//! ```

pub mod constants;
pub mod domain;
pub mod error;
pub mod job;
pub mod log_buffer;
pub mod manager;
pub mod router;
pub mod store;
pub mod worker;

pub use domain::{TaskRecord, TaskStatus};
pub use error::TaskError;
pub use job::{action, Action, ActionContext, ActionFuture, Job};
pub use log_buffer::{LogBuffer, LogWriter};
pub use manager::{ManagerConfig, TaskManager};
pub use router::{PublishTarget, TaskPathRouter};
pub use store::{InMemoryBackend, StorageBackend, StorageError};
pub use worker::{TaskCallbacks, Worker};
