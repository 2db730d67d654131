use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use easel_config::ShutdownMode;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::error::TaskError;

/// Identifier assigned to each scheduled background operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "task-{}", self.0)
  }
}

/// An in-flight retrieval: the target being fetched and the key its result
/// will be stored under. Lives only as long as the background operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFetch {
  pub target: String,
  pub key: String,
}

impl PendingFetch {
  pub fn new(target: impl Into<String>, key: impl Into<String>) -> Self {
    Self {
      target: target.into(),
      key: key.into(),
    }
  }
}

/// Runs background operations on a tokio runtime and tracks them until they
/// finish.
///
/// Cloning is cheap; clones share the same tracker, so `in_flight` and
/// `shutdown` see work spawned through any clone.
#[derive(Clone)]
pub struct TaskRunner {
  handle: Handle,
  tracker: TaskTracker,
  cancel: CancellationToken,
  next_id: Arc<AtomicU64>,
}

impl TaskRunner {
  /// Create a runner that spawns onto the given runtime.
  pub fn new(handle: Handle) -> Self {
    Self {
      handle,
      tracker: TaskTracker::new(),
      cancel: CancellationToken::new(),
      next_id: Arc::new(AtomicU64::new(1)),
    }
  }

  /// Create a runner bound to the runtime of the calling context.
  pub fn current() -> Result<Self, TaskError> {
    let handle = Handle::try_current().map_err(|e| TaskError::NoRuntime {
      message: e.to_string(),
    })?;
    Ok(Self::new(handle))
  }

  /// Schedule `work` in the background and return immediately.
  ///
  /// The work is dropped at its next await point if the runner is shut down
  /// with [`ShutdownMode::Abandon`], so it must not leave shared state half
  /// written across an await.
  pub fn spawn<F>(&self, pending: PendingFetch, work: F) -> Result<TaskId, TaskError>
  where
    F: Future<Output = ()> + Send + 'static,
  {
    if self.tracker.is_closed() {
      return Err(TaskError::ShuttingDown);
    }

    let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let cancel = self.cancel.clone();

    debug!(
      task_id = %id,
      key = %pending.key,
      url = %pending.target,
      "scheduling background fetch"
    );

    self.tracker.spawn_on(
      async move {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(
                    task_id = %id,
                    key = %pending.key,
                    "background fetch abandoned"
                );
            }
            _ = work => {
                debug!(task_id = %id, key = %pending.key, "background fetch finished");
            }
        }
      },
      &self.handle,
    );

    Ok(id)
  }

  /// Number of background operations that have not finished yet.
  pub fn in_flight(&self) -> usize {
    self.tracker.len()
  }

  /// Whether `shutdown` has been called.
  pub fn is_shutting_down(&self) -> bool {
    self.tracker.is_closed()
  }

  /// Stop accepting work and deal with what is still running.
  ///
  /// With [`ShutdownMode::Drain`] this waits for every in-flight operation;
  /// with [`ShutdownMode::Abandon`] they are cancelled and this returns once
  /// they have all been dropped.
  pub async fn shutdown(&self, mode: ShutdownMode) {
    self.tracker.close();

    info!(in_flight = self.in_flight(), ?mode, "shutting down task runner");

    if mode == ShutdownMode::Abandon {
      self.cancel.cancel();
    }

    self.tracker.wait().await;
  }
}

impl fmt::Debug for TaskRunner {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskRunner")
      .field("in_flight", &self.in_flight())
      .field("shutting_down", &self.is_shutting_down())
      .finish()
  }
}
