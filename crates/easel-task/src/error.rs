/// Errors returned when scheduling background work.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
  /// The runner has been shut down and accepts no new work.
  #[error("task runner is shutting down")]
  ShuttingDown,

  /// No tokio runtime was available to run background work on.
  #[error("no async runtime available: {message}")]
  NoRuntime { message: String },
}
