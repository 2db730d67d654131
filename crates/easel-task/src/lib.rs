//! Easel Task
//!
//! The scheduling primitive underneath async storage. Handlers run on one
//! logical context and must never wait on the network, so every retrieval is
//! handed to a [`TaskRunner`], which runs it on the tokio runtime and tracks
//! it until it finishes.
//!
//! The runner knows nothing about stores or events. A background operation is
//! labelled with the [`PendingFetch`] it serves so logs and shutdown can name
//! it; what the operation does on completion is up to the caller.

mod error;
mod runner;

pub use easel_config::ShutdownMode;
pub use error::TaskError;
pub use runner::{PendingFetch, TaskId, TaskRunner};
