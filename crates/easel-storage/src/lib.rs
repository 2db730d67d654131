//! Easel Storage
//!
//! Key-value storage whose values arrive from background fetches.
//!
//! ```text
//!  handler ── fetch(target, key) ──▶ Store: key = Pending
//!     │                               │
//!     │ (returns immediately)         ▼
//!     │                         TaskRunner ── Fetcher::fetch(target)
//!     │                               │
//!     │                               ▼
//!     │                         Store: key = Ready(body) | Failed(error)
//!     │                               │
//!     ▼                               ▼
//!  get(key) ◀────────────────  CompletionNotifier::notify(key)
//! ```
//!
//! A key is fetched at most once. Its entry moves from pending to ready or
//! failed exactly once, and the completion notification is sent only after
//! that move is visible to readers.

mod entry;
mod notifier;
mod storage;
mod store;

pub use entry::{EntryStatus, StoreEntry};
pub use notifier::{ChannelNotifier, Completion, CompletionNotifier, NoopNotifier};
pub use storage::{FetchOutcome, Storage};
