//! Easel Dispatch
//!
//! Routes named events to handlers, one at a time, on a single logical
//! context.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   raise(event)    ┌──────────────────────────┐
//! │  DispatcherHandle    │ ────────────────▶ │                          │
//! │  (any thread)        │                   │         Mailbox          │
//! └──────────────────────┘                   │  unbounded mpsc channel  │
//! ┌──────────────────────┐ Completion{key}   │                          │
//! │  Storage background  │ ────────────────▶ │                          │
//! │  fetch (runner)      │                   └────────────┬─────────────┘
//! └──────────────────────┘                                │
//!                                                         ▼
//!                                      ┌──────────────────────────────────┐
//!                                      │            Dispatcher            │
//!                                      │  - owns HandlerTable             │
//!                                      │  - completion → "<key>_fetch"    │
//!                                      │  - invokes one handler at a time │
//!                                      └──────────────────────────────────┘
//! ```
//!
//! Handlers receive the [`Storage`](easel_storage::Storage) facade and may
//! call `fetch`, which returns immediately. The completion comes back through
//! the mailbox as a message rather than a callback, so it is dispatched only
//! after the current handler returns and never from a background thread.
//!
//! # Usage
//!
//! ```ignore
//! let mailbox = Mailbox::new();
//! let storage = Storage::new(fetcher, TaskRunner::current()?, mailbox.notifier());
//!
//! let mut table = HandlerTable::new();
//! table.register("init", |storage: &Storage| -> Result<(), HandlerError> {
//!     storage.fetch("https://example.com/README.md", "read_me");
//!     Ok(())
//! })?;
//! table.register("read_me_fetch", |storage: &Storage| -> Result<(), HandlerError> {
//!     println!("{:?}", storage.get("read_me"));
//!     Ok(())
//! })?;
//!
//! let mut dispatcher = Dispatcher::new(table, storage, mailbox);
//! dispatcher.dispatch(&EventName::init())?;
//! dispatcher.run_until_idle().await;
//! ```

mod dispatcher;
mod error;
mod event;
mod handler;
mod mailbox;
mod observer;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{DispatchError, HandlerError};
pub use event::{COMPLETION_SUFFIX, EventName};
pub use handler::{Handler, HandlerTable};
pub use mailbox::{DispatcherHandle, HostMessage, Mailbox, MailboxNotifier};
pub use observer::{ChannelObserver, DispatchEvent, DispatchObserver, NoopObserver};
