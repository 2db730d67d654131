use easel_storage::Storage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::DispatchError;
use crate::event::EventName;
use crate::handler::HandlerTable;
use crate::mailbox::{DispatcherHandle, HostMessage, Mailbox};
use crate::observer::{DispatchEvent, DispatchObserver, NoopObserver};

/// Result of dispatching one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
  /// The bound handler ran.
  Handled,
  /// No handler is bound; nothing happened.
  Unhandled,
}

/// Invokes handlers for events, one at a time.
///
/// The dispatcher owns its handler table and mailbox. Handlers only ever run
/// on the context that calls into the dispatcher; fetch completions reach it
/// as mailbox messages.
///
/// Generic over `O: DispatchObserver`. Use `Dispatcher::new()` for a
/// dispatcher that reports nothing, or `Dispatcher::with_observer()`.
pub struct Dispatcher<O: DispatchObserver = NoopObserver> {
  table: HandlerTable,
  storage: Storage,
  mailbox: Mailbox,
  observer: O,
}

impl Dispatcher<NoopObserver> {
  /// `storage` should report completions through `mailbox.notifier()`.
  pub fn new(table: HandlerTable, storage: Storage, mailbox: Mailbox) -> Self {
    Self::with_observer(table, storage, mailbox, NoopObserver)
  }
}

impl<O: DispatchObserver> Dispatcher<O> {
  pub fn with_observer(table: HandlerTable, storage: Storage, mailbox: Mailbox, observer: O) -> Self {
    info!(handlers = table.len(), "dispatcher ready");
    Self {
      table,
      storage,
      mailbox,
      observer,
    }
  }

  /// Run the handler bound to `event`, if any, on the calling context.
  ///
  /// Unknown events are not an error. A handler error is returned to the
  /// caller; the dispatcher stays usable.
  pub fn dispatch(&mut self, event: &EventName) -> Result<DispatchOutcome, DispatchError> {
    let Some(handler) = self.table.get_mut(event.as_str()) else {
      debug!(event = %event, "no handler registered, ignoring event");
      self.observer.observe(DispatchEvent::Ignored {
        event: event.clone(),
      });
      return Ok(DispatchOutcome::Unhandled);
    };

    debug!(event = %event, "dispatching event");

    match handler.handle(&self.storage) {
      Ok(()) => {
        self.observer.observe(DispatchEvent::Handled {
          event: event.clone(),
        });
        Ok(DispatchOutcome::Handled)
      }
      Err(source) => {
        self.observer.observe(DispatchEvent::HandlerFailed {
          event: event.clone(),
          error: source.to_string(),
        });
        Err(DispatchError::Handler {
          event: event.clone(),
          source,
        })
      }
    }
  }

  /// Dispatch every message already in the mailbox without waiting.
  ///
  /// Returns the number of messages processed.
  pub fn dispatch_pending(&mut self) -> usize {
    let mut processed = 0;
    while let Ok(message) = self.mailbox.receiver.try_recv() {
      self.process(message);
      processed += 1;
    }
    processed
  }

  /// Dispatch messages until no fetch is in flight and the mailbox is empty.
  ///
  /// Returns the number of messages processed. Events raised through a
  /// [`DispatcherHandle`] after this returns stay queued.
  pub async fn run_until_idle(&mut self) -> usize {
    let mut processed = 0;

    loop {
      processed += self.dispatch_pending();

      if self.storage.in_flight() == 0 {
        // A fetch stops counting only after its completion was posted, so
        // anything it sent is already queued here.
        match self.mailbox.receiver.try_recv() {
          Ok(message) => {
            self.process(message);
            processed += 1;
            continue;
          }
          Err(_) => break,
        }
      }

      tokio::select! {
          message = self.mailbox.receiver.recv() => {
              match message {
                  Some(message) => {
                      self.process(message);
                      processed += 1;
                  }
                  None => break,
              }
          }
          _ = self.storage.wait_idle() => {}
      }
    }

    debug!(processed, "dispatcher idle");
    processed
  }

  /// Dispatch messages until the cancellation token is triggered.
  pub async fn run(mut self, cancel: CancellationToken) {
    info!("starting dispatch loop");

    loop {
      tokio::select! {
          _ = cancel.cancelled() => {
              info!("dispatch loop cancelled");
              break;
          }
          message = self.mailbox.receiver.recv() => {
              match message {
                  Some(message) => self.process(message),
                  None => {
                      info!("dispatcher mailbox closed");
                      break;
                  }
              }
          }
      }
    }
  }

  /// Handle for raising events from other threads or tasks.
  pub fn handle(&self) -> DispatcherHandle {
    self.mailbox.handle()
  }

  pub fn storage(&self) -> &Storage {
    &self.storage
  }

  pub fn table(&self) -> &HandlerTable {
    &self.table
  }

  fn process(&mut self, message: HostMessage) {
    if let HostMessage::Completed(completion) = &message {
      debug!(key = %completion.key, status = %completion.status, "fetch completion received");
    }

    let event = message.event();
    if let Err(e) = self.dispatch(&event) {
      error!(event = %event, error = %e, "event handler failed");
    }
  }
}
