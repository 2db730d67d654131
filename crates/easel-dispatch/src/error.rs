use crate::event::EventName;

/// Failure reported by a handler.
///
/// Storage failures never show up here; handlers learn about them by
/// querying the entry status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
  pub message: String,
}

impl HandlerError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// Errors produced by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
  /// A handler is already bound to this event.
  #[error("a handler is already registered for event '{event}'")]
  DuplicateRegistration { event: EventName },

  /// The handler for this event returned an error.
  #[error("handler for event '{event}' failed: {source}")]
  Handler {
    event: EventName,
    #[source]
    source: HandlerError,
  },

  /// The dispatcher has been dropped; events can no longer be raised.
  #[error("dispatcher mailbox closed")]
  MailboxClosed,
}
