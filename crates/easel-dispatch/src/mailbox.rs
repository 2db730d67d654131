use easel_storage::{Completion, CompletionNotifier};
use tokio::sync::mpsc;

use crate::error::DispatchError;
use crate::event::EventName;

/// A message waiting to be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMessage {
  /// An event raised by the host or another thread.
  Raise(EventName),
  /// A fetch finished; dispatched as the key's completion event.
  Completed(Completion),
}

impl HostMessage {
  /// The event this message dispatches.
  pub fn event(&self) -> EventName {
    match self {
      HostMessage::Raise(event) => event.clone(),
      HostMessage::Completed(completion) => EventName::completion(&completion.key),
    }
  }
}

/// The dispatcher's inbox.
///
/// Create it first so storage can be given its notifier, then hand it to the
/// dispatcher that will drain it.
#[derive(Debug)]
pub struct Mailbox {
  pub(crate) sender: mpsc::UnboundedSender<HostMessage>,
  pub(crate) receiver: mpsc::UnboundedReceiver<HostMessage>,
}

impl Mailbox {
  pub fn new() -> Self {
    let (sender, receiver) = mpsc::unbounded_channel();
    Self { sender, receiver }
  }

  /// Notifier that turns storage completions into mailbox messages.
  pub fn notifier(&self) -> MailboxNotifier {
    MailboxNotifier {
      sender: self.sender.clone(),
    }
  }

  pub fn handle(&self) -> DispatcherHandle {
    DispatcherHandle {
      sender: self.sender.clone(),
    }
  }
}

impl Default for Mailbox {
  fn default() -> Self {
    Self::new()
  }
}

/// [`CompletionNotifier`] that posts completions to a [`Mailbox`].
#[derive(Debug, Clone)]
pub struct MailboxNotifier {
  // Unbounded so a background fetch never waits on a busy handler. At most
  // one completion per key is ever sent.
  sender: mpsc::UnboundedSender<HostMessage>,
}

impl CompletionNotifier for MailboxNotifier {
  fn notify(&self, completion: Completion) {
    // Ignore send errors - the dispatcher may already be gone at shutdown
    let _ = self.sender.send(HostMessage::Completed(completion));
  }
}

/// Cloneable handle for raising events from outside the dispatcher.
///
/// Raised events are queued and dispatched in order by the dispatcher loop.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
  sender: mpsc::UnboundedSender<HostMessage>,
}

impl DispatcherHandle {
  pub fn raise(&self, event: impl Into<EventName>) -> Result<(), DispatchError> {
    self
      .sender
      .send(HostMessage::Raise(event.into()))
      .map_err(|_| DispatchError::MailboxClosed)
  }

  pub fn is_closed(&self) -> bool {
    self.sender.is_closed()
  }
}
