//! Completion notifications.
//!
//! Storage reports each finished fetch through a [`CompletionNotifier`]. The
//! dispatcher's mailbox is the production implementation; the ones here are
//! for hosts and tests that observe storage directly.

use tokio::sync::mpsc;

use crate::entry::EntryStatus;

/// A fetch has finished and its entry is final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
  pub key: String,
  pub status: EntryStatus,
}

/// Receives one [`Completion`] per fetched key.
///
/// Called from the background context the fetch ran on, never from the
/// handler context. Implementations must not block.
pub trait CompletionNotifier: Send + Sync {
  fn notify(&self, completion: Completion);
}

/// Discards completions.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl CompletionNotifier for NoopNotifier {
  fn notify(&self, _completion: Completion) {}
}

/// Forwards completions to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<Completion>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<Completion>) -> Self {
    Self { sender }
  }
}

impl CompletionNotifier for ChannelNotifier {
  fn notify(&self, completion: Completion) {
    // Receiver may have been dropped during shutdown.
    let _ = self.sender.send(completion);
  }
}
