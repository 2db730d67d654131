//! Dispatch events for observability.
//!
//! The dispatcher reports what it did with each event so hosts can log,
//! record or stream it.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::event::EventName;

/// What happened to a dispatched event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
  /// A handler ran and returned successfully.
  Handled { event: EventName },

  /// No handler is registered for the event.
  Ignored { event: EventName },

  /// The handler returned an error.
  HandlerFailed { event: EventName, error: String },
}

/// Receives a [`DispatchEvent`] for every dispatched event.
pub trait DispatchObserver: Send + Sync {
  fn observe(&self, event: DispatchEvent);
}

/// Discards dispatch events.
#[derive(Debug, Clone, Default)]
pub struct NoopObserver;

impl DispatchObserver for NoopObserver {
  fn observe(&self, _event: DispatchEvent) {}
}

/// Sends dispatch events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
  sender: mpsc::UnboundedSender<DispatchEvent>,
}

impl ChannelObserver {
  pub fn new(sender: mpsc::UnboundedSender<DispatchEvent>) -> Self {
    Self { sender }
  }
}

impl DispatchObserver for ChannelObserver {
  fn observe(&self, event: DispatchEvent) {
    let _ = self.sender.send(event);
  }
}
