use std::fmt;
use std::sync::OnceLock;

use easel_host_http::TransportError;
use serde::{Deserialize, Serialize};

/// Lifecycle of a stored key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
  /// The fetch has been scheduled but has not finished.
  Pending,
  /// The fetch succeeded and the value is readable.
  Ready,
  /// The fetch failed; no value will ever be stored.
  Failed,
}

impl EntryStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      EntryStatus::Pending => "pending",
      EntryStatus::Ready => "ready",
      EntryStatus::Failed => "failed",
    }
  }
}

impl fmt::Display for EntryStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Point-in-time copy of one entry in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
  pub key: String,
  pub target: String,
  pub status: EntryStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub value: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

/// Final result of a fetch.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
  Ready(String),
  Failed(TransportError),
}

/// Shared cell behind one key. The outcome is published once; readers either
/// see nothing (pending) or the complete outcome.
#[derive(Debug)]
pub(crate) struct Slot {
  target: String,
  outcome: OnceLock<Outcome>,
}

impl Slot {
  pub(crate) fn new(target: impl Into<String>) -> Self {
    Self {
      target: target.into(),
      outcome: OnceLock::new(),
    }
  }

  pub(crate) fn target(&self) -> &str {
    &self.target
  }

  /// Returns false if an outcome was already published.
  pub(crate) fn publish(&self, outcome: Outcome) -> bool {
    self.outcome.set(outcome).is_ok()
  }

  pub(crate) fn status(&self) -> EntryStatus {
    match self.outcome.get() {
      None => EntryStatus::Pending,
      Some(Outcome::Ready(_)) => EntryStatus::Ready,
      Some(Outcome::Failed(_)) => EntryStatus::Failed,
    }
  }

  pub(crate) fn value(&self) -> Option<&str> {
    match self.outcome.get() {
      Some(Outcome::Ready(value)) => Some(value),
      _ => None,
    }
  }

  pub(crate) fn error(&self) -> Option<&TransportError> {
    match self.outcome.get() {
      Some(Outcome::Failed(error)) => Some(error),
      _ => None,
    }
  }

  pub(crate) fn to_entry(&self, key: &str) -> StoreEntry {
    StoreEntry {
      key: key.to_string(),
      target: self.target.clone(),
      status: self.status(),
      value: self.value().map(str::to_string),
      error: self.error().map(ToString::to_string),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_new_slot_is_pending() {
    let slot = Slot::new("https://a");
    assert_eq!(slot.status(), EntryStatus::Pending);
    assert_eq!(slot.value(), None);
    assert!(slot.error().is_none());
  }

  #[test]
  fn test_publish_only_once() {
    let slot = Slot::new("https://a");
    assert!(slot.publish(Outcome::Ready("first".to_string())));
    assert!(!slot.publish(Outcome::Failed(TransportError::request("https://a", "late"))));

    assert_eq!(slot.status(), EntryStatus::Ready);
    assert_eq!(slot.value(), Some("first"));
  }

  #[test]
  fn test_failed_slot_has_no_value() {
    let slot = Slot::new("https://a");
    slot.publish(Outcome::Failed(TransportError::Status {
      target: "https://a".to_string(),
      status: 404,
    }));

    let entry = slot.to_entry("a");
    assert_eq!(entry.status, EntryStatus::Failed);
    assert_eq!(entry.value, None);
    assert_eq!(entry.error.as_deref(), Some("'https://a' responded with status 404"));
  }

  #[test]
  fn test_status_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&EntryStatus::Ready).unwrap(), "\"ready\"");
    assert_eq!(EntryStatus::Pending.to_string(), "pending");
  }
}
