use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Suffix appended to a key to name its completion event.
pub const COMPLETION_SUFFIX: &str = "_fetch";

/// Name of an event.
///
/// Event names are open-ended: scripts define their own lifecycle names and
/// every fetched key gets a completion event. The helpers cover the names
/// the host itself produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventName(String);

impl EventName {
  pub fn new(name: impl Into<String>) -> Self {
    Self(name.into())
  }

  /// The lifecycle event raised once a script has loaded.
  pub fn init() -> Self {
    Self::new("init")
  }

  /// The event raised when the fetch for `key` completes: `"<key>_fetch"`.
  pub fn completion(key: &str) -> Self {
    Self(format!("{key}{COMPLETION_SUFFIX}"))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for EventName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for EventName {
  fn from(name: &str) -> Self {
    Self::new(name)
  }
}

impl From<String> for EventName {
  fn from(name: String) -> Self {
    Self(name)
  }
}

impl Borrow<str> for EventName {
  fn borrow(&self) -> &str {
    &self.0
  }
}

impl AsRef<str> for EventName {
  fn as_ref(&self) -> &str {
    &self.0
  }
}
