use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level host configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
  pub http: HttpConfig,
  pub script: ScriptConfig,
  pub runtime: RuntimeConfig,
}

impl HostConfig {
  /// Load and validate a config from a JSON file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&contents)
  }

  /// Parse and validate a config from a JSON string.
  pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
    let config: HostConfig = serde_json::from_str(contents)?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.http.timeout_ms == 0 {
      return Err(ConfigError::invalid("http.timeout_ms", "must be greater than zero"));
    }
    if self.http.max_body_bytes == 0 {
      return Err(ConfigError::invalid(
        "http.max_body_bytes",
        "must be greater than zero",
      ));
    }
    if self.script.handlers_table.trim().is_empty() {
      return Err(ConfigError::invalid("script.handlers_table", "must not be empty"));
    }
    if self.script.entry_function.trim().is_empty() {
      return Err(ConfigError::invalid("script.entry_function", "must not be empty"));
    }
    if let Some(event) = self.runtime.lifecycle_events.iter().find(|e| e.is_empty()) {
      return Err(ConfigError::invalid(
        "runtime.lifecycle_events",
        format!("event names must not be empty (got {event:?})"),
      ));
    }
    Ok(())
  }
}

/// Settings for the HTTP transport that performs background fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
  /// Per-request timeout covering connect, headers and body.
  pub timeout_ms: u64,
  /// Value of the `User-Agent` header.
  pub user_agent: String,
  /// Responses with larger bodies are treated as failed fetches.
  pub max_body_bytes: usize,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      timeout_ms: 30_000,
      user_agent: concat!("easel/", env!("CARGO_PKG_VERSION")).to_string(),
      max_body_bytes: 8 * 1024 * 1024,
    }
  }
}

/// Names the script unit must export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
  /// Global table mapping event names to handlers.
  pub handlers_table: String,
  /// Global function taking one event name, which looks up and runs its handler.
  pub entry_function: String,
}

impl Default for ScriptConfig {
  fn default() -> Self {
    Self {
      handlers_table: "methods".to_string(),
      entry_function: "onEvent".to_string(),
    }
  }
}

/// What to do with background fetches still running when the host exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
  /// Wait for in-flight fetches to finish.
  #[default]
  Drain,
  /// Cancel in-flight fetches; their entries stay pending.
  Abandon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
  /// Events raised, in order, right after the script loads.
  pub lifecycle_events: Vec<String>,
  pub shutdown: ShutdownMode,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      lifecycle_events: vec!["init".to_string()],
      shutdown: ShutdownMode::Drain,
    }
  }
}
