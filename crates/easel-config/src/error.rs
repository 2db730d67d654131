use std::path::PathBuf;

/// Errors that can occur while loading host configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  /// The config file could not be read.
  #[error("failed to read config file '{}': {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The config contents are not valid JSON for [`crate::HostConfig`].
  #[error("invalid config: {0}")]
  Parse(#[from] serde_json::Error),

  /// The config parsed but holds a value the host cannot run with.
  #[error("invalid value for '{field}': {message}")]
  Invalid { field: String, message: String },
}

impl ConfigError {
  pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Invalid {
      field: field.into(),
      message: message.into(),
    }
  }
}
