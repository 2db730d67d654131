/// Reasons a retrieval can fail. These are the only failures storage models.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
  /// The target is not a URI the transport can fetch.
  #[error("invalid fetch target '{target}': {message}")]
  InvalidTarget { target: String, message: String },

  /// The request could not be completed (DNS, connect, TLS, timeout, ...).
  #[error("request to '{target}' failed: {message}")]
  Request { target: String, message: String },

  /// The server answered with a non-success status.
  #[error("'{target}' responded with status {status}")]
  Status { target: String, status: u16 },

  /// The response body exceeded the configured limit.
  #[error("response from '{target}' exceeds {limit} bytes")]
  BodyTooLarge { target: String, limit: usize },

  /// The HTTP client could not be constructed.
  #[error("failed to build http client: {message}")]
  Client { message: String },
}

impl TransportError {
  pub fn request(target: impl Into<String>, message: impl ToString) -> Self {
    Self::Request {
      target: target.into(),
      message: message.to_string(),
    }
  }

  pub fn invalid_target(target: impl Into<String>, message: impl ToString) -> Self {
    Self::InvalidTarget {
      target: target.into(),
      message: message.to_string(),
    }
  }
}
