use std::time::Duration;

use easel_config::HttpConfig;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::TransportError;
use crate::fetcher::{FetchFuture, Fetcher};

/// [`Fetcher`] that performs a GET over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
  client: Client,
  max_body_bytes: usize,
}

impl HttpFetcher {
  pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
    let client = Client::builder()
      .timeout(Duration::from_millis(config.timeout_ms))
      .user_agent(config.user_agent.clone())
      .build()
      .map_err(|e| TransportError::Client {
        message: e.to_string(),
      })?;

    Ok(Self {
      client,
      max_body_bytes: config.max_body_bytes,
    })
  }

  async fn get(&self, target: &str) -> Result<String, TransportError> {
    let url = parse_target(target)?;

    let mut response = self
      .client
      .get(url.as_str())
      .send()
      .await
      .map_err(|e| TransportError::request(target, e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(TransportError::Status {
        target: target.to_string(),
        status: status.as_u16(),
      });
    }

    let too_large = || TransportError::BodyTooLarge {
      target: target.to_string(),
      limit: self.max_body_bytes,
    };

    if let Some(length) = response.content_length() {
      if length > self.max_body_bytes as u64 {
        return Err(too_large());
      }
    }

    // Content-Length may be absent or wrong, so enforce the limit while reading.
    let mut body = Vec::new();
    while let Some(chunk) = response
      .chunk()
      .await
      .map_err(|e| TransportError::request(target, e))?
    {
      if body.len() + chunk.len() > self.max_body_bytes {
        return Err(too_large());
      }
      body.extend_from_slice(&chunk);
    }

    debug!(url = %target, bytes = body.len(), "fetched resource");

    Ok(decode_body(body))
  }
}

/// Bodies are stored as text. Bytes that are not valid UTF-8 are replaced
/// with U+FFFD rather than failing the fetch.
fn decode_body(body: Vec<u8>) -> String {
  String::from_utf8(body).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

impl Fetcher for HttpFetcher {
  fn fetch(&self, target: &str) -> FetchFuture<'_> {
    let target = target.to_string();
    Box::pin(async move { self.get(&target).await })
  }
}

fn parse_target(target: &str) -> Result<Url, TransportError> {
  let url = Url::parse(target).map_err(|e| TransportError::invalid_target(target, e))?;

  match url.scheme() {
    "http" | "https" => Ok(url),
    scheme => Err(TransportError::invalid_target(
      target,
      format!("unsupported scheme '{}'", scheme),
    )),
  }
}
