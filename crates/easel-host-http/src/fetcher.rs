use std::future::Future;
use std::pin::Pin;

use crate::error::TransportError;

/// Boxed future returned by [`Fetcher::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<String, TransportError>> + Send + 'a>>;

/// Retrieves the body of a remote resource.
///
/// Implementations must be safe to call concurrently: storage starts one
/// retrieval per key and may have many keys in flight.
pub trait Fetcher: Send + Sync {
  /// Fetch `target` and return its body as text.
  fn fetch(&self, target: &str) -> FetchFuture<'_>;
}
