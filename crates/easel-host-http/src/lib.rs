//! Easel Host HTTP
//!
//! The transport boundary for async storage. Storage only sees the
//! [`Fetcher`] trait; [`HttpFetcher`] is the production implementation on
//! top of reqwest. With the `test-util` feature, `testing::ScriptedFetcher`
//! provides canned responses whose completion tests can hold and release.

mod error;
mod fetcher;
mod http;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::TransportError;
pub use fetcher::{FetchFuture, Fetcher};
pub use http::HttpFetcher;
