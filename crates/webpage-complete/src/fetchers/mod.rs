//! Resource fetchers
//!
//! Design: the document rewriter only talks to the [`ResourceFetcher`] trait,
//! so the network can be swapped out. [`HttpFetcher`] is the production
//! implementation backed by reqwest.

mod http;

pub use http::HttpFetcher;

use crate::error::FetchError;
use async_trait::async_trait;
use std::path::Path;

/// Trait for retrieving one resource into a local file
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Identifier for logging
    fn name(&self) -> &'static str;

    /// Fetch `url` and write its body to `destination`
    ///
    /// Returns the number of bytes written. Bytes are only reported on full
    /// success; on failure nothing is left at `destination` by this call.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError>;
}
