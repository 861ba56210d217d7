//! HTTP client configuration for webpage-complete
//!
//! [`FetchOptions`] configures the [`HttpFetcher`](crate::fetchers::HttpFetcher).
//! [`fetch_resource`] is a one-shot entry point for fetching a single URL with
//! the default configuration.

use crate::error::FetchError;
use crate::fetchers::{HttpFetcher, ResourceFetcher};
use crate::{DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT};
use std::path::Path;
use std::time::Duration;

/// Fetch options shared by every request of a conversion
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Connect timeout, also applied to each read of the response
    pub timeout: Duration,
    /// Maximum number of redirects to follow
    pub max_redirects: usize,
    /// Custom User-Agent
    pub user_agent: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: None,
        }
    }
}

impl FetchOptions {
    /// Create a builder starting from the defaults
    pub fn builder() -> FetchOptionsBuilder {
        FetchOptionsBuilder::default()
    }
}

/// Builder for [`FetchOptions`]
#[derive(Debug, Clone, Default)]
pub struct FetchOptionsBuilder {
    options: FetchOptions,
}

impl FetchOptionsBuilder {
    /// Set the connect/read timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Set the redirect limit
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.options.max_redirects = max;
        self
    }

    /// Set custom User-Agent
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.options.user_agent = Some(ua.into());
        self
    }

    pub fn build(self) -> FetchOptions {
        self.options
    }
}

/// Fetch `url` into `destination` with the default options
///
/// Returns the number of bytes written. For repeated fetches build one
/// [`HttpFetcher`] and reuse it.
pub async fn fetch_resource(url: &str, destination: &Path) -> Result<u64, FetchError> {
    let fetcher = HttpFetcher::new(FetchOptions::default())?;
    fetcher.fetch(url, destination).await
}
