//! HTTP resource fetcher
//!
//! One GET per resource, body streamed straight to disk.

use crate::client::FetchOptions;
use crate::error::FetchError;
use crate::fetchers::ResourceFetcher;
use crate::status::HttpStatus;
use crate::{CHUNK_SIZE, DEFAULT_USER_AGENT};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::error::Elapsed;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

/// reqwest-backed fetcher
///
/// Holds a single client built from [`FetchOptions`]:
/// - connect timeout, plus the same bound on waiting for the response head
///   and on each body read
/// - bounded redirect policy
/// - fixed User-Agent
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Build a fetcher from options
    pub fn new(options: FetchOptions) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let user_agent = options.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(options.timeout)
            .read_timeout(options.timeout)
            .redirect(Policy::limited(options.max_redirects))
            .build()
            .map_err(FetchError::ClientBuild)?;

        Ok(Self {
            client,
            timeout: options.timeout,
        })
    }

    async fn download(
        &self,
        url: &str,
        file: &mut File,
        destination: &Path,
    ) -> Result<u64, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::MalformedUrl {
            url: url.to_string(),
            source: Box::new(e),
        })?;

        let response = timeout(self.timeout, self.client.get(parsed).send())
            .await
            .map_err(|elapsed| timed_out(url, elapsed))?
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::UnexpectedStatus {
                url: url.to_string(),
                status: HttpStatus::new(status.as_u16()),
            });
        }

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = timeout(self.timeout, stream.next())
            .await
            .map_err(|elapsed| timed_out(url, elapsed))?
        {
            let chunk = chunk.map_err(|e| FetchError::from_reqwest(url, e))?;
            written += write_chunked(file, &chunk)
                .await
                .map_err(|source| local_write(destination, source))?;
        }
        file.flush()
            .await
            .map_err(|source| local_write(destination, source))?;

        Ok(written)
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
        let mut file = File::create(destination)
            .await
            .map_err(|source| local_write(destination, source))?;

        let result = self.download(url, &mut file, destination).await;
        drop(file);

        match result {
            Ok(written) => {
                debug!(url, path = %destination.display(), bytes = written, "Fetched resource");
                Ok(written)
            }
            Err(err) => {
                if let Err(e) = tokio::fs::remove_file(destination).await {
                    warn!(path = %destination.display(), "Could not remove partial file: {}", e);
                }
                Err(err)
            }
        }
    }
}

/// Write a network chunk to disk in `CHUNK_SIZE` pieces
async fn write_chunked(file: &mut File, chunk: &Bytes) -> std::io::Result<u64> {
    let mut written = 0;
    for piece in chunk.chunks(CHUNK_SIZE) {
        file.write_all(piece).await?;
        written += piece.len() as u64;
    }
    Ok(written)
}

fn timed_out(url: &str, elapsed: Elapsed) -> FetchError {
    FetchError::Timeout {
        url: url.to_string(),
        source: Box::new(elapsed),
    }
}

fn local_write(path: &Path, source: std::io::Error) -> FetchError {
    FetchError::LocalWrite {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_fetcher_builds_with_defaults() {
        let fetcher = HttpFetcher::new(FetchOptions::default()).unwrap();
        assert_eq!(fetcher.name(), "http");
    }

    #[test]
    fn test_http_fetcher_tolerates_bad_user_agent() {
        let options = FetchOptions::builder().user_agent("bad\nagent").build();
        assert!(HttpFetcher::new(options).is_ok());
    }

    #[tokio::test]
    async fn test_write_chunked_counts_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut file = File::create(&path).await.unwrap();
        let data = Bytes::from(vec![7u8; CHUNK_SIZE * 2 + 17]);

        let written = write_chunked(&mut file, &data).await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        assert_eq!(written, data.len() as u64);
        assert_eq!(std::fs::read(&path).unwrap(), data.to_vec());
    }

    #[tokio::test]
    async fn test_unwritable_destination_is_local_write() {
        let fetcher = HttpFetcher::new(FetchOptions::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing").join("a.png");

        let result = fetcher.fetch("https://example.com/a.png", &dest).await;
        assert!(matches!(result, Err(FetchError::LocalWrite { .. })));
    }
}
