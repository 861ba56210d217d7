//! webpage-complete - save a local HTML page as a "Web Page, Complete"
//!
//! Downloads every image, script and stylesheet a page references, stores
//! each one under a generated name in a sibling `<Title>_files` directory,
//! rewrites the page to point at the local copies and writes `<Title>.html`.
//!
//! ## Pipeline
//!
//! - [`classify`] decides whether a reference can be fetched at all
//! - [`filename`] derives a local name with a random hex suffix
//! - [`fetchers`] retrieves the bytes ([`HttpFetcher`] over reqwest)
//! - [`rewriter`] plans, fetches and rewrites every resource-bearing tag
//! - [`job`] drives a whole conversion from input file to output bundle
//!
//! ```no_run
//! # async fn run() -> Result<(), webpage_complete::ConvertError> {
//! use webpage_complete::{ConversionJob, FetchOptions, HttpFetcher};
//!
//! let fetcher = HttpFetcher::new(FetchOptions::default())?;
//! let mut job = ConversionJob::new("saved/page.html", ".");
//! let report = job.run(&fetcher).await?;
//! println!("wrote {}", report.html_path.display());
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod client;
mod error;
pub mod fetchers;
pub mod filename;
pub mod job;
pub mod rewriter;
pub mod status;

use std::time::Duration;

pub use classify::{is_absolute_url, is_scheme_relative_url, is_url, resolve, ResolvedUrl};
pub use client::{fetch_resource, FetchOptions, FetchOptionsBuilder};
pub use error::{ConvertError, FetchError, UrlError};
pub use fetchers::{HttpFetcher, ResourceFetcher};
pub use filename::permute;
pub use job::{ConversionJob, ConversionReport, JobState};
pub use rewriter::{rewrite_document, LocalAsset, ResourceKind, RewritePlan, SourceReference};
pub use status::HttpStatus;

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str = "webpage-complete/0.1";

/// Connect and read timeout for each resource
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Redirects followed before giving up
pub const DEFAULT_MAX_REDIRECTS: usize = 30;

/// Size of each write to the destination file
pub const CHUNK_SIZE: usize = 1024;

/// Suffix appended to the page title to name the assets directory
pub const ASSETS_DIR_SUFFIX: &str = "_files";
