//! Error types for webpage-complete

use crate::status::HttpStatus;
use std::error::Error as StdError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while classifying a reference or deriving a local filename
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    /// Reference is not an http(s) or scheme-relative URL with a dotted host
    #[error("'{0}' does not match the pattern for a url")]
    InvalidUrl(String),

    /// Reference has no scheme and no leading `//`, and there is no base URL to resolve it against
    #[error("cannot resolve relative url '{0}': the page was loaded from a local file")]
    UnresolvableRelativeUrl(String),

    /// Filename generation was handed something that is not a URL
    #[error("string '{0}' is not a url")]
    NotAUrl(String),

    /// Last path segment has no `.extension`
    #[error("url '{0}' has no file extension to keep")]
    MissingExtension(String),
}

/// Errors that can occur while fetching a single resource into a local file
#[derive(Debug, Error)]
pub enum FetchError {
    /// Destination file could not be opened or written
    #[error("Could not write output file '{}'", .path.display())]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TLS handshake or certificate failure
    #[error("Could not load resource at '{url}' due to SSL error")]
    Tls {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Remote host exceeded the redirect limit
    #[error("Could not load resource at '{url}' due to too many redirects")]
    TooManyRedirects {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timed out
    #[error("Could not load resource at '{url}' due to connection timeout")]
    Timeout {
        url: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// URL is malformed or lacks an http(s) scheme
    #[error("Could not load resource at '{url}' because the url is malformed")]
    MalformedUrl {
        url: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// DNS failure, refused or reset connection, broken body stream
    #[error("Could not load resource at '{url}' due to connection error")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Response status was not 200
    #[error("Request for '{url}' not successful: got HTTP status code {status}")]
    UnexpectedStatus { url: String, status: HttpStatus },

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}

/// Fallback wording for TLS failures from backends other than rustls
const TLS_MARKERS: &[&str] = &["certificate", "tls", "ssl", "handshake", "x509"];

impl FetchError {
    /// Classify a reqwest error raised while sending the request or reading its body
    ///
    /// Precedence: timeout, redirect limit, malformed request, TLS, then the
    /// generic connection bucket.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            FetchError::Timeout {
                url,
                source: Box::new(err),
            }
        } else if err.is_redirect() {
            FetchError::TooManyRedirects { url, source: err }
        } else if err.is_builder() {
            FetchError::MalformedUrl {
                url,
                source: Box::new(err),
            }
        } else if is_tls_failure(&err) {
            FetchError::Tls { url, source: err }
        } else {
            FetchError::Connection { url, source: err }
        }
    }

    /// HTTP status code carried by [`FetchError::UnexpectedStatus`]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::UnexpectedStatus { status, .. } => Some(status.code()),
            _ => None,
        }
    }
}

/// Whether a connect failure came from the TLS layer
///
/// reqwest reports handshake and certificate problems as connect errors.
/// rustls errors reach the chain either directly or wrapped in an
/// `io::Error`, whose `source()` skips the wrapped value.
fn is_tls_failure(err: &reqwest::Error) -> bool {
    let mut cause = err.source();
    while let Some(inner) = cause {
        if is_rustls_error(inner) {
            return true;
        }
        cause = inner.source();
    }

    let mut cause = err.source();
    while let Some(inner) = cause {
        let text = inner.to_string().to_ascii_lowercase();
        if TLS_MARKERS.iter().any(|marker| text.contains(marker)) {
            return true;
        }
        cause = inner.source();
    }
    false
}

fn is_rustls_error(err: &(dyn StdError + 'static)) -> bool {
    if err.is::<rustls::Error>() {
        return true;
    }
    err.downcast_ref::<std::io::Error>()
        .and_then(std::io::Error::get_ref)
        .is_some_and(|inner| inner.is::<rustls::Error>())
}

/// Errors that abort a whole conversion job
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Bad command line usage or missing input file
    #[error("{0}")]
    InvalidInput(String),

    /// Input HTML could not be read or parsed
    #[error("Could not read input file '{}'", .path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document has no usable `<title>` to name the outputs after
    #[error("The document has no <title>, so no output name can be derived")]
    MissingTitle,

    /// Input could not be copied into the working directory
    #[error("Could not stage '{}' into a working directory", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Assets directory could not be created
    #[error("Could not create assets directory '{}'", .path.display())]
    CreateAssetsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rewritten document could not be written out
    #[error("Could not write output file '{}'", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Url(#[from] UrlError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
