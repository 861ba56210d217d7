//! URL classification
//!
//! Decides whether a reference pulled out of a page can be fetched. The page
//! is read from a local file, so there is no base URL: only absolute http(s)
//! URLs and scheme-relative (`//host/...`) URLs can be resolved.

use crate::error::UrlError;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Optional http(s) scheme, `//`, a host with at least one dot, then a path
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(https?:)?//[^/]+\.[a-z]+/.*$").expect("static url pattern compiles")
});

static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?:").expect("static scheme pattern compiles"));

/// Any RFC 3986 scheme, used to tell `mailto:`/`data:` apart from relative paths
static ANY_SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("static scheme pattern compiles")
});

/// Scheme given to scheme-relative references
const DEFAULT_SCHEME: &str = "https:";

/// A reference normalized to an absolute http(s) URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl(String);

impl ResolvedUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ResolvedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResolvedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn is_url(s: &str) -> bool {
    URL_RE.is_match(s)
}

pub fn is_absolute_url(s: &str) -> bool {
    SCHEME_RE.is_match(s)
}

pub fn is_scheme_relative_url(s: &str) -> bool {
    s.starts_with("//")
}

/// True for references with neither a scheme nor a leading `//`
fn is_relative_reference(s: &str) -> bool {
    !is_scheme_relative_url(s) && !ANY_SCHEME_RE.is_match(s)
}

/// Normalize a reference to an absolute URL
///
/// Relative references fail with [`UrlError::UnresolvableRelativeUrl`];
/// everything else that is not a URL fails with [`UrlError::InvalidUrl`].
pub fn resolve(s: &str) -> Result<ResolvedUrl, UrlError> {
    if is_relative_reference(s) {
        return Err(UrlError::UnresolvableRelativeUrl(s.to_string()));
    }
    if !is_url(s) {
        return Err(UrlError::InvalidUrl(s.to_string()));
    }

    if is_scheme_relative_url(s) {
        Ok(ResolvedUrl(format!("{DEFAULT_SCHEME}{s}")))
    } else if is_absolute_url(s) {
        Ok(ResolvedUrl(s.to_string()))
    } else {
        // URL_RE only admits the two shapes above
        Err(UrlError::UnresolvableRelativeUrl(s.to_string()))
    }
}
