//! Local filename generation for downloaded resources

use crate::classify::is_url;
use crate::error::UrlError;
use rand::Rng;
use std::ops::RangeInclusive;

/// Range of the random suffix; always renders as four hex digits
const SUFFIX_RANGE: RangeInclusive<u32> = 0x1000..=0xffff;

/// Derive a local filename from a URL
///
/// `https://example.com/img/photo.png` becomes `photo_<hex>.png`. The suffix
/// is random, so two calls rarely agree; nothing here checks the target
/// directory for an existing file.
pub fn permute(url: &str) -> Result<String, UrlError> {
    permute_with(url, &mut rand::rng())
}

/// [`permute`] with a caller-supplied random source
pub fn permute_with<R: Rng>(url: &str, rng: &mut R) -> Result<String, UrlError> {
    if !is_url(url) {
        return Err(UrlError::NotAUrl(url.to_string()));
    }

    let (stem, extension) = split_basename(url)
        .ok_or_else(|| UrlError::MissingExtension(url.to_string()))?;
    let suffix = rng.random_range(SUFFIX_RANGE);

    Ok(format!("{stem}_{suffix:x}.{extension}"))
}

/// Split the last path segment into stem and extension, ignoring query and fragment
fn split_basename(url: &str) -> Option<(&str, &str)> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let basename = path.rsplit('/').next().unwrap_or(path);
    let (stem, extension) = basename.rsplit_once('.')?;
    if extension.is_empty() {
        return None;
    }
    Some((stem, extension))
}
