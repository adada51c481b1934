//! Request URL to logical resource key normalization.
//!
//! Two normalization forms exist on purpose. The reconciler derives keys
//! from stored request URLs with [`resource_key`], which never strips a
//! `?v=` suffix — a query-busted cache entry therefore never matches the
//! manifest and is evicted on the next activation. The router uses
//! [`request_key`], which does strip the suffix so busted requests still
//! resolve to their manifest entry.

use crate::manifest::ENTRY_KEY;

/// Strips `origin` (ignoring any trailing slash) and the path separator
/// from `url`. Returns `None` when `url` is not under the origin.
///
/// `url == origin` yields an empty remainder, which callers map to the
/// entry-document key.
fn strip_origin<'a>(origin: &str, url: &'a str) -> Option<&'a str> {
    let origin = origin.trim_end_matches('/');
    let rest = url.strip_prefix(origin)?;
    if rest.is_empty() {
        return Some("");
    }
    rest.strip_prefix('/')
}

/// Maps a normalized path remainder to its logical key.
///
/// An empty remainder (the site root) and a hash-fragment-only remainder
/// both denote the entry document.
fn remainder_to_key(rest: &str) -> String {
    if rest.is_empty() || rest.starts_with('#') {
        ENTRY_KEY.to_string()
    } else {
        rest.to_string()
    }
}

/// Derives the logical resource key for a stored request URL.
///
/// Used by the reconciler when diffing the content store against the
/// manifest. Returns `None` for URLs outside the origin.
#[must_use]
pub fn resource_key(origin: &str, url: &str) -> Option<String> {
    strip_origin(origin, url).map(remainder_to_key)
}

/// Derives the logical resource key for an intercepted request URL.
///
/// Like [`resource_key`], but additionally strips a trailing `?v=...`
/// cache-busting query suffix before root mapping, so `/?v=123` resolves
/// to the entry document.
#[must_use]
pub fn request_key(origin: &str, url: &str) -> Option<String> {
    let rest = strip_origin(origin, url)?;
    let rest = match rest.find("?v=") {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    Some(remainder_to_key(rest))
}

/// Builds the absolute URL for a manifest key. Inverse of [`resource_key`]
/// for keys the installer and prefetcher request themselves.
#[must_use]
pub fn resource_url(origin: &str, key: &str) -> String {
    let origin = origin.trim_end_matches('/');
    if key == ENTRY_KEY {
        format!("{origin}/")
    } else {
        format!("{origin}/{key}")
    }
}
