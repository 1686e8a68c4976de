// src/utils/url.rs

//! Host and URL normalization helpers.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Lowercase labels of letters, digits and hyphens, ending in a TLD of at
/// least two letters (or a punycode TLD).
static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+(?:[a-z]{2,63}|xn--[a-z0-9-]{1,59})$")
        .expect("domain pattern is valid")
});

/// Check that a string has the shape of a domain name.
///
/// # Examples
/// ```
/// use fediscover::utils::url::is_valid_domain;
///
/// assert!(is_valid_domain("mastodon.social"));
/// assert!(!is_valid_domain("localhost"));
/// assert!(!is_valid_domain("Mastodon.Social"));
/// ```
pub fn is_valid_domain(domain: &str) -> bool {
    domain.len() <= 253 && DOMAIN_RE.is_match(domain)
}

/// Reduce a host-ish string (`Example.COM`, `https://example.com/`,
/// `example.com.`) to a bare lowercase host.
///
/// Returns `None` when nothing resembling a domain remains.
pub fn normalize_host(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()?
        .trim_end_matches('.')
        .to_lowercase();

    is_valid_domain(&host).then_some(host)
}

/// Origin of an `https` URL, path stripped: `https://host[:port]/`.
pub fn https_origin(raw: &str) -> Option<Url> {
    let parsed = Url::parse(raw).ok()?;
    if parsed.scheme() != "https" || parsed.host_str().is_none() {
        return None;
    }
    let origin = parsed.origin().ascii_serialization();
    Url::parse(&origin).ok()
}

/// Serialize a base URL without its trailing slash.
pub fn strip_trailing_slash(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}

/// Extract the lowercase host from a URL string.
pub fn get_domain(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}
