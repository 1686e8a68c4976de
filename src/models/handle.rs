// src/models/handle.rs

//! Candidate handles: `user@host` addresses and `https://` profile URLs.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{DiscoveryError, DiscoveryErrorKind};
use crate::utils::url::is_valid_domain;

static LOCAL_PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$").expect("local part pattern"));

static HANDLE_IN_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@?[A-Za-z0-9_][A-Za-z0-9_.-]*@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+")
        .expect("handle pattern")
});

// `https://host/@user@remote` is how Mastodon shows a remote account; the
// `user` and `remote` groups pick it out.
static URL_IN_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https://[A-Za-z0-9.-]+/(?:@(?P<user>[A-Za-z0-9_]+)(?:@(?P<remote>[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+))?|users/[A-Za-z0-9_]+)",
    )
    .expect("profile url pattern")
});

/// What identifies the account on its host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// `user@host`; holds `user`.
    Acct(String),
    /// `https://host/path`; holds the normalized URL.
    Profile(Url),
}

/// A parsed, immutable candidate identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateHandle {
    hostname: String,
    kind: HandleKind,
}

impl CandidateHandle {
    /// Parse a raw handle, rejecting anything without a domain-shaped host.
    pub fn parse(raw: &str) -> Result<Self, DiscoveryError> {
        let raw = raw.trim();
        let bad = || DiscoveryError::with_detail(DiscoveryErrorKind::BadAccountId, raw);

        if raw.starts_with("https://") {
            let url = Url::parse(raw).map_err(|_| bad())?;
            let hostname = url.host_str().ok_or_else(bad)?.to_lowercase();
            let has_path = !url.path().trim_matches('/').is_empty();
            if !is_valid_domain(&hostname) || !url.username().is_empty() || !has_path {
                return Err(bad());
            }
            return Ok(Self {
                hostname,
                kind: HandleKind::Profile(url),
            });
        }

        let stripped = raw.strip_prefix('@').unwrap_or(raw);
        let (user, host) = stripped.split_once('@').ok_or_else(bad)?;
        let hostname = host.to_lowercase();
        if !LOCAL_PART_RE.is_match(user) || !is_valid_domain(&hostname) {
            return Err(bad());
        }

        Ok(Self {
            hostname,
            kind: HandleKind::Acct(user.to_string()),
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn kind(&self) -> &HandleKind {
        &self.kind
    }

    /// The `user` in `user@host`, when the handle is address-shaped.
    pub fn local_part(&self) -> Option<&str> {
        match &self.kind {
            HandleKind::Acct(user) => Some(user),
            HandleKind::Profile(_) => None,
        }
    }

    /// WebFinger resource: `acct:user@host` or the profile URL.
    pub fn resource(&self) -> String {
        match &self.kind {
            HandleKind::Acct(user) => format!("acct:{user}@{}", self.hostname),
            HandleKind::Profile(url) => url.to_string(),
        }
    }
}

impl fmt::Display for CandidateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            HandleKind::Acct(user) => write!(f, "{user}@{}", self.hostname),
            HandleKind::Profile(url) => write!(f, "{url}"),
        }
    }
}

impl FromStr for CandidateHandle {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Find handles and profile URLs in free text, in order of appearance.
///
/// A profile URL for a remote account (`https://host/@user@remote`) yields
/// the address `user@remote`. Matches that do not parse as a
/// [`CandidateHandle`] (for example an address whose host has a one-letter
/// TLD) are dropped, and repeats are reported once.
pub fn extract_candidates(text: &str) -> Vec<CandidateHandle> {
    let mut found: Vec<(usize, String)> = Vec::new();
    let mut url_spans = Vec::new();
    for caps in URL_IN_TEXT_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        url_spans.push(whole.range());
        let candidate = match (caps.name("user"), caps.name("remote")) {
            (Some(user), Some(remote)) => format!("{}@{}", user.as_str(), remote.as_str()),
            _ => whole.as_str().to_string(),
        };
        found.push((whole.start(), candidate));
    }
    // Addresses inside a URL were already covered by that URL.
    found.extend(
        HANDLE_IN_TEXT_RE
            .find_iter(text)
            .filter(|m| !url_spans.iter().any(|span| span.contains(&m.start())))
            .map(|m| (m.start(), m.as_str().to_string())),
    );
    found.sort_by_key(|(start, _)| *start);

    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter_map(|(_, candidate)| CandidateHandle::parse(&candidate).ok())
        .filter(|handle| seen.insert(handle.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_acct() {
        let handle = CandidateHandle::parse("@Alice@Mastodon.Social").unwrap();
        assert_eq!(handle.hostname(), "mastodon.social");
        assert_eq!(handle.local_part(), Some("Alice"));
        assert_eq!(handle.resource(), "acct:Alice@mastodon.social");
        assert_eq!(handle.to_string(), "Alice@mastodon.social");
    }

    #[test]
    fn test_parse_profile_url() {
        let handle: CandidateHandle = "https://fosstodon.org/@bob".parse().unwrap();
        assert_eq!(handle.hostname(), "fosstodon.org");
        assert_eq!(handle.local_part(), None);
        assert_eq!(handle.resource(), "https://fosstodon.org/@bob");
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        for raw in [
            "",
            "alice",
            "alice@",
            "@localhost",
            "alice@localhost",
            "alice@example.c",
            "al ice@example.com",
            "http://example.com/@alice",
            "https://example.com/",
            "https://user@example.com/@alice",
        ] {
            let err = CandidateHandle::parse(raw).unwrap_err();
            assert_eq!(err.kind, DiscoveryErrorKind::BadAccountId, "{raw}");
        }
    }

    #[test]
    fn test_extract_candidates_in_order() {
        let bio = "Writer. Now at https://writing.exchange/@carol, also @carol@hachyderm.io \
                   and mail me at carol@example.com. Old: https://mastodon.social/@carol@old.example.";
        let found: Vec<String> = extract_candidates(bio)
            .into_iter()
            .map(|h| h.to_string())
            .collect();
        assert_eq!(
            found,
            vec![
                "https://writing.exchange/@carol",
                "carol@hachyderm.io",
                "carol@example.com",
                "carol@old.example",
            ]
        );
    }

    #[test]
    fn test_extract_remote_profile_url_as_address() {
        let found: Vec<String> = extract_candidates("see https://mastodon.social/@alice@other.example")
            .into_iter()
            .map(|h| h.to_string())
            .collect();
        assert_eq!(found, vec!["alice@other.example"]);
    }

    #[test]
    fn test_extract_candidates_dedups_case_insensitive_host() {
        let found = extract_candidates("dan@Example.social dan@example.social dan@x.y");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].hostname(), "example.social");
    }
}
