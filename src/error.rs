// src/error.rs

//! Error types for the discovery chain and the surrounding application.
//!
//! Discovery failures are ordinary values: every stage that touches the
//! network or parses untrusted input returns a [`DiscoveryError`] instead of
//! letting a fault escape. [`AppError`] covers everything else (files,
//! configuration, client construction, command-line arguments).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for application operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid command-line argument
    #[error("Invalid argument '{value}': {message}")]
    Argument { value: String, message: String },

    /// A pipeline run stopped on a discovery failure
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an argument error.
    pub fn argument(value: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Argument {
            value: value.into(),
            message: message.to_string(),
        }
    }
}

/// Closed taxonomy of discovery and resolution failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiscoveryErrorKind {
    /// `.well-known/nodeinfo` was unreachable, non-2xx or unparseable
    InvalidWellKnownResponse,
    /// No NodeInfo link with a supported schema
    IncompatibleServer,
    /// NodeInfo document lacks `software.name`/`software.version`
    InvalidNodeInfoResponse,
    /// Server software is not the one being crawled for
    IncompatibleServerSoftware,
    /// Instance API response lacks `title`/`uri`
    InvalidMastodonInstanceResponse,
    /// Peers endpoint was non-2xx or not JSON
    InvalidMastodonPeersResponse,
    /// Peers endpoint returned JSON that is not an array
    InvalidPeersResponse,
    /// Network failure or other fault while crawling
    MastodonCrawlError,
    /// Handle does not have an account shape
    BadAccountId,
    /// Remote server does not know the account
    RemoteUserNotFound,
    /// Remote server failed (5xx or unusable response)
    RemoteUserError,
    /// Cancellation observed while a pipeline was running
    Aborted,
    /// A request exceeded its deadline
    TimedOut,
}

impl DiscoveryErrorKind {
    /// Wire name of the kind, as used in the crawl event stream.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidWellKnownResponse => "invalidWellKnownResponse",
            Self::IncompatibleServer => "incompatibleServer",
            Self::InvalidNodeInfoResponse => "invalidNodeInfoResponse",
            Self::IncompatibleServerSoftware => "incompatibleServerSoftware",
            Self::InvalidMastodonInstanceResponse => "invalidMastodonInstanceResponse",
            Self::InvalidMastodonPeersResponse => "invalidMastodonPeersResponse",
            Self::InvalidPeersResponse => "invalidPeersResponse",
            Self::MastodonCrawlError => "mastodonCrawlError",
            Self::BadAccountId => "badAccountId",
            Self::RemoteUserNotFound => "remoteUserNotFound",
            Self::RemoteUserError => "remoteUserError",
            Self::Aborted => "aborted",
            Self::TimedOut => "timedOut",
        }
    }
}

impl fmt::Display for DiscoveryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged discovery failure with optional context.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}{}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
pub struct DiscoveryError {
    pub kind: DiscoveryErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DiscoveryError {
    /// Create an error without detail.
    pub fn new(kind: DiscoveryErrorKind) -> Self {
        Self { kind, detail: None }
    }

    /// Create an error carrying detail text.
    pub fn with_detail(kind: DiscoveryErrorKind, detail: impl fmt::Display) -> Self {
        Self {
            kind,
            detail: Some(detail.to_string()),
        }
    }

    /// The cancellation marker returned by an aborted pipeline.
    pub fn aborted() -> Self {
        Self::new(DiscoveryErrorKind::Aborted)
    }

    /// Whether this failure only concerns the one candidate being resolved.
    pub fn is_not_found(&self) -> bool {
        self.kind == DiscoveryErrorKind::RemoteUserNotFound
    }
}

impl From<DiscoveryErrorKind> for DiscoveryError {
    fn from(kind: DiscoveryErrorKind) -> Self {
        Self::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names_match_serde() {
        let kinds = [
            DiscoveryErrorKind::InvalidWellKnownResponse,
            DiscoveryErrorKind::IncompatibleServer,
            DiscoveryErrorKind::InvalidMastodonPeersResponse,
            DiscoveryErrorKind::MastodonCrawlError,
            DiscoveryErrorKind::RemoteUserNotFound,
            DiscoveryErrorKind::TimedOut,
        ];
        for kind in kinds {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_display_includes_detail() {
        let err = DiscoveryError::with_detail(DiscoveryErrorKind::MastodonCrawlError, "refused");
        assert_eq!(err.to_string(), "mastodonCrawlError: refused");
        assert_eq!(
            DiscoveryError::new(DiscoveryErrorKind::IncompatibleServer).to_string(),
            "incompatibleServer"
        );
    }

    #[test]
    fn test_detail_omitted_from_json_when_absent() {
        let err = DiscoveryError::new(DiscoveryErrorKind::BadAccountId);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "badAccountId" }));
    }
}
