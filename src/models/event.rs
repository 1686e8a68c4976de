// src/models/event.rs

//! Crawl event stream.
//!
//! Each event serializes to one JSON object per line:
//!
//! ```text
//! {"type":"instance","instance":{"uri":"example.com","instanceUrl":"https://example.com",...}}
//! {"type":"error","domain":"broken.example","error":"invalidWellKnownResponse","detail":"HTTP 404"}
//! {"type":"skipPeers","domain":"small.example","count":40}
//! {"type":"progress","visited":12,"remaining":230}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, DiscoveryErrorKind};
use crate::models::InstanceRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CrawlEvent {
    /// A compatible instance was resolved.
    Instance { instance: InstanceRecord },

    /// Resolution of `domain` failed.
    Error {
        domain: String,
        error: DiscoveryErrorKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },

    /// The peer list of `domain` was not trusted and was discarded.
    SkipPeers { domain: String, count: usize },

    /// Emitted after every processed domain.
    Progress { visited: usize, remaining: usize },
}

impl CrawlEvent {
    pub fn error(domain: impl Into<String>, error: DiscoveryError) -> Self {
        Self::Error {
            domain: domain.into(),
            error: error.kind,
            detail: error.detail,
        }
    }

    /// Serialize as a single NDJSON line (no trailing newline).
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Receiver of crawl events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CrawlEvent);

    /// Whether the consumer is gone and further events would be lost.
    fn is_closed(&self) -> bool {
        false
    }
}
