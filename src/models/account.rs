//! Resolved account data structure.

use serde::{Deserialize, Serialize};

/// A federated account matched to a candidate handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAccount {
    /// Actor id (open lookups) or account id on the home instance
    pub id: String,

    /// The handle that was looked up, kept so callers can correlate results
    pub account: String,

    pub username: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub followers_count: Option<u64>,

    #[serde(default)]
    pub following_count: Option<u64>,

    #[serde(default)]
    pub statuses_count: Option<u64>,

    /// Profile page
    pub url: String,

    #[serde(default)]
    pub avatar_image_url: Option<String>,

    /// `None` when follow state cannot be known (open-fediverse lookups)
    pub following: Option<bool>,
}
