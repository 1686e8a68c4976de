// src/services/lookup.rs

//! Authenticated lookups through the user's own Mastodon instance.
//!
//! The home instance resolves remote accounts on our behalf and knows
//! whether the user already follows them, so results carry real counts and
//! a definite `following` flag.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use url::form_urlencoded;

use crate::error::{AppError, DiscoveryError, DiscoveryErrorKind as Kind, Result};
use crate::models::{CandidateHandle, HandleKind, ResolvedAccount};
use crate::services::accounts::AccountLookup;
use crate::utils::http::{FetchRequest, FetchResponse, Fetcher};
use crate::utils::url::{https_origin, strip_trailing_slash};

/// Mastodon `Account` entity, reduced to the fields we map.
#[derive(Debug, Deserialize)]
struct AccountEntity {
    id: String,
    username: String,
    #[serde(default)]
    display_name: String,
    url: Option<String>,
    uri: Option<String>,
    #[serde(default)]
    followers_count: Option<u64>,
    #[serde(default)]
    following_count: Option<u64>,
    #[serde(default)]
    statuses_count: Option<u64>,
    avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    accounts: Vec<AccountEntity>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    id: String,
    #[serde(default)]
    following: bool,
}

/// Looks accounts up via `/api/v1/accounts/lookup` on a home instance.
#[derive(Clone)]
pub struct HomeInstanceLookup {
    fetcher: Arc<dyn Fetcher>,
    base: String,
    access_token: String,
}

impl HomeInstanceLookup {
    /// `instance_url` must be an https URL; only its origin is used.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        instance_url: &str,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        let origin = https_origin(instance_url).ok_or_else(|| {
            AppError::argument(instance_url, "home instance must be an https URL")
        })?;
        Ok(Self {
            fetcher,
            base: strip_trailing_slash(&origin),
            access_token: access_token.into(),
        })
    }

    async fn get(&self, path_and_query: &str) -> std::result::Result<FetchResponse, DiscoveryError> {
        let request = FetchRequest::get(format!("{}{}", self.base, path_and_query))
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", self.access_token));
        let response = self
            .fetcher
            .fetch(request)
            .await
            .map_err(|e| DiscoveryError::with_detail(Kind::RemoteUserError, e))?;

        match response.status {
            200..=299 => Ok(response),
            404 | 410 => Err(DiscoveryError::with_detail(
                Kind::RemoteUserNotFound,
                format!("HTTP {}", response.status),
            )),
            status => Err(DiscoveryError::with_detail(
                Kind::RemoteUserError,
                format!("HTTP {status}"),
            )),
        }
    }

    async fn find_account(
        &self,
        handle: &CandidateHandle,
    ) -> std::result::Result<AccountEntity, DiscoveryError> {
        match handle.kind() {
            HandleKind::Acct(_) => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair("acct", &handle.to_string())
                    .finish();
                let response = self.get(&format!("/api/v1/accounts/lookup?{query}")).await?;
                response
                    .json::<AccountEntity>()
                    .map_err(|e| DiscoveryError::with_detail(Kind::RemoteUserError, e))
            }
            HandleKind::Profile(url) => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair("q", url.as_str())
                    .append_pair("resolve", "true")
                    .append_pair("type", "accounts")
                    .append_pair("limit", "1")
                    .finish();
                let response = self.get(&format!("/api/v2/search?{query}")).await?;
                let results = response
                    .json::<SearchResults>()
                    .map_err(|e| DiscoveryError::with_detail(Kind::RemoteUserError, e))?;
                results.accounts.into_iter().next().ok_or_else(|| {
                    DiscoveryError::with_detail(Kind::RemoteUserNotFound, "no search match")
                })
            }
        }
    }

    async fn is_following(&self, id: &str) -> std::result::Result<bool, DiscoveryError> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("id[]", id)
            .finish();
        let response = self
            .get(&format!("/api/v1/accounts/relationships?{query}"))
            .await?;
        let relationships = response
            .json::<Vec<Relationship>>()
            .map_err(|e| DiscoveryError::with_detail(Kind::RemoteUserError, e))?;
        Ok(relationships
            .into_iter()
            .find(|r| r.id == id)
            .is_some_and(|r| r.following))
    }
}

#[async_trait]
impl AccountLookup for HomeInstanceLookup {
    async fn lookup(
        &self,
        handle: &CandidateHandle,
    ) -> std::result::Result<ResolvedAccount, DiscoveryError> {
        let entity = self.find_account(handle).await?;
        let following = self.is_following(&entity.id).await?;

        let url = entity
            .url
            .or(entity.uri)
            .unwrap_or_else(|| format!("{}/@{}", self.base, entity.username));
        let name = if entity.display_name.is_empty() {
            entity.username.clone()
        } else {
            entity.display_name
        };

        Ok(ResolvedAccount {
            id: entity.id,
            account: handle.to_string(),
            username: entity.username,
            name,
            followers_count: entity.followers_count,
            following_count: entity.following_count,
            statuses_count: entity.statuses_count,
            url,
            avatar_image_url: entity.avatar,
            following: Some(following),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::testing::StubFetcher;
    use serde_json::json;

    const HOME: &str = "https://home.example";

    fn alice() -> serde_json::Value {
        json!({
            "id": "109",
            "username": "alice",
            "acct": "alice@remote.example",
            "display_name": "Alice",
            "url": "https://remote.example/@alice",
            "followers_count": 10,
            "following_count": 20,
            "statuses_count": 30,
            "avatar": "https://home.example/avatars/alice.png"
        })
    }

    fn lookup(stub: StubFetcher) -> (HomeInstanceLookup, Arc<StubFetcher>) {
        let stub = Arc::new(stub);
        let lookup = HomeInstanceLookup::new(stub.clone(), "https://home.example/settings", "t0ken").unwrap();
        (lookup, stub)
    }

    #[test]
    fn test_rejects_plain_http_instance() {
        let stub: Arc<dyn Fetcher> = Arc::new(StubFetcher::new());
        assert!(HomeInstanceLookup::new(stub, "http://home.example", "t").is_err());
    }

    #[tokio::test]
    async fn test_lookup_by_acct() {
        let stub = StubFetcher::new()
            .json(
                &format!("{HOME}/api/v1/accounts/lookup?acct=alice%40remote.example"),
                200,
                alice(),
            )
            .json(
                &format!("{HOME}/api/v1/accounts/relationships?id%5B%5D=109"),
                200,
                json!([{ "id": "109", "following": true }]),
            );
        let (lookup, stub) = lookup(stub);

        let handle = CandidateHandle::parse("alice@remote.example").unwrap();
        let account = lookup.lookup(&handle).await.unwrap();
        assert_eq!(account.id, "109");
        assert_eq!(account.account, "alice@remote.example");
        assert_eq!(account.name, "Alice");
        assert_eq!(account.followers_count, Some(10));
        assert_eq!(account.statuses_count, Some(30));
        assert_eq!(account.following, Some(true));

        let request = &stub.requests()[0];
        assert!(request
            .headers
            .contains(&("Authorization".into(), "Bearer t0ken".into())));
    }

    #[tokio::test]
    async fn test_lookup_by_profile_url() {
        let stub = StubFetcher::new()
            .json(
                &format!(
                    "{HOME}/api/v2/search?q=https%3A%2F%2Fremote.example%2F%40alice&resolve=true&type=accounts&limit=1"
                ),
                200,
                json!({ "accounts": [alice()], "statuses": [], "hashtags": [] }),
            )
            .json(
                &format!("{HOME}/api/v1/accounts/relationships?id%5B%5D=109"),
                200,
                json!([{ "id": "109", "following": false }]),
            );
        let (lookup, _) = lookup(stub);

        let handle = CandidateHandle::parse("https://remote.example/@alice").unwrap();
        let account = lookup.lookup(&handle).await.unwrap();
        assert_eq!(account.username, "alice");
        assert_eq!(account.following, Some(false));
    }

    #[tokio::test]
    async fn test_empty_search_is_not_found() {
        let stub = StubFetcher::new().json(
            &format!(
                "{HOME}/api/v2/search?q=https%3A%2F%2Fremote.example%2F%40ghost&resolve=true&type=accounts&limit=1"
            ),
            200,
            json!({ "accounts": [] }),
        );
        let (lookup, _) = lookup(stub);

        let handle = CandidateHandle::parse("https://remote.example/@ghost").unwrap();
        let err = lookup.lookup(&handle).await.unwrap_err();
        assert_eq!(err.kind, Kind::RemoteUserNotFound);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let url = format!("{HOME}/api/v1/accounts/lookup?acct=alice%40remote.example");
        let handle = CandidateHandle::parse("alice@remote.example").unwrap();

        let (not_found, _) = lookup(StubFetcher::new().json(&url, 404, json!({ "error": "Record not found" })));
        assert_eq!(not_found.lookup(&handle).await.unwrap_err().kind, Kind::RemoteUserNotFound);

        let (unauthorized, _) = lookup(StubFetcher::new().json(&url, 401, json!({})));
        assert_eq!(unauthorized.lookup(&handle).await.unwrap_err().kind, Kind::RemoteUserError);

        let (broken, _) = lookup(StubFetcher::new().json(&url, 503, json!({})));
        let err = broken.lookup(&handle).await.unwrap_err();
        assert_eq!(err.kind, Kind::RemoteUserError);
        assert_eq!(err.detail.as_deref(), Some("HTTP 503"));
    }
}
