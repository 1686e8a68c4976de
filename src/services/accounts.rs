// src/services/accounts.rs

//! Open-fediverse account resolution.
//!
//! A handle is resolved through its host's WebFinger endpoint to an
//! ActivityPub actor, which is then fetched with signing headers and mapped
//! to a [`ResolvedAccount`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{DiscoveryError, DiscoveryErrorKind as Kind};
use crate::models::{CandidateHandle, ResolvedAccount};
use crate::services::signing::{RequestSigner, SignableRequest};
use crate::services::webfinger::{self, ACTIVITY_JSON, JRD_JSON};
use crate::utils::http::{FetchRequest, FetchResponse, Fetcher, Redirects};

/// Something that can turn a candidate handle into an account.
#[async_trait]
pub trait AccountLookup: Send + Sync {
    async fn lookup(&self, handle: &CandidateHandle) -> Result<ResolvedAccount, DiscoveryError>;
}

/// Resolves handles against their own servers.
#[derive(Clone)]
pub struct AccountResolver {
    fetcher: Arc<dyn Fetcher>,
    signer: Arc<dyn RequestSigner>,
}

impl AccountResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, signer: Arc<dyn RequestSigner>) -> Self {
        Self { fetcher, signer }
    }

    /// Parse and resolve a raw handle.
    pub async fn resolve(&self, raw: &str) -> Result<ResolvedAccount, DiscoveryError> {
        let handle = CandidateHandle::parse(raw)?;
        self.resolve_handle(&handle).await
    }

    pub async fn resolve_handle(
        &self,
        handle: &CandidateHandle,
    ) -> Result<ResolvedAccount, DiscoveryError> {
        let url = webfinger::webfinger_url(handle.hostname(), &handle.resource());
        let request = FetchRequest::get(&url).header("Accept", JRD_JSON);
        let response = self.fetch(request).await?;
        Self::check_status(&response)?;

        let document = response.json::<Value>().unwrap_or(Value::Null);
        let links = webfinger::parse_links(&document);
        let actor_url = webfinger::find_self_link(&links, Some(ACTIVITY_JSON))
            .map(|link| link.href.clone())
            .ok_or_else(|| {
                DiscoveryError::with_detail(Kind::RemoteUserNotFound, "no activity+json self link")
            })?;

        let signable = SignableRequest {
            method: "GET",
            url: &actor_url,
            accept: ACTIVITY_JSON,
        };
        let signature = self
            .signer
            .sign(&signable)
            .await
            .map_err(|e| DiscoveryError::with_detail(Kind::RemoteUserError, e))?;

        // Signature headers are bound to this URL, so redirects are not followed.
        let request = FetchRequest::get(&actor_url)
            .header("Accept", ACTIVITY_JSON)
            .headers(signature)
            .redirects(Redirects::Manual);
        let response = self.fetch(request).await?;
        Self::check_status(&response)?;

        let actor = response
            .json::<Value>()
            .map_err(|e| DiscoveryError::with_detail(Kind::RemoteUserError, e))?;
        Self::map_actor(handle, &actor)
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, DiscoveryError> {
        self.fetcher
            .fetch(request)
            .await
            .map_err(|e| DiscoveryError::with_detail(Kind::RemoteUserError, e))
    }

    fn check_status(response: &FetchResponse) -> Result<(), DiscoveryError> {
        if response.is_success() {
            Ok(())
        } else if response.is_server_error() {
            Err(DiscoveryError::with_detail(
                Kind::RemoteUserError,
                format!("HTTP {}", response.status),
            ))
        } else {
            Err(DiscoveryError::with_detail(
                Kind::RemoteUserNotFound,
                format!("HTTP {}", response.status),
            ))
        }
    }

    fn map_actor(handle: &CandidateHandle, actor: &Value) -> Result<ResolvedAccount, DiscoveryError> {
        let text = |key: &str| {
            actor
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let id = text("id").ok_or_else(|| {
            DiscoveryError::with_detail(Kind::RemoteUserError, "actor document has no id")
        })?;
        let username = text("preferredUsername")
            .or_else(|| handle.local_part().map(str::to_string))
            .or_else(|| id.rsplit('/').next().map(str::to_string))
            .unwrap_or_default();
        let name = text("name").unwrap_or_else(|| username.clone());
        let url = text("url").unwrap_or_else(|| id.clone());

        let icon = actor.get("icon").map(|icon| match icon {
            Value::Array(items) => items.first().unwrap_or(&Value::Null),
            other => other,
        });
        let avatar_image_url = icon
            .and_then(|icon| icon.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(ResolvedAccount {
            id,
            account: handle.to_string(),
            username,
            name,
            followers_count: None,
            following_count: None,
            statuses_count: None,
            url,
            avatar_image_url,
            following: None,
        })
    }
}

#[async_trait]
impl AccountLookup for AccountResolver {
    async fn lookup(&self, handle: &CandidateHandle) -> Result<ResolvedAccount, DiscoveryError> {
        self.resolve_handle(handle).await
    }
}
