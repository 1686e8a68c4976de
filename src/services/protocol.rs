// src/services/protocol.rs

//! Instance discovery over WebFinger, NodeInfo and the Mastodon instance API.
//!
//! Resolution of one domain walks these hops, stopping at the first failure:
//!
//! 1. WebFinger probe for `https://{domain}/actor`. A `self` link moves the
//!    base URL to its origin; any failure keeps `https://{domain}/`.
//! 2. `{base}/.well-known/nodeinfo`
//! 3. pick the link whose `rel` is a NodeInfo 1.0/1.1/2.0/2.1 schema
//! 4. fetch that NodeInfo document and check `software.name`
//! 5. the NodeInfo link's origin becomes the instance URL
//! 6. `{instance}/api/v1/instance`
//! 7. `{instance}/api/v1/instance/peers`
//!
//! Only the probe follows redirects.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::error::{DiscoveryError, DiscoveryErrorKind as Kind};
use crate::models::{CrawlerConfig, InstanceDiscovery, InstanceRecord, Software, Usage};
use crate::services::webfinger::{self, JRD_JSON};
use crate::utils::http::{FetchError, FetchRequest, FetchResponse, Fetcher, Redirects};
use crate::utils::url::{https_origin, normalize_host, strip_trailing_slash};

static NODEINFO_SCHEMA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^http://nodeinfo\.diaspora\.software/ns/schema/(?:1\.0|1\.1|2\.0|2\.1)$")
        .expect("nodeinfo schema pattern")
});

/// Whether a link relation names a supported NodeInfo schema version.
pub fn is_supported_nodeinfo_rel(rel: &str) -> bool {
    NODEINFO_SCHEMA_RE.is_match(rel)
}

/// Resolves a domain to an [`InstanceDiscovery`].
#[derive(Clone)]
pub struct ProtocolResolver {
    fetcher: Arc<dyn Fetcher>,
    timeout: Duration,
    software: String,
}

impl ProtocolResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &CrawlerConfig) -> Self {
        Self {
            fetcher,
            timeout: config.timeout(),
            software: config.software.clone(),
        }
    }

    /// Run the full discovery chain for `domain`.
    pub async fn resolve(&self, domain: &str) -> Result<InstanceDiscovery, DiscoveryError> {
        let fallback = Url::parse(&format!("https://{domain}/"))
            .map_err(|e| DiscoveryError::with_detail(Kind::MastodonCrawlError, e))?;
        let base = self.effective_base(domain, fallback).await;

        // NodeInfo well-known
        let well_known = base
            .join(".well-known/nodeinfo")
            .map_err(|e| DiscoveryError::with_detail(Kind::MastodonCrawlError, e))?;
        let response = self.get(well_known.as_str(), Redirects::Manual, None).await?;
        let document = Self::success_json(&response)
            .ok_or_else(|| Self::status_error(Kind::InvalidWellKnownResponse, &response))?;

        // Schema match
        let nodeinfo_href = webfinger::parse_links(&document)
            .into_iter()
            .find(|link| is_supported_nodeinfo_rel(&link.rel) && link.href.starts_with("https://"))
            .map(|link| link.href)
            .ok_or_else(|| DiscoveryError::new(Kind::IncompatibleServer))?;

        // NodeInfo document
        let response = self.get(&nodeinfo_href, Redirects::Manual, None).await?;
        let nodeinfo = Self::success_json(&response)
            .ok_or_else(|| Self::status_error(Kind::InvalidNodeInfoResponse, &response))?;
        let (software, usage) = Self::parse_nodeinfo(&nodeinfo)?;
        if software.name != self.software {
            return Err(DiscoveryError::with_detail(
                Kind::IncompatibleServerSoftware,
                &software.name,
            ));
        }

        // Canonical base
        let instance_base = https_origin(&nodeinfo_href)
            .ok_or_else(|| DiscoveryError::with_detail(Kind::IncompatibleServer, &nodeinfo_href))?;
        let instance_url = strip_trailing_slash(&instance_base);

        // Instance API
        let url = format!("{instance_url}/api/v1/instance");
        let response = self.get(&url, Redirects::Manual, None).await?;
        let instance = Self::success_json(&response)
            .ok_or_else(|| Self::status_error(Kind::InvalidMastodonInstanceResponse, &response))?;
        let uri = Self::parse_instance_uri(&instance)?;

        // Peers
        let url = format!("{instance_url}/api/v1/instance/peers");
        let response = self.get(&url, Redirects::Manual, None).await?;
        let peers = Self::success_json(&response)
            .ok_or_else(|| Self::status_error(Kind::InvalidMastodonPeersResponse, &response))?;
        let peers = peers
            .as_array()
            .ok_or_else(|| DiscoveryError::new(Kind::InvalidPeersResponse))?
            .iter()
            .filter_map(|peer| peer.as_str().map(str::to_string))
            .collect();

        Ok(InstanceDiscovery {
            instance: InstanceRecord {
                uri,
                instance_url,
                software,
                usage,
            },
            peers,
        })
    }

    /// Origin of the WebFinger `self` link, or `fallback` when the probe
    /// fails or carries no usable link.
    async fn effective_base(&self, domain: &str, fallback: Url) -> Url {
        let resource = format!("https://{domain}/actor");
        let url = webfinger::webfinger_url(domain, &resource);
        let response = match self.get(&url, Redirects::Follow, Some(JRD_JSON)).await {
            Ok(response) => response,
            Err(e) => {
                log::debug!("WebFinger probe for {domain} failed ({e}); using domain as base");
                return fallback;
            }
        };

        let linked = Self::success_json(&response).and_then(|doc| {
            let links = webfinger::parse_links(&doc);
            webfinger::find_self_link(&links, None).and_then(|link| https_origin(&link.href))
        });
        match linked {
            Some(base) => {
                if base.host_str() != Some(domain) {
                    log::debug!("{domain} is an alias of {base}");
                }
                base
            }
            None => fallback,
        }
    }

    async fn get(
        &self,
        url: &str,
        redirects: Redirects,
        accept: Option<&str>,
    ) -> Result<FetchResponse, DiscoveryError> {
        let mut request = FetchRequest::get(url)
            .redirects(redirects)
            .timeout(self.timeout);
        if let Some(accept) = accept {
            request = request.header("Accept", accept);
        }

        self.fetcher.fetch(request).await.map_err(|e| match e {
            FetchError::Timeout(url) => DiscoveryError::with_detail(Kind::TimedOut, url),
            other => DiscoveryError::with_detail(Kind::MastodonCrawlError, other),
        })
    }

    fn success_json(response: &FetchResponse) -> Option<Value> {
        if !response.is_success() {
            return None;
        }
        response.json::<Value>().ok()
    }

    fn status_error(kind: Kind, response: &FetchResponse) -> DiscoveryError {
        if response.is_success() {
            DiscoveryError::with_detail(kind, "unparseable body")
        } else {
            DiscoveryError::with_detail(kind, format!("HTTP {}", response.status))
        }
    }

    fn parse_nodeinfo(document: &Value) -> Result<(Software, Usage), DiscoveryError> {
        let software = document.get("software");
        let field = |name: &str| {
            software
                .and_then(|s| s.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let (Some(name), Some(version)) = (field("name"), field("version")) else {
            return Err(DiscoveryError::with_detail(
                Kind::InvalidNodeInfoResponse,
                "missing software.name or software.version",
            ));
        };

        let users = document.get("usage").and_then(|u| u.get("users"));
        let count = |name: &str| users.and_then(|u| u.get(name)).and_then(Value::as_u64);
        let usage = Usage {
            users_active_month: count("activeMonth"),
            users_total: count("total"),
        };

        Ok((Software { name, version }, usage))
    }

    fn parse_instance_uri(instance: &Value) -> Result<String, DiscoveryError> {
        let title = instance.get("title").and_then(Value::as_str);
        let uri = instance.get("uri").and_then(Value::as_str);
        match (title, uri) {
            (Some(_), Some(uri)) => normalize_host(uri).ok_or_else(|| {
                DiscoveryError::with_detail(Kind::InvalidMastodonInstanceResponse, uri)
            }),
            _ => Err(DiscoveryError::with_detail(
                Kind::InvalidMastodonInstanceResponse,
                "missing title or uri",
            )),
        }
    }
}

/// Canned Mastodon responses for tests that walk the discovery chain.
#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::json;

    use crate::services::webfinger::webfinger_url;
    use crate::utils::http::testing::StubFetcher;

    pub fn probe_url(domain: &str) -> String {
        webfinger_url(domain, &format!("https://{domain}/actor"))
    }

    /// Register the full chain for a Mastodon server living at `host`.
    pub fn mastodon(stub: StubFetcher, host: &str, peers: &[&str]) -> StubFetcher {
        stub.json(
            &probe_url(host),
            200,
            json!({ "links": [{ "rel": "self", "type": "application/activity+json", "href": format!("https://{host}/actor") }] }),
        )
        .json(
            &format!("https://{host}/.well-known/nodeinfo"),
            200,
            json!({ "links": [{
                "rel": "http://nodeinfo.diaspora.software/ns/schema/2.0",
                "href": format!("https://{host}/nodeinfo/2.0")
            }] }),
        )
        .json(
            &format!("https://{host}/nodeinfo/2.0"),
            200,
            json!({
                "software": { "name": "mastodon", "version": "4.2.1" },
                "usage": { "users": { "total": 1200, "activeMonth": 300 } }
            }),
        )
        .json(
            &format!("https://{host}/api/v1/instance"),
            200,
            json!({ "title": format!("{host} social"), "uri": host }),
        )
        .json(
            &format!("https://{host}/api/v1/instance/peers"),
            200,
            json!(peers),
        )
    }
}
