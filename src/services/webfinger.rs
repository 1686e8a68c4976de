// src/services/webfinger.rs

//! WebFinger and JRD link-set primitives shared by both resolvers.

use serde::Deserialize;
use serde_json::Value;
use url::form_urlencoded;

pub const JRD_JSON: &str = "application/jrd+json";
pub const ACTIVITY_JSON: &str = "application/activity+json";

/// One entry of a JRD `links` array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(rename = "type", default)]
    pub media_type: Option<String>,
}

/// Build `https://{host}/.well-known/webfinger?resource={resource}`.
pub fn webfinger_url(host: &str, resource: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("resource", resource)
        .finish();
    format!("https://{host}/.well-known/webfinger?{query}")
}

/// Extract the well-formed links from a JRD document.
///
/// Entries missing `rel` or `href` are skipped rather than failing the
/// whole document; a document without a `links` array yields nothing.
pub fn parse_links(document: &Value) -> Vec<Link> {
    document
        .get("links")
        .and_then(Value::as_array)
        .map(|links| {
            links
                .iter()
                .filter_map(|link| Link::deserialize(link).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// First `rel="self"` link with an `https://` href, optionally restricted
/// to one media type. Links failing either check are passed over.
pub fn find_self_link<'a>(links: &'a [Link], media_type: Option<&str>) -> Option<&'a Link> {
    links.iter().find(|link| {
        link.rel == "self"
            && link.href.starts_with("https://")
            && media_type.is_none_or(|wanted| link.media_type.as_deref() == Some(wanted))
    })
}
