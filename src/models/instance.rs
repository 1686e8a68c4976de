//! Instance records produced by the crawler.

use serde::{Deserialize, Serialize};

/// Server software reported by NodeInfo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Software {
    pub name: String,
    pub version: String,
}

/// User counts reported by NodeInfo, when the server shares them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_active_month: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_total: Option<u64>,
}

/// A compatible instance discovered by the crawler.
///
/// `uri` is the bare canonical host and serves as the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub uri: String,
    pub instance_url: String,
    pub software: Software,
    pub usage: Usage,
}

/// Output of one successful protocol resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDiscovery {
    pub instance: InstanceRecord,
    pub peers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_camel_case() {
        let record = InstanceRecord {
            uri: "example.com".into(),
            instance_url: "https://example.com".into(),
            software: Software {
                name: "mastodon".into(),
                version: "4.2.1".into(),
            },
            usage: Usage {
                users_active_month: Some(12),
                users_total: None,
            },
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "uri": "example.com",
                "instanceUrl": "https://example.com",
                "software": { "name": "mastodon", "version": "4.2.1" },
                "usage": { "usersActiveMonth": 12 }
            })
        );
    }
}
