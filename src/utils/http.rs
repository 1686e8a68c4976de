// src/utils/http.rs

//! HTTP fetch capability.
//!
//! Discovery code never talks to `reqwest` directly. It goes through the
//! [`Fetcher`] trait so that redirect handling is chosen per request and
//! tests can substitute canned responses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::Result;

/// Upper bound on a response body read from an untrusted server.
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// How a request treats 3xx responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirects {
    /// Follow redirects (bounded).
    Follow,
    /// Return the 3xx response to the caller untouched.
    Manual,
}

/// An outbound GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub redirects: Redirects,
    pub timeout: Option<Duration>,
}

impl FetchRequest {
    /// A GET that follows redirects and has no deadline of its own.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            redirects: Redirects::Follow,
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn redirects(mut self, redirects: Redirects) -> Self {
        self.redirects = redirects;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fully-read response.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Transport-level failure; HTTP status codes are not errors here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("{0}")]
    Network(String),

    #[error("response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

/// Something that can perform a GET.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> std::result::Result<FetchResponse, FetchError>;
}

/// [`Fetcher`] backed by two `reqwest` clients, one per redirect policy.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    following: reqwest::Client,
    manual: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestFetcher {
    /// Build both clients with the given User-Agent.
    pub fn new(user_agent: &str) -> Result<Self> {
        let following = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(Policy::limited(5))
            .build()?;
        let manual = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            following,
            manual,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    fn client(&self, redirects: Redirects) -> &reqwest::Client {
        match redirects {
            Redirects::Follow => &self.following,
            Redirects::Manual => &self.manual,
        }
    }

    fn classify(url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(url.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: FetchRequest) -> std::result::Result<FetchResponse, FetchError> {
        let mut builder = self.client(request.redirects).get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let mut response = builder
            .send()
            .await
            .map_err(|e| Self::classify(&request.url, e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Self::classify(&request.url, e))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(FetchError::TooLarge {
                    url: request.url,
                    limit: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        log::trace!("GET {} -> {} ({} bytes)", request.url, status, body.len());

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = FetchRequest::get("https://example.com/")
            .header("Accept", "application/json")
            .redirects(Redirects::Manual)
            .timeout(Duration::from_secs(10));

        assert_eq!(request.redirects, Redirects::Manual);
        assert_eq!(request.timeout, Some(Duration::from_secs(10)));
        assert_eq!(
            request.headers,
            vec![("Accept".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn test_response_helpers() {
        let response = FetchResponse {
            status: 503,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: b"[1,2]".to_vec(),
        };
        assert!(!response.is_success());
        assert!(response.is_server_error());
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.json::<Vec<u8>>().unwrap(), vec![1, 2]);
    }
}
