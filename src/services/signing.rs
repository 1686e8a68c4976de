//! Request signing seam for authorized actor fetches.
//!
//! Key management lives outside this crate; callers plug in a signer that
//! turns a request description into the extra headers (`Signature`, `Date`,
//! ...) the remote server expects.

use async_trait::async_trait;
use thiserror::Error;

/// What a signer needs to know about an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub accept: &'a str,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("request signing failed: {0}")]
pub struct SignError(pub String);

#[async_trait]
pub trait RequestSigner: Send + Sync {
    /// Headers to add to the request.
    async fn sign(&self, request: &SignableRequest<'_>) -> Result<Vec<(String, String)>, SignError>;
}

/// Signer for servers that allow unauthenticated actor fetches.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsignedRequests;

#[async_trait]
impl RequestSigner for UnsignedRequests {
    async fn sign(&self, _request: &SignableRequest<'_>) -> Result<Vec<(String, String)>, SignError> {
        Ok(Vec::new())
    }
}
