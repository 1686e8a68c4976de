//! Service layer for discovery and resolution.
//!
//! - `ProtocolResolver`: domain to Mastodon instance record plus peers
//! - `AccountResolver`: handle to actor over WebFinger and ActivityPub
//! - `HomeInstanceLookup`: handle to account through an authenticated home instance

mod accounts;
mod lookup;
mod protocol;
pub mod signing;
pub mod webfinger;

pub use accounts::{AccountLookup, AccountResolver};
pub use lookup::HomeInstanceLookup;
pub use protocol::{ProtocolResolver, is_supported_nodeinfo_rel};
pub use signing::{RequestSigner, SignError, SignableRequest, UnsignedRequests};

#[cfg(test)]
pub(crate) use protocol::fixtures;
