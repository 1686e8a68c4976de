// src/models/mod.rs

//! Domain models for discovery and resolution.

mod account;
mod config;
mod event;
mod handle;
mod instance;

// Re-export all public types
pub use account::ResolvedAccount;
pub use config::{Config, CrawlerConfig, ResolverConfig};
pub use event::{CrawlEvent, EventSink};
pub use handle::{CandidateHandle, HandleKind, extract_candidates};
pub use instance::{InstanceDiscovery, InstanceRecord, Software, Usage};
