// src/lib.rs

//! Fediverse discovery library.
//!
//! Crawls the Mastodon federation graph for compatible instances and
//! resolves candidate handles to federated accounts.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;
