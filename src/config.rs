// src/config.rs

//! Configuration and input loading utilities.
//!
//! This module provides convenience functions for loading configuration,
//! skip lists and handle lists from files.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{CandidateHandle, Config, extract_candidates};
use crate::utils::url::normalize_host;

/// Load configuration from a TOML file, or defaults when no path is given.
///
/// An explicitly named file must exist and parse.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path).map_err(|e| {
            AppError::config(format!("Failed to load config from {}: {}", path.display(), e))
        })?,
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Load a skip list: a JSON array of domain strings.
///
/// Entries are host-normalized; entries that are not domains are dropped
/// with a warning.
pub fn load_skip_list(path: &Path) -> Result<HashSet<String>> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::config(format!("Cannot read skip list {}: {}", path.display(), e)))?;
    let entries: Vec<String> = serde_json::from_str(&content).map_err(|e| {
        AppError::config(format!(
            "Skip list {} is not a JSON array of strings: {}",
            path.display(),
            e
        ))
    })?;

    let skip: HashSet<String> = entries
        .iter()
        .filter_map(|entry| {
            let host = normalize_host(entry);
            if host.is_none() {
                log::warn!("Ignoring skip list entry '{}'", entry);
            }
            host
        })
        .collect();
    log::debug!("Loaded {} skip list entries from {}", skip.len(), path.display());
    Ok(skip)
}

/// Load candidate handles from a text file.
///
/// Each line is either a handle or free text that handles are extracted
/// from. Blank lines and `#` comments are ignored; order is preserved.
pub fn load_handles(path: &Path) -> Result<Vec<CandidateHandle>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_handle_lines(&content))
}

fn parse_handle_lines(content: &str) -> Vec<CandidateHandle> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| match CandidateHandle::parse(line) {
            Ok(handle) => vec![handle],
            Err(_) => extract_candidates(line),
        })
        .filter(|handle| seen.insert(handle.to_string()))
        .collect()
}
