//! Utility functions and helpers.

pub mod http;
pub mod url;

pub use self::http::{FetchError, FetchRequest, FetchResponse, Fetcher, Redirects, ReqwestFetcher};
pub use self::url::{is_valid_domain, normalize_host};
