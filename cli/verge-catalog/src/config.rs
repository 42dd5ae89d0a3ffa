//! Configuration types for catalog client construction.

use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for catalog client construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogClientConfig {
    /// Base URL for the catalog API.
    ///
    /// Endpoints are resolved relative to this URL,
    /// so `http://host/api` searches at `http://host/api/search`.
    pub catalog_url: String,
    /// Optional bearer token sent with every request.
    pub token: Option<String>,
    /// Additional headers to include in requests.
    pub extra_headers: BTreeMap<String, String>,
    /// Overrides the default `reqwest` user agent.
    pub user_agent: Option<String>,
    pub connect_timeout: Duration,
    /// Upper bound for a whole request including reading the body.
    pub request_timeout: Duration,
}

impl CatalogClientConfig {
    pub fn new(catalog_url: impl Into<String>) -> Self {
        Self {
            catalog_url: catalog_url.into(),
            token: None,
            extra_headers: BTreeMap::new(),
            user_agent: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}
