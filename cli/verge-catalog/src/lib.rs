//! HTTP client infrastructure for the verge catalog service.
//!
//! This crate provides:
//! - the wire types exchanged with the catalog ([SearchRequest], [Item], ...)
//! - HTTP client construction with bearer token authentication
//! - a mock client with canned responses for tests and offline use
//! - the error taxonomy for remote operations
//!
//! ## Usage
//!
//! ```ignore
//! use verge_catalog::{CatalogClient, CatalogClientConfig, ClientTrait};
//!
//! let config = CatalogClientConfig::new("http://localhost:8000");
//! let client = CatalogClient::new(config)?;
//! let results = client.search_catalog(&request).await?;
//! ```

mod client;
mod config;
mod error;
mod mock;
pub mod types;

pub use client::{CatalogClient, Client, ClientTrait, ITEMS_PATH, SEARCH_PATH};
pub use config::{CatalogClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
pub use error::{CatalogClientError, ItemError, RemoteFailure};
pub use mock::{
    MockClient,
    MockDataError,
    MockRequest,
    Response as MockResponse,
    VERGE_CATALOG_MOCK_DATA_VAR,
};
pub use types::*;
