use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::debug;
use verge_catalog::{
    CatalogClient,
    CatalogClientConfig,
    Client,
    MockClient,
    VERGE_CATALOG_MOCK_DATA_VAR,
};

use crate::config::Config;

pub const VERGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the catalog client
///
/// - Initialize a mock client if `_VERGE_USE_CATALOG_MOCK` points to a mock data file
/// - Initialize a real client otherwise
pub fn init_catalog_client(config: &Config) -> Result<Client> {
    // if $_VERGE_USE_CATALOG_MOCK is set to a path to mock data, use the mock client
    if let Ok(path_str) = std::env::var(VERGE_CATALOG_MOCK_DATA_VAR) {
        let path = PathBuf::from(path_str);
        if !path.exists() {
            bail!("path to mock data file doesn't exist: {}", path.display());
        }

        debug!(mock_data_path = %path.display(), "using mock catalog client");
        return Ok(MockClient::new(Some(path))?.into());
    }

    let client_config = catalog_client_config(config);
    debug!(catalog_url = %client_config.catalog_url, "using catalog client");
    let client = CatalogClient::new(client_config)
        .with_context(|| format!("Could not create a client for '{}'", config.catalog_url))?;
    Ok(client.into())
}

fn catalog_client_config(config: &Config) -> CatalogClientConfig {
    let mut client_config = CatalogClientConfig::new(&config.catalog_url);
    client_config.token = config.catalog_token.clone();
    client_config.user_agent = Some(format!("verge/{VERGE_VERSION}"));
    client_config.connect_timeout = Duration::from_secs(config.connect_timeout_secs);
    client_config.request_timeout = Duration::from_secs(config.request_timeout_secs);

    // Pass in a bool if we are running in CI, so requests can reflect this in the headers
    if std::env::var("CI").is_ok() {
        client_config
            .extra_headers
            .insert("verge-ci".to_string(), "true".to_string());
    }
    client_config
}
