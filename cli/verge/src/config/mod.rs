use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config as HierarchicalConfig, Environment};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use verge_rust_sdk::catalog::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use verge_rust_sdk::providers::orchestrator::{DEFAULT_DEBOUNCE, OrchestratorConfig};

/// Name of the verge managed config directory
const VERGE_DIR_NAME: &str = "verge";
const VERGE_CONFIG_DIR_VAR: &str = "VERGE_CONFIG_DIR";
const VERGE_ENV_PREFIX: &str = "VERGE_";
pub const VERGE_CONFIG_FILE: &str = "verge.toml";

pub const DEFAULT_CATALOG_URL: &str = "http://localhost:8000";

/// Describes the configuration of the verge CLI
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// Base URL of the catalog service
    pub catalog_url: String,

    /// Bearer token sent to the catalog
    pub catalog_token: Option<String>,

    /// How many items a search should return by default
    pub search_limit: Option<i64>,

    /// Quiet period after the last edit in `verge browse` before searching
    pub debounce_ms: u64,

    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,

    /// Do not repeat a search whose request equals the previous one
    pub skip_unchanged: bool,

    /// Directory where verge loads its configuration file (default:
    /// `$XDG_CONFIG_HOME/verge`)
    pub config_dir: PathBuf,
}

/// Error returned by [`Config::get()`]
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Invalid config key: '{0}'")]
    InvalidKey(String),
    #[error("Config key '{0}' is not set")]
    Unset(String),
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

impl Config {
    fn read_raw_config() -> Result<HierarchicalConfig> {
        let user_config_dir = dirs::config_dir().map(|dir| dir.join(VERGE_DIR_NAME));

        let config_dir: PathBuf = match env::var(VERGE_CONFIG_DIR_VAR) {
            Ok(v) => {
                debug!("`${VERGE_CONFIG_DIR_VAR}` set: {v}");
                v.into()
            },
            Err(_) => {
                let config_dir = user_config_dir
                    .clone()
                    .context("Could not determine the user config directory")?;
                debug!("`${VERGE_CONFIG_DIR_VAR}` not set, using {config_dir:?}");
                config_dir
            },
        };

        let config_dir_str = config_dir
            .to_str()
            .with_context(|| format!("Config directory is not valid UTF-8: {config_dir:?}"))?
            .to_string();

        let mut builder = HierarchicalConfig::builder()
            .set_default("catalog_url", DEFAULT_CATALOG_URL)?
            .set_default("debounce_ms", DEFAULT_DEBOUNCE.as_millis() as u64)?
            .set_default("connect_timeout_secs", DEFAULT_CONNECT_TIMEOUT.as_secs())?
            .set_default("request_timeout_secs", DEFAULT_REQUEST_TIMEOUT.as_secs())?
            .set_default("skip_unchanged", false)?
            // Config dir is added to the config for completeness;
            // the config file cannot change the config dir.
            .set_override("config_dir", config_dir_str)?;

        // read from /etc
        builder = builder.add_source(
            config::File::from(PathBuf::from("/etc").join(VERGE_CONFIG_FILE))
                .format(config::FileFormat::Toml)
                .required(false),
        );

        // the user's config file, unless $VERGE_CONFIG_DIR points there anyway
        if let Some(user_config_dir) = user_config_dir.filter(|dir| *dir != config_dir) {
            builder = builder.add_source(
                config::File::from(user_config_dir.join(VERGE_CONFIG_FILE))
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        // Add explicit VERGE_CONFIG_DIR file last
        builder = builder.add_source(
            config::File::from(config_dir.join(VERGE_CONFIG_FILE))
                .format(config::FileFormat::Toml)
                .required(false),
        );

        // override via env variables
        let verge_envs = env::vars()
            .filter_map(|(k, v)| {
                k.strip_prefix(VERGE_ENV_PREFIX)
                    .filter(|k| *k != "CONFIG_DIR")
                    .map(|k| (k.to_owned(), v))
            })
            .collect::<HashMap<_, _>>();

        let builder = builder.add_source(
            Environment::default()
                .source(Some(verge_envs))
                .try_parsing(true),
        );

        Ok(builder.build()?)
    }

    /// Creates a [Config] from the environment and config files
    pub fn parse() -> Result<Config> {
        let raw_config = Self::read_raw_config()?;
        let cli_config: Config = raw_config
            .try_deserialize()
            .context("Could not parse config")?;
        Ok(cli_config)
    }

    /// get a value from the config
    ///
    /// **intended for human consumption/introspection of config only**
    ///
    /// Values in the context should be read from the [Config] type instead!
    pub fn get(&self, key: Option<&str>) -> Result<String, ReadError> {
        let Some(key) = key else {
            return Ok(toml::to_string(self)?);
        };

        let document = toml::Value::try_from(self)?;
        match document.get(key) {
            Some(value) => Ok(value.to_string()),
            None if Self::KEYS.contains(&key) => Err(ReadError::Unset(key.to_string())),
            None => Err(ReadError::InvalidKey(key.to_string())),
        }
    }

    const KEYS: &[&str] = &[
        "catalog_url",
        "catalog_token",
        "search_limit",
        "debounce_ms",
        "connect_timeout_secs",
        "request_timeout_secs",
        "skip_unchanged",
        "config_dir",
    ];

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            limit: self.search_limit,
            skip_unchanged: self.skip_unchanged,
        }
    }
}
