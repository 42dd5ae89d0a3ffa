use anyhow::Result;
use bpaf::Bpaf;
use tracing::instrument;

use crate::config::Config;

#[derive(Debug, Clone, Bpaf)]
#[bpaf(fallback(ConfigArgs::List))]
pub enum ConfigArgs {
    /// List the current values of all options
    #[bpaf(short, long)]
    List,

    /// Get the current value of <key>
    Get(#[bpaf(long("get"), argument("key"))] String),
}

impl ConfigArgs {
    /// handle config flags like commands
    #[instrument(name = "config", skip_all)]
    pub fn handle(self, config: Config) -> Result<()> {
        match self {
            ConfigArgs::List => print!("{}", config.get(None)?),
            ConfigArgs::Get(key) => println!("{}", config.get(Some(&key))?),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    #[test]
    fn unknown_key_is_an_error() {
        let err = ConfigArgs::Get("nope".to_string())
            .handle(test_config("http://localhost:8000"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid config key: 'nope'");
    }

    #[test]
    fn known_keys_print() {
        ConfigArgs::List
            .handle(test_config("http://localhost:8000"))
            .unwrap();
        ConfigArgs::Get("debounce_ms".to_string())
            .handle(test_config("http://localhost:8000"))
            .unwrap();
    }
}
