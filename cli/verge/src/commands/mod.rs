mod browse;
mod general;
mod search;
mod show;

use anyhow::{Result, anyhow};
use bpaf::Bpaf;
use indoc::indoc;
use tracing::debug;

use crate::config::Config;
use crate::utils::init::init_catalog_client;

const VERGE_DESCRIPTION: &str = indoc! {"
    verge searches a product catalog.

    Results for an empty search can be served from a local snapshot,
    everything else is looked up in the catalog service."
};

fn vec_len<T>(x: Vec<T>) -> usize {
    Vec::len(&x)
}

#[derive(Bpaf, Clone, Copy, Debug, PartialEq)]
pub enum Verbosity {
    Verbose(
        /// Increase logging verbosity
        ///
        /// Invoke multiple times for increasing detail.
        #[bpaf(short('v'), long("verbose"), req_flag(()), many, map(vec_len))]
        usize,
    ),

    /// Silence logs except for errors
    #[bpaf(short, long)]
    Quiet,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Verbose(0)
    }
}

#[derive(Bpaf)]
#[bpaf(
    options,
    version,
    descr(VERGE_DESCRIPTION),
    footer("Set RUST_LOG to override the log filter.")
)]
pub struct VergeCli(#[bpaf(external(verge_args))] pub VergeArgs);

/// Main verge args parser
///
/// To parse the verge CLI, use [`VergeCli`] instead using [`verge_cli()`].
#[derive(Debug, Bpaf)]
#[bpaf(ignore_rustdoc)] // we don't want this struct to be interpreted as a group
pub struct VergeArgs {
    /// Verbose mode
    ///
    /// Invoke multiple times for increasing detail.
    #[bpaf(external, fallback(Default::default()))]
    pub verbosity: Verbosity,

    #[bpaf(external(commands))]
    command: Commands,
}

impl VergeArgs {
    /// Initialize the catalog client and run the selected command
    ///
    /// Commands run on a [tokio::task::LocalSet] and are cancelled on ctrl-c.
    pub async fn handle(self, config: Config) -> Result<()> {
        // viewing the config must work even if the catalog client cannot be created
        let command = match self.command {
            Commands::Config(args) => return args.handle(config),
            command => command,
        };

        let client = init_catalog_client(&config)?;
        debug!(?command, "running command");

        let signal_handler = async { tokio::signal::ctrl_c().await };
        let cli_worker = async move {
            match command {
                Commands::Search(args) => args.handle(config, client).await,
                Commands::Show(args) => args.handle(client).await,
                Commands::Browse(args) => args.handle(config, client).await,
                Commands::Config(args) => args.handle(config),
            }
        };

        // Wait for either an interrupting signal or completion of the cli work
        tokio::task::LocalSet::new()
            .run_until(async {
                tokio::select! {
                    _ = tokio::task::spawn_local(signal_handler) => {
                        Err(anyhow!("user interrupted process"))
                    }
                    result = tokio::task::spawn_local(cli_worker) => result?
                }
            })
            .await
    }
}

#[derive(Bpaf, Clone, Debug)]
enum Commands {
    /// Search the catalog for items
    #[bpaf(
        command,
        footer("Run 'verge show <id>' to see the details of a result.")
    )]
    Search(#[bpaf(external(search::search))] search::Search),

    /// Show the details of a catalog item
    #[bpaf(command)]
    Show(#[bpaf(external(show::show))] show::Show),

    /// Search the catalog interactively
    #[bpaf(
        command,
        footer("Each line of input edits the search, type ':help' for the commands.")
    )]
    Browse(#[bpaf(external(browse::browse))] browse::Browse),

    /// View the verge configuration
    #[bpaf(command)]
    Config(#[bpaf(external(general::config_args))] general::ConfigArgs),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(args: &[&str]) -> VergeArgs {
        let VergeCli(args) = verge_cli().run_inner(args).unwrap();
        args
    }

    #[test]
    fn verbosity_flags() {
        assert_eq!(parse(&["search"]).verbosity, Verbosity::Verbose(0));
        assert_eq!(parse(&["-vv", "search"]).verbosity, Verbosity::Verbose(2));
        assert_eq!(parse(&["--quiet", "search"]).verbosity, Verbosity::Quiet);
    }

    #[test]
    fn search_flags_are_repeatable() {
        let Commands::Search(search) = parse(&[
            "search", "--size", "M", "--size", "L", "--max-price", "50", "-n", "5", "dress",
        ])
        .command
        else {
            panic!("expected search command");
        };
        assert_eq!(search.filters.sizes, vec!["M".to_string(), "L".to_string()]);
        assert_eq!(search.filters.max_price, Some(50.0));
        assert_eq!(search.limit, Some(5));
        assert_eq!(search.search_term.as_deref(), Some("dress"));
    }

    #[test]
    fn config_lists_by_default() {
        assert!(matches!(
            parse(&["config"]).command,
            Commands::Config(general::ConfigArgs::List)
        ));
        assert!(matches!(
            parse(&["config", "--get", "catalog_url"]).command,
            Commands::Config(general::ConfigArgs::Get(key)) if key == "catalog_url"
        ));
    }

    #[test]
    fn show_requires_an_id() {
        assert!(verge_cli().run_inner(&["show"]).is_err());
    }
}
