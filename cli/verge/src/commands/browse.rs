use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bpaf::Bpaf;
use indoc::indoc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, instrument};
use verge_catalog::{Client, DEFAULT_CURRENCY, ResultSet};
use verge_rust_sdk::models::query::{Facet, FacetValue, RawPrice};
use verge_rust_sdk::providers::orchestrator::{SearchEvent, SearchOrchestrator};

use crate::config::Config;
use crate::utils::message;
use crate::utils::search::DisplaySearchResults;

const BROWSE_HELP: &str = indoc! {"
    Type to search item names, an empty line shows everything.
    Commands:
      :<facet> [value, ...]          replace a facet, no values clears it
                                     facets: region, size, color, gender, category, brand
      :price <min> <max> [currency]  limit the price range
      :clear                         reset all filters, keep the search text
      :reset                         reset filters and search text
      :help                          show this message
      :quit                          exit"};

// Interactively search the catalog
//
// Every line read from stdin edits the search.
// Searches run once typing pauses and results are printed as they arrive.
#[derive(Debug, Bpaf, Clone)]
pub struct Browse {
    /// Answer empty searches from a JSON array of items instead of the catalog
    #[bpaf(long, argument("file"))]
    pub snapshot: Option<PathBuf>,
}

/// A single line of input to `verge browse`
#[derive(Debug, Clone, PartialEq)]
pub enum BrowseInput {
    Text(String),
    Facet(Facet, Vec<String>),
    Price(RawPrice),
    Clear,
    Reset,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum BrowseInputError {
    #[error("unknown command ':{0}', type ':help' for a list of commands")]
    UnknownCommand(String),
    #[error("usage: :price <min> <max> [currency]")]
    PriceUsage,
}

fn facet_from_name(name: &str) -> Option<Facet> {
    match name {
        "size" => Some(Facet::Sizes),
        "color" => Some(Facet::ColorNames),
        "gender" => Some(Facet::GenderName),
        "category" => Some(Facet::CategoryName),
        "brand" => Some(Facet::BrandName),
        other => other.parse().ok().filter(|facet| *facet != Facet::Price),
    }
}

/// Parse a line of input
///
/// Lines starting with `:` are commands, anything else replaces the search text.
/// Price bounds that are not numbers are kept as missing,
/// the orchestrator falls back to the default range for them.
pub fn parse_line(line: &str) -> Result<BrowseInput, BrowseInputError> {
    let Some(command) = line.strip_prefix(':') else {
        return Ok(BrowseInput::Text(line.to_string()));
    };

    let (name, rest) = command
        .trim()
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command.trim(), ""));

    let input = match name {
        "q" | "quit" => BrowseInput::Quit,
        "h" | "help" => BrowseInput::Help,
        "clear" => BrowseInput::Clear,
        "reset" => BrowseInput::Reset,
        "price" => {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            let (min, max, currency) = match parts.as_slice() {
                [min, max] => (min, max, DEFAULT_CURRENCY),
                [min, max, currency] => (min, max, *currency),
                _ => return Err(BrowseInputError::PriceUsage),
            };
            BrowseInput::Price(RawPrice {
                min_price: min.parse().ok(),
                max_price: max.parse().ok(),
                currency: Some(currency.to_string()),
            })
        },
        name => {
            let facet = facet_from_name(name)
                .ok_or_else(|| BrowseInputError::UnknownCommand(name.to_string()))?;
            let values = rest
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .collect();
            BrowseInput::Facet(facet, values)
        },
    };
    Ok(input)
}

fn read_snapshot(path: &Path) -> Result<ResultSet> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read snapshot file '{}'", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Could not parse snapshot file '{}'", path.display()))
}

/// Forward an edit to the orchestrator
///
/// Returns `false` once the session should end.
fn apply(orchestrator: &SearchOrchestrator, input: BrowseInput) -> Result<bool> {
    match input {
        BrowseInput::Text(text) => orchestrator.set_text(text)?,
        BrowseInput::Facet(facet, values) => {
            orchestrator.set_filter(facet, FacetValue::Values(values))?
        },
        BrowseInput::Price(price) => orchestrator.set_filter(Facet::Price, FacetValue::Price(price))?,
        BrowseInput::Clear => orchestrator.clear_filters(true)?,
        BrowseInput::Reset => orchestrator.clear_filters(false)?,
        BrowseInput::Help => message::plain(BROWSE_HELP),
        BrowseInput::Quit => return Ok(false),
    }
    Ok(true)
}

fn render(results: &ResultSet) {
    if results.is_empty() {
        message::plain("No items matched");
        return;
    }
    println!("{}\n", DisplaySearchResults::from_results(results, None));
}

impl Browse {
    #[instrument(name = "browse", skip_all)]
    pub async fn handle(self, config: Config, client: Client) -> Result<()> {
        let snapshot = self.snapshot.as_deref().map(read_snapshot).transpose()?;
        let input = BufReader::new(tokio::io::stdin());
        message::plain(BROWSE_HELP);
        browse_session(client, &config, snapshot, input).await
    }
}

/// Run a browse session reading edits from `input`
///
/// At the end of input the session waits for outstanding searches
/// and renders the final results.
async fn browse_session(
    client: Client,
    config: &Config,
    snapshot: Option<ResultSet>,
    input: impl AsyncBufRead + Unpin,
) -> Result<()> {
    let has_snapshot = snapshot.is_some();
    let (orchestrator, driver) =
        SearchOrchestrator::new(client, config.orchestrator_config(), snapshot);
    let driver = tokio::task::spawn_local(driver.run());
    let mut events = orchestrator.subscribe();

    if has_snapshot {
        render(&orchestrator.current_results());
    } else {
        // load the default listing
        orchestrator.clear_filters(false)?;
    }

    let mut lines = input.lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Could not read input")? else {
                    debug!("end of input");
                    break;
                };
                match parse_line(&line) {
                    Ok(input) => {
                        if !apply(&orchestrator, input)? {
                            driver.abort();
                            return Ok(());
                        }
                    },
                    Err(err) => message::warning(err),
                }
            },
            event = events.recv() => match event {
                Ok(SearchEvent::ResultsChanged { seq, source }) => {
                    debug!(seq, ?source, "results changed");
                    render(&orchestrator.current_results());
                },
                Ok(SearchEvent::SearchFailed { failure, .. }) => {
                    message::warning(format!("Search failed, keeping previous results: {failure}"));
                },
                Ok(SearchEvent::Discarded { seq }) => debug!(seq, "discarded stale results"),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "missed search events");
                    render(&orchestrator.current_results());
                },
                Err(RecvError::Closed) => break,
            },
        }
    }

    let displayed = orchestrator.current_results();
    drop(orchestrator);
    let results = driver.await.context("search orchestrator failed")?;
    if results != displayed {
        render(&results);
    }
    Ok(())
}
