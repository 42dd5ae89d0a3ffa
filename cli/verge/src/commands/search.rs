use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use tracing::{debug, instrument};
use verge_catalog::{
    Client,
    ClientTrait,
    DEFAULT_CURRENCY,
    DEFAULT_MAX_PRICE,
    DEFAULT_MIN_PRICE,
    PriceFilter,
};
use verge_rust_sdk::models::query::{RawFilters, RawPrice, normalize};

use crate::config::Config;
use crate::utils::message;
use crate::utils::search::{DisplaySearchResults, render_results_json};

const VERGE_SHOW_HINT: &str = "Use 'verge show <id>' to see item details";

// Facet filters shared by commands that search the catalog
#[derive(Debug, Bpaf, Clone, Default, PartialEq)]
pub struct FilterArgs {
    /// Only items sold in <region> (repeatable)
    #[bpaf(long, argument("region"))]
    pub region: Vec<String>,

    /// Only items available in <size> (repeatable)
    #[bpaf(long("size"), argument("size"))]
    pub sizes: Vec<String>,

    /// Only items in <color> (repeatable)
    #[bpaf(long("color"), argument("color"))]
    pub color_names: Vec<String>,

    /// Only items for <gender> (repeatable)
    #[bpaf(long("gender"), argument("gender"))]
    pub gender_name: Vec<String>,

    /// Only items in <category> (repeatable)
    #[bpaf(long("category"), argument("category"))]
    pub category_name: Vec<String>,

    /// Only items by <brand> (repeatable)
    #[bpaf(long("brand"), argument("brand"))]
    pub brand_name: Vec<String>,

    /// Lowest price to include
    #[bpaf(long, argument("price"))]
    pub min_price: Option<f64>,

    /// Highest price to include
    #[bpaf(long, argument("price"))]
    pub max_price: Option<f64>,

    /// Three letter currency code of the price range
    #[bpaf(long, argument("code"))]
    pub currency: Option<String>,
}

impl FilterArgs {
    fn price_given(&self) -> bool {
        self.min_price.is_some() || self.max_price.is_some() || self.currency.is_some()
    }

    /// Form state for these flags
    ///
    /// Parts of the price range that were not given take their default,
    /// so `--max-price 50` alone is a complete range.
    pub fn to_raw_filters(&self) -> RawFilters {
        fn non_empty(values: &[String]) -> Option<Vec<String>> {
            (!values.is_empty()).then(|| values.to_vec())
        }

        let price = self.price_given().then(|| RawPrice {
            min_price: Some(self.min_price.unwrap_or(DEFAULT_MIN_PRICE)),
            max_price: Some(self.max_price.unwrap_or(DEFAULT_MAX_PRICE)),
            currency: Some(
                self.currency
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            ),
        });

        RawFilters {
            region: non_empty(&self.region),
            sizes: non_empty(&self.sizes),
            color_names: non_empty(&self.color_names),
            gender_name: non_empty(&self.gender_name),
            category_name: non_empty(&self.category_name),
            brand_name: non_empty(&self.brand_name),
            price,
        }
    }

    /// Whether a price range was given that normalization had to replace
    pub fn price_was_rejected(&self, normalized: &PriceFilter) -> bool {
        let Some(raw) = self.to_raw_filters().price else {
            return false;
        };
        let matches_normalized = raw.min_price == Some(normalized.min_price)
            && raw.max_price == Some(normalized.max_price)
            && raw
                .currency
                .is_some_and(|currency| currency.eq_ignore_ascii_case(&normalized.currency));
        !matches_normalized
    }
}

// Search the catalog
#[derive(Debug, Bpaf, Clone)]
pub struct Search {
    /// Display search results as a JSON array
    #[bpaf(long)]
    pub json: bool,

    /// Return at most <n> results
    #[bpaf(long, short('n'), argument("n"))]
    pub limit: Option<i64>,

    #[bpaf(external(filter_args))]
    pub filters: FilterArgs,

    /// Text to search item names for.
    ///
    /// Without a search term all items matching the filters are listed.
    #[bpaf(positional("search-term"))]
    pub search_term: Option<String>,
}

impl Search {
    #[instrument(name = "search", fields(json = self.json, search_term = ?self.search_term), skip_all)]
    pub async fn handle(self, config: Config, client: Client) -> Result<()> {
        let search_term = self.search_term.unwrap_or_default();
        let request = normalize(
            &search_term,
            &self.filters.to_raw_filters(),
            self.limit.or(config.search_limit),
        );
        debug!(?request, "normalized search request");

        if self.filters.price_was_rejected(&request.filters.price) {
            message::warning(format!(
                "Ignoring invalid price range, searching {} to {} {} instead",
                request.filters.price.min_price,
                request.filters.price.max_price,
                request.filters.price.currency
            ));
        }

        let results = client
            .search_catalog(&request)
            .await
            .context("Could not search the catalog")?;

        if self.json {
            debug!("printing search results as JSON");
            return render_results_json(&results);
        }

        if results.is_empty() {
            if search_term.is_empty() {
                bail!("No items matched these filters");
            }
            bail!("No items matched this search term: '{search_term}'");
        }

        let display = DisplaySearchResults::from_results(&results, Some(request.limit.get()));
        println!("{display}");

        let mut hints = String::new();
        if let Some(hint) = display.search_results_truncated_hint() {
            hints.push('\n');
            hints.push_str(&hint);
            hints.push('\n');
        }
        hints.push('\n');
        hints.push_str(VERGE_SHOW_HINT);
        message::plain(hints);

        Ok(())
    }
}
