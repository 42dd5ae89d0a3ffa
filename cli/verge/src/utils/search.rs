use std::fmt::Display;

use anyhow::Result;
use itertools::Itertools;
use verge_catalog::{Item, ResultSet};

pub const DEFAULT_DESCRIPTION: &str = "<no description provided>";

/// One row of a result listing
#[derive(Debug, PartialEq, Clone)]
struct DisplayItem {
    id: String,
    name: String,
    region: String,
    price: String,
}

impl From<&Item> for DisplayItem {
    fn from(item: &Item) -> Self {
        let price = if item.off_percent > 0.0 {
            format!("{:.2} (-{}%)", item.current_price, item.off_percent)
        } else {
            format!("{:.2}", item.current_price)
        };
        DisplayItem {
            id: item.id.to_string(),
            name: item.name.replace('\n', " "),
            region: item.region.clone(),
            price,
        }
    }
}

/// Renders a [ResultSet] as an aligned table
///
/// An empty result set renders as nothing,
/// it's the caller's responsibility to report that no items matched.
pub struct DisplaySearchResults {
    display_items: Vec<DisplayItem>,
    /// The limit the results were requested with, if any
    limit: Option<u32>,
}

impl DisplaySearchResults {
    pub(crate) fn from_results(results: &ResultSet, limit: Option<u32>) -> DisplaySearchResults {
        DisplaySearchResults {
            display_items: results.iter().map(DisplayItem::from).collect(),
            limit,
        }
    }

    /// A hint about narrowing the search, if the listing may have been cut off
    pub(crate) fn search_results_truncated_hint(&self) -> Option<String> {
        let limit = self.limit?;
        if self.display_items.len() < limit as usize {
            return None;
        }
        Some(format!(
            "Showing the first {limit} results. Use '--limit' or refine the search to see more."
        ))
    }
}

impl Display for DisplaySearchResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id_width = self
            .display_items
            .iter()
            .map(|d| d.id.chars().count())
            .max()
            .unwrap_or_default();
        let region_width = self
            .display_items
            .iter()
            .map(|d| d.region.chars().count())
            .max()
            .unwrap_or_default();
        let price_width = self
            .display_items
            .iter()
            .map(|d| d.price.chars().count())
            .max()
            .unwrap_or_default();

        let rows = self.display_items.iter().format_with("\n", |d, cb| {
            cb(&format_args!(
                "{id:<id_width$}  {region:<region_width$}  {price:>price_width$}  {name}",
                id = d.id,
                region = d.region,
                price = d.price,
                name = d.name,
            ))
        });
        write!(f, "{rows}")
    }
}

/// Renders a single [Item] with all of its fields
pub struct DisplayItemDetails<'a>(pub &'a Item);

impl Display for DisplayItemDetails<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let item = self.0;
        writeln!(f, "{} - {}", item.id, item.name)?;
        writeln!(
            f,
            "    {}",
            item.description.as_deref().unwrap_or(DEFAULT_DESCRIPTION)
        )?;
        writeln!(f, "    Shop:     {} ({})", item.shop_name, item.region)?;
        write!(f, "    Price:    {:.2}", item.current_price)?;
        if item.off_percent > 0.0 {
            write!(f, " ({}% off)", item.off_percent)?;
        }
        if let Some(link) = &item.link {
            write!(f, "\n    Link:     {link}")?;
        }
        write!(f, "\n    Image:    {}", item.image)
    }
}

/// Print results as a JSON array on stdout
pub(crate) fn render_results_json(results: &ResultSet) -> Result<()> {
    let json = serde_json::to_string(results)?;
    println!("{json}");
    Ok(())
}
