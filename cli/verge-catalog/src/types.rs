//! Catalog interaction types.
//!
//! These are the shapes exchanged with the catalog service:
//! the canonical [SearchRequest] posted to the search endpoint,
//! and the [Item]s that make up a [ResultSet].

use std::collections::BTreeSet;
use std::num::NonZeroU32;

use derive_more::{Deref, From};
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;

pub const DEFAULT_MIN_PRICE: f64 = 0.0;
pub const DEFAULT_MAX_PRICE: f64 = 1000.0;
pub const DEFAULT_CURRENCY: &str = "USD";

pub type SearchLimit = NonZeroU32;
pub const DEFAULT_SEARCH_LIMIT: SearchLimit = match NonZeroU32::new(10) {
    Some(limit) => limit,
    None => unreachable!(),
};

/// Opaque item identifier.
///
/// The catalog sends identifiers as either JSON strings or integers;
/// both are held as their textual form and compared verbatim.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, derive_more::Display, From,
)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        ItemId(value.to_string())
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WireId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match WireId::deserialize(deserializer)? {
            WireId::Text(text) => ItemId(text),
            WireId::Unsigned(n) => ItemId(n.to_string()),
            WireId::Signed(n) => ItemId(n.to_string()),
        })
    }
}

/// A single catalog entry as shown in result lists and the detail view.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawItem")]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Image URL
    pub image: String,
    pub region: String,
    pub shop_name: String,
    pub current_price: f64,
    /// Discount percentage in `0..=100`
    pub off_percent: f64,
    pub description: Option<String>,
    pub link: Option<String>,
    /// Relevance score assigned by the catalog, if any
    pub score: Option<f64>,
}

/// [Item] as received from the catalog, before validation.
#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(alias = "product_id")]
    id: ItemId,
    name: String,
    #[serde(alias = "image_url")]
    image: String,
    // the semantic search backend does not know about stores
    #[serde(default)]
    region: String,
    #[serde(default)]
    shop_name: String,
    #[serde(default)]
    current_price: f64,
    #[serde(default)]
    off_percent: f64,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ItemValidationError {
    #[error("item '{0}' has an invalid price")]
    InvalidPrice(ItemId),
    #[error("item '{0}' has a discount outside of 0..=100")]
    InvalidDiscount(ItemId),
}

impl TryFrom<RawItem> for Item {
    type Error = ItemValidationError;

    fn try_from(raw: RawItem) -> Result<Self, Self::Error> {
        if !raw.current_price.is_finite() || raw.current_price < 0.0 {
            return Err(ItemValidationError::InvalidPrice(raw.id));
        }
        if !(0.0..=100.0).contains(&raw.off_percent) {
            return Err(ItemValidationError::InvalidDiscount(raw.id));
        }

        Ok(Item {
            id: raw.id,
            name: raw.name,
            image: raw.image,
            region: raw.region,
            shop_name: raw.shop_name,
            current_price: raw.current_price,
            off_percent: raw.off_percent,
            description: raw.description,
            link: raw.link,
            score: raw.score,
        })
    }
}

/// Ordered sequence of items, in the order the catalog returned them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Deref, From)]
#[serde(transparent)]
pub struct ResultSet(Vec<Item>);

impl ResultSet {
    pub fn into_items(self) -> Vec<Item> {
        self.0
    }
}

impl FromIterator<Item> for ResultSet {
    fn from_iter<T: IntoIterator<Item = Item>>(iter: T) -> Self {
        ResultSet(iter.into_iter().collect())
    }
}

impl IntoIterator for ResultSet {
    type IntoIter = std::vec::IntoIter<Item>;
    type Item = Item;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Inclusive price range in a single currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceFilter {
    pub min_price: f64,
    pub max_price: f64,
    /// ISO-style three letter currency code
    pub currency: String,
}

impl Default for PriceFilter {
    fn default() -> Self {
        PriceFilter {
            min_price: DEFAULT_MIN_PRICE,
            max_price: DEFAULT_MAX_PRICE,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

/// Facet constraints of a search.
///
/// An empty facet set places no constraint on that facet.
/// Sets serialize sorted, so equal filters produce identical request bodies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub region: BTreeSet<String>,
    pub sizes: BTreeSet<String>,
    pub color_names: BTreeSet<String>,
    pub gender_name: BTreeSet<String>,
    pub category_name: BTreeSet<String>,
    pub brand_name: BTreeSet<String>,
    pub price: PriceFilter,
}

impl SearchFilters {
    /// Whether these filters are equivalent to having no filters at all
    pub fn is_unconstrained(&self) -> bool {
        self.region.is_empty()
            && self.sizes.is_empty()
            && self.color_names.is_empty()
            && self.gender_name.is_empty()
            && self.category_name.is_empty()
            && self.brand_name.is_empty()
            && self.price == PriceFilter::default()
    }
}

/// Canonical body of a search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub text_query: String,
    pub filters: SearchFilters,
    pub limit: SearchLimit,
}

impl SearchRequest {
    /// An empty query with no constraints, as used to capture the initial catalog
    pub fn unconstrained(limit: SearchLimit) -> Self {
        SearchRequest {
            text_query: String::new(),
            filters: SearchFilters::default(),
            limit,
        }
    }

    /// Whether this request would return the catalog's default listing
    pub fn is_unconstrained(&self) -> bool {
        self.text_query.is_empty() && self.filters.is_unconstrained()
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;

    pub fn item(id: &str, name: &str) -> Item {
        Item {
            id: ItemId::from(id),
            name: name.to_string(),
            image: format!("https://img.example/{id}.jpg"),
            region: "QATAR".to_string(),
            shop_name: "6thstreet".to_string(),
            current_price: 100.0,
            off_percent: 3.0,
            description: None,
            link: None,
            score: None,
        }
    }
}
