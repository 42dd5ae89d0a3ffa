//! Normalization of raw user input into a canonical [SearchRequest].
//!
//! Form state arrives partially filled and sometimes malformed.
//! [normalize] turns any combination of raw text, [RawFilters] and limit
//! into a request with every field defaulted, and never fails.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::num::NonZeroU32;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;
use verge_catalog::{
    DEFAULT_SEARCH_LIMIT,
    PriceFilter,
    SearchFilters,
    SearchLimit,
    SearchRequest,
};

/// A filterable dimension of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Facet {
    Region,
    Sizes,
    ColorNames,
    GenderName,
    CategoryName,
    BrandName,
    Price,
}

impl Facet {
    pub const ALL: [Facet; 7] = [
        Facet::Region,
        Facet::Sizes,
        Facet::ColorNames,
        Facet::GenderName,
        Facet::CategoryName,
        Facet::BrandName,
        Facet::Price,
    ];

    /// Name of the facet in request bodies and form state
    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Region => "region",
            Facet::Sizes => "sizes",
            Facet::ColorNames => "color_names",
            Facet::GenderName => "gender_name",
            Facet::CategoryName => "category_name",
            Facet::BrandName => "brand_name",
            Facet::Price => "price",
        }
    }
}

impl Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown facet '{0}'")]
pub struct UnknownFacet(pub String);

impl FromStr for Facet {
    type Err = UnknownFacet;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Facet::ALL
            .into_iter()
            .find(|facet| facet.as_str() == s)
            .ok_or_else(|| UnknownFacet(s.to_string()))
    }
}

/// Price range as entered, every part possibly missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPrice {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub currency: Option<String>,
}

/// The value assigned to a [Facet] by a single edit.
#[derive(Debug, Clone, PartialEq)]
pub enum FacetValue {
    Values(Vec<String>),
    Price(RawPrice),
}

/// Filter form state prior to normalization.
///
/// `None` means the facet was never filled in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFilters {
    pub region: Option<Vec<String>>,
    pub sizes: Option<Vec<String>>,
    pub color_names: Option<Vec<String>>,
    pub gender_name: Option<Vec<String>>,
    pub category_name: Option<Vec<String>>,
    pub brand_name: Option<Vec<String>>,
    pub price: Option<RawPrice>,
}

impl RawFilters {
    fn values_mut(&mut self, facet: Facet) -> Option<&mut Option<Vec<String>>> {
        match facet {
            Facet::Region => Some(&mut self.region),
            Facet::Sizes => Some(&mut self.sizes),
            Facet::ColorNames => Some(&mut self.color_names),
            Facet::GenderName => Some(&mut self.gender_name),
            Facet::CategoryName => Some(&mut self.category_name),
            Facet::BrandName => Some(&mut self.brand_name),
            Facet::Price => None,
        }
    }

    /// Replace the whole value of `facet`.
    ///
    /// A value of the wrong kind for the facet is kept as malformed input,
    /// which normalizes to the facet default.
    pub fn set(&mut self, facet: Facet, value: FacetValue) {
        match (facet, value) {
            (Facet::Price, FacetValue::Price(price)) => self.price = Some(price),
            (Facet::Price, FacetValue::Values(_)) => self.price = Some(RawPrice::default()),
            (facet, FacetValue::Values(values)) => {
                if let Some(slot) = self.values_mut(facet) {
                    *slot = Some(values);
                }
            },
            (facet, FacetValue::Price(_)) => {
                if let Some(slot) = self.values_mut(facet) {
                    *slot = None;
                }
            },
        }
    }

    /// Leniently read filter form state from arbitrary JSON.
    ///
    /// Anything that does not have the expected shape is treated as missing:
    /// a facet that is not an array, non-string array entries,
    /// a `price` that is not an object, and price parts of the wrong type.
    pub fn from_json(value: &Value) -> RawFilters {
        let Some(object) = value.as_object() else {
            return RawFilters::default();
        };

        let mut filters = RawFilters::default();
        for facet in Facet::ALL {
            let Some(raw) = object.get(facet.as_str()) else {
                continue;
            };

            if facet == Facet::Price {
                filters.price = raw.as_object().map(|price| RawPrice {
                    min_price: price.get("min_price").and_then(Value::as_f64),
                    max_price: price.get("max_price").and_then(Value::as_f64),
                    currency: price
                        .get("currency")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                });
            } else if let (Some(entries), Some(slot)) = (raw.as_array(), filters.values_mut(facet))
            {
                *slot = Some(
                    entries
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                );
            }
        }
        filters
    }
}

/// Build the canonical request for the given raw input.
///
/// * text is passed through verbatim, whitespace included
/// * missing facets are unconstrained
/// * a missing or malformed price becomes [PriceFilter::default]
/// * a missing or non-positive limit becomes [DEFAULT_SEARCH_LIMIT]
pub fn normalize(raw_text: &str, raw_filters: &RawFilters, raw_limit: Option<i64>) -> SearchRequest {
    fn to_set(values: &Option<Vec<String>>) -> BTreeSet<String> {
        values.iter().flatten().cloned().collect()
    }

    SearchRequest {
        text_query: raw_text.to_string(),
        filters: SearchFilters {
            region: to_set(&raw_filters.region),
            sizes: to_set(&raw_filters.sizes),
            color_names: to_set(&raw_filters.color_names),
            gender_name: to_set(&raw_filters.gender_name),
            category_name: to_set(&raw_filters.category_name),
            brand_name: to_set(&raw_filters.brand_name),
            price: normalize_price(raw_filters.price.as_ref()),
        },
        limit: normalize_limit(raw_limit),
    }
}

fn normalize_price(raw: Option<&RawPrice>) -> PriceFilter {
    let Some(RawPrice {
        min_price: Some(min_price),
        max_price: Some(max_price),
        currency: Some(currency),
    }) = raw
    else {
        return PriceFilter::default();
    };

    let valid_bound = |bound: f64| bound.is_finite() && bound >= 0.0;
    let valid_currency = currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic());

    if !valid_bound(*min_price) || !valid_bound(*max_price) || max_price < min_price {
        return PriceFilter::default();
    }
    if !valid_currency {
        return PriceFilter::default();
    }

    PriceFilter {
        min_price: *min_price,
        max_price: *max_price,
        currency: currency.to_ascii_uppercase(),
    }
}

fn normalize_limit(raw: Option<i64>) -> SearchLimit {
    match raw {
        Some(limit) if limit > 0 => {
            let clamped = u32::try_from(limit).unwrap_or(u32::MAX);
            NonZeroU32::new(clamped).unwrap_or(DEFAULT_SEARCH_LIMIT)
        },
        _ => DEFAULT_SEARCH_LIMIT,
    }
}
