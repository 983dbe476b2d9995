//! Asset classes and the wire shapes shared by the transformers and the
//! HTTP surface.
//!
//! Every store-backed endpoint answers with a date-bucketed map: ISO date
//! string -> a `currencies` list of per-symbol records. The upstream-backed
//! endpoints (forex, stock quotes) answer with an ordered list of
//! [`SeriesDay`] entries instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Crypto,
    Stocks,
    Forex,
    Indices,
    Bonds,
    Commodities,
}

impl AssetClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crypto => "crypto",
            Self::Stocks => "stocks",
            Self::Forex => "forex",
            Self::Indices => "indices",
            Self::Bonds => "bonds",
            Self::Commodities => "commodities",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetClassError {
    #[error("unknown asset class: {0}")]
    Unknown(String),
}

pub fn parse_asset_class(input: &str) -> Result<AssetClass, AssetClassError> {
    match input {
        "crypto" => Ok(AssetClass::Crypto),
        "stocks" => Ok(AssetClass::Stocks),
        "forex" => Ok(AssetClass::Forex),
        "indices" => Ok(AssetClass::Indices),
        "bonds" => Ok(AssetClass::Bonds),
        "commodities" => Ok(AssetClass::Commodities),
        other => Err(AssetClassError::Unknown(other.to_string())),
    }
}

/// One date bucket: the list of records observed on that date. Duplicate
/// `(date, symbol)` pairs append as separate entries, they are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateBucket<T> {
    pub currencies: Vec<T>,
}

impl<T> Default for DateBucket<T> {
    fn default() -> Self {
        DateBucket {
            currencies: Vec::new(),
        }
    }
}

/// Date-keyed buckets. ISO `YYYY-MM-DD` keys sort chronologically, so the
/// map iterates in date order.
pub type DateBuckets<T> = BTreeMap<String, DateBucket<T>>;

/// Record shape of the `assets` table endpoint: running day-over-day change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetQuote {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub name: String,
    pub change: Option<f64>,
}

/// Record shape of the `crypto` table endpoint: precomputed lookback changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoQuote {
    pub symbol: String,
    pub close: f64,
    pub volume: f64,
    pub change_1d: Option<f64>,
    pub change_7d: Option<f64>,
    pub change_1m: Option<f64>,
    pub change_3m: Option<f64>,
    pub change_1y: Option<f64>,
}

/// Record shape of the `/api/prices/{table}` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub change_1d: Option<f64>,
    pub change_7d: Option<f64>,
    pub change_1m: Option<f64>,
    pub change_3m: Option<f64>,
    pub change_1y: Option<f64>,
}

/// Record shape of the `rates` table endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub source: String,
    pub rate: f64,
    pub change_1m: Option<f64>,
    pub change_3m: Option<f64>,
    pub change_6m: Option<f64>,
    pub change_1y: Option<f64>,
}

/// One per-symbol point inside a [`SeriesDay`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesQuote {
    pub symbol: String,
    pub price: f64,
    pub change: Option<f64>,
}

/// One day of an upstream-backed series (forex or stock quotes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDay {
    pub date: String,
    pub currencies: Vec<SeriesQuote>,
}
