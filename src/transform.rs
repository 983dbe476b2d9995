//! Date-bucketed percent-change aggregation and row reshaping.
//!
//! The aggregation contract: sort observations ascending by date (stable,
//! so duplicate `(date, symbol)` pairs keep their input order and both
//! appear in the output), track each symbol's last-seen price, and emit
//! `(price - prior) / prior * 100` against that prior. What the first
//! observation of a symbol emits is an explicit per-call-site policy; the
//! asset transform uses zero, the upstream series transforms use null.

use std::collections::{BTreeMap, HashMap};

use crate::asset::{
    AssetQuote, CryptoQuote, DateBuckets, PriceQuote, RateQuote, SeriesDay,
    SeriesQuote,
};
use crate::forex::ForexSeries;
use crate::quotes::EodBar;
use crate::store::{AssetRow, CryptoRow, RateRow, StockRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstChangePolicy {
    /// First observation of a symbol reports a change of `0`.
    Zero,
    /// First observation of a symbol reports no change.
    Null,
}

/// One input point for the aggregator: where the price of `symbol` stood
/// on `date`. Dates are ISO `YYYY-MM-DD` strings and are not validated; a
/// malformed date mis-sorts silently.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceObservation {
    pub date: String,
    pub symbol: String,
    pub price: f64,
}

/// Symbol -> last-seen-price map driving the running change computation.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    last_price: HashMap<String, f64>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the percent change of `price` against the symbol's previous
    /// observation and records `price` as the new prior. A prior of exactly
    /// zero yields no change rather than an infinity.
    pub fn observe(&mut self, symbol: &str, price: f64, policy: FirstChangePolicy) -> Option<f64> {
        let change = match self.last_price.get(symbol) {
            Some(prior) if *prior != 0.0 => Some((price - prior) / prior * 100.0),
            Some(_) => None,
            None => match policy {
                FirstChangePolicy::Zero => Some(0.0),
                FirstChangePolicy::Null => None,
            },
        };
        self.last_price.insert(symbol.to_string(), price);
        change
    }
}

/// The bare aggregation operation: unordered observations in, date-keyed
/// buckets of `{symbol, price, change}` out. Pure; a fresh tracker per call.
pub fn bucket_observations(
    mut observations: Vec<PriceObservation>,
    policy: FirstChangePolicy,
) -> BTreeMap<String, Vec<SeriesQuote>> {
    observations.sort_by(|a, b| a.date.cmp(&b.date));

    let mut tracker = ChangeTracker::new();
    let mut buckets: BTreeMap<String, Vec<SeriesQuote>> = BTreeMap::new();
    for obs in observations {
        let change = tracker.observe(&obs.symbol, obs.price, policy);
        buckets.entry(obs.date).or_default().push(SeriesQuote {
            symbol: obs.symbol,
            price: obs.price,
            change,
        });
    }
    buckets
}

/// `assets` table rows -> date buckets with a running day-over-day change.
/// First observation of a symbol reports `0`.
pub fn transform_asset_rows(mut rows: Vec<AssetRow>) -> DateBuckets<AssetQuote> {
    rows.sort_by(|a, b| a.price_date.cmp(&b.price_date));

    let mut tracker = ChangeTracker::new();
    let mut out: DateBuckets<AssetQuote> = BTreeMap::new();
    for row in rows {
        let date = date_only(&row.price_date);
        let change = tracker.observe(&row.symbol, row.price, FirstChangePolicy::Zero);
        out.entry(date).or_default().currencies.push(AssetQuote {
            symbol: row.symbol,
            price: row.price,
            volume: row.volume,
            name: row.name,
            change,
        });
    }
    out
}

/// `crypto` table rows -> date buckets. The lookback changes are already on
/// the rows; this only buckets, orders, and strips the quote-asset suffix.
pub fn transform_crypto_rows(mut rows: Vec<CryptoRow>) -> DateBuckets<CryptoQuote> {
    rows.sort_by(|a, b| a.date.cmp(&b.date));

    let mut out: DateBuckets<CryptoQuote> = BTreeMap::new();
    for row in rows {
        let date = date_only(&row.date);
        out.entry(date).or_default().currencies.push(CryptoQuote {
            symbol: strip_usdt(&row.symbol),
            close: row.close,
            volume: row.volume,
            change_1d: row.change_1d,
            change_7d: row.change_7d,
            change_1m: row.change_1m,
            change_3m: row.change_3m,
            change_1y: row.change_1y,
        });
    }
    out
}

/// `stocks` table rows -> date buckets, same lookback-change shape.
pub fn transform_stock_rows(mut rows: Vec<StockRow>) -> DateBuckets<PriceQuote> {
    rows.sort_by(|a, b| a.price_date.cmp(&b.price_date));

    let mut out: DateBuckets<PriceQuote> = BTreeMap::new();
    for row in rows {
        let date = date_only(&row.price_date);
        out.entry(date).or_default().currencies.push(PriceQuote {
            symbol: strip_usdt(&row.symbol),
            price: row.price,
            volume: row.volume,
            change_1d: row.change_1d,
            change_7d: row.change_7d,
            change_1m: row.change_1m,
            change_3m: row.change_3m,
            change_1y: row.change_1y,
        });
    }
    out
}

/// `rates` table rows -> date buckets of per-source rate records.
pub fn transform_rate_rows(mut rows: Vec<RateRow>) -> DateBuckets<RateQuote> {
    rows.sort_by(|a, b| a.price_date.cmp(&b.price_date));

    let mut out: DateBuckets<RateQuote> = BTreeMap::new();
    for row in rows {
        let date = date_only(&row.price_date);
        out.entry(date).or_default().currencies.push(RateQuote {
            source: row.source,
            rate: row.rate,
            change_1m: row.change_1m,
            change_3m: row.change_3m,
            change_6m: row.change_6m,
            change_1y: row.change_1y,
        });
    }
    out
}

/// Upstream forex timeseries -> ordered days with a day-over-day change per
/// pair, labelled `USD/XXX`. The first date (and any symbol missing from
/// the previous date, or with a zero prior rate) reports a null change.
/// Changes are rounded to two decimal places.
pub fn transform_forex_series(series: &ForexSeries) -> Vec<SeriesDay> {
    let mut out = Vec::with_capacity(series.len());
    let mut previous: Option<&BTreeMap<String, f64>> = None;

    for (date, rates) in series {
        let currencies = rates
            .iter()
            .map(|(symbol, price)| {
                let change = previous
                    .and_then(|prev| prev.get(symbol))
                    .filter(|prior| **prior != 0.0)
                    .map(|prior| round2((price - prior) / prior * 100.0));
                SeriesQuote {
                    symbol: format!("USD/{symbol}"),
                    price: *price,
                    change,
                }
            })
            .collect();

        out.push(SeriesDay {
            date: date.clone(),
            currencies,
        });
        previous = Some(rates);
    }

    out
}

/// Per-symbol EOD series -> ordered days with a running per-symbol change.
/// Every series goes through the aggregator, so a change is only ever
/// computed against the same symbol's prior close.
pub fn transform_quote_series(series: &HashMap<String, Vec<EodBar>>) -> Vec<SeriesDay> {
    let mut symbols: Vec<&String> = series.keys().collect();
    symbols.sort();

    let mut observations = Vec::new();
    for symbol in symbols {
        for bar in &series[symbol] {
            observations.push(PriceObservation {
                date: date_only(&bar.date),
                symbol: symbol.clone(),
                price: bar.price,
            });
        }
    }

    bucket_observations(observations, FirstChangePolicy::Null)
        .into_iter()
        .map(|(date, currencies)| SeriesDay { date, currencies })
        .collect()
}

/// Keeps the buckets whose date key starts with `date_prefix`.
pub fn filter_buckets_by_date<T>(buckets: DateBuckets<T>, date_prefix: &str) -> DateBuckets<T> {
    buckets
        .into_iter()
        .filter(|(date, _)| date.starts_with(date_prefix))
        .collect()
}

pub fn strip_usdt(symbol: &str) -> String {
    symbol.replace("USDT", "")
}

fn date_only(raw: &str) -> String {
    raw.split('T').next().unwrap_or(raw).to_string()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(date: &str, symbol: &str, price: f64) -> PriceObservation {
        PriceObservation {
            date: date.to_string(),
            symbol: symbol.to_string(),
            price,
        }
    }

    #[test]
    fn tracker_uses_each_symbols_own_prior() {
        let mut tracker = ChangeTracker::new();
        assert_eq!(tracker.observe("BTC", 100.0, FirstChangePolicy::Null), None);
        assert_eq!(
            tracker.observe("ETH", 10.0, FirstChangePolicy::Zero),
            Some(0.0)
        );
        assert_eq!(
            tracker.observe("BTC", 110.0, FirstChangePolicy::Null),
            Some(10.0)
        );
        assert_eq!(
            tracker.observe("ETH", 9.0, FirstChangePolicy::Zero),
            Some(-10.0)
        );
    }

    #[test]
    fn zero_prior_price_yields_null_change() {
        let mut tracker = ChangeTracker::new();
        tracker.observe("XAU", 0.0, FirstChangePolicy::Zero);
        assert_eq!(tracker.observe("XAU", 5.0, FirstChangePolicy::Zero), None);
    }

    #[test]
    fn duplicate_date_symbol_pairs_both_appear() {
        let buckets = bucket_observations(
            vec![
                obs("2025-01-02", "BTC", 100.0),
                obs("2025-01-02", "BTC", 110.0),
            ],
            FirstChangePolicy::Null,
        );

        let day = &buckets["2025-01-02"];
        assert_eq!(day.len(), 2);
        assert_eq!(day[0].change, None);
        // The second entry's change is computed against the first.
        assert_eq!(day[1].change, Some(10.0));
    }

    #[test]
    fn strip_usdt_removes_suffix_everywhere() {
        assert_eq!(strip_usdt("BTCUSDT"), "BTC");
        assert_eq!(strip_usdt("ETH"), "ETH");
    }

    #[test]
    fn date_only_strips_time_suffix() {
        assert_eq!(date_only("2025-01-02T00:00:00Z"), "2025-01-02");
        assert_eq!(date_only("2025-01-02"), "2025-01-02");
    }

    #[test]
    fn forex_change_rounds_to_two_decimals() {
        let mut series = ForexSeries::new();
        series.insert(
            "2025-01-01".to_string(),
            BTreeMap::from([("JPY".to_string(), 150.0)]),
        );
        series.insert(
            "2025-01-02".to_string(),
            BTreeMap::from([("JPY".to_string(), 150.5)]),
        );

        let days = transform_forex_series(&series);
        assert_eq!(days[0].currencies[0].change, None);
        assert_eq!(days[1].currencies[0].symbol, "USD/JPY");
        // (150.5 - 150) / 150 * 100 = 0.3333... -> 0.33
        assert_eq!(days[1].currencies[0].change, Some(0.33));
    }
}
