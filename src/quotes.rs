//! Per-symbol end-of-day quote provider.
//!
//! One upstream GET per symbol, a per-symbol same-day cache, and a fixed
//! artificial delay between consecutive upstream calls to stay under the
//! provider's rate limit. A failed symbol becomes a per-symbol failure
//! entry; the rest of the batch still resolves.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::upstream::{
    fetch_with_retry, HttpFetcher, ReqwestBlockingFetcher, RetryPolicy, UpstreamError,
};

pub const DEFAULT_INDEX_SYMBOLS: [&str; 9] = [
    "^GSPC", "^DJI", "^IXIC", "^RUT", "^FTSE", "^N225", "^HSI", "^STOXX50E", "^VIX",
];

/// One end-of-day bar as returned by the quote provider's light endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EodBar {
    pub symbol: String,
    pub date: String,
    pub price: f64,
    #[serde(default)]
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteConfig {
    pub base_url: String,
    pub api_key: String,
    pub inter_request_delay_ms: u64,
    pub http_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://financialmodelingprep.com/stable/historical-price-eod/light"
                .to_string(),
            api_key: String::new(),
            inter_request_delay_ms: 1_000,
            http_timeout_ms: 15_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl QuoteConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(base_url) = std::env::var("MARKETBOARD_QUOTE_BASE_URL") {
            if !base_url.trim().is_empty() {
                cfg.base_url = base_url;
            }
        }
        if let Ok(api_key) = std::env::var("MARKETBOARD_QUOTE_API_KEY") {
            cfg.api_key = api_key;
        }
        if let Ok(delay) = std::env::var("MARKETBOARD_QUOTE_DELAY_MS") {
            if let Ok(parsed) = delay.trim().parse() {
                cfg.inter_request_delay_ms = parsed;
            }
        }
        cfg
    }
}

/// Result of a batch fetch: successful per-symbol series plus per-symbol
/// failure messages for the symbols that could not be fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteBatch {
    pub series: HashMap<String, Vec<EodBar>>,
    pub failures: HashMap<String, String>,
}

pub trait QuoteProvider: Send + Sync + 'static {
    fn eod_batch(&self, symbols: &[String]) -> QuoteBatch;
}

pub struct QuoteClient {
    cfg: QuoteConfig,
    fetcher: Box<dyn HttpFetcher>,
    cache: Mutex<HashMap<String, CachedSeries>>,
}

struct CachedSeries {
    fetched_on: String,
    bars: Vec<EodBar>,
}

impl QuoteClient {
    pub fn new(cfg: QuoteConfig) -> Result<Self, UpstreamError> {
        let fetcher = Box::new(ReqwestBlockingFetcher::new(cfg.http_timeout_ms)?);
        Ok(Self::with_fetcher(cfg, fetcher))
    }

    pub fn with_fetcher(cfg: QuoteConfig, fetcher: Box<dyn HttpFetcher>) -> Self {
        Self {
            cfg,
            fetcher,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached_bars(&self, symbol: &str, today: &str) -> Option<Vec<EodBar>> {
        let guard = self
            .cache
            .lock()
            .expect("quote cache lock should not be poisoned");
        guard
            .get(symbol)
            .filter(|entry| entry.fetched_on == today)
            .map(|entry| entry.bars.clone())
    }

    fn store_bars(&self, symbol: &str, today: &str, bars: Vec<EodBar>) {
        let mut guard = self
            .cache
            .lock()
            .expect("quote cache lock should not be poisoned");
        guard.insert(
            symbol.to_string(),
            CachedSeries {
                fetched_on: today.to_string(),
                bars,
            },
        );
    }

    fn fetch_symbol(&self, symbol: &str) -> Result<Vec<EodBar>, UpstreamError> {
        let url = Url::parse_with_params(
            &self.cfg.base_url,
            &[("apikey", self.cfg.api_key.as_str()), ("symbol", symbol)],
        )
        .map_err(|err| UpstreamError::InvalidPayload {
            url: self.cfg.base_url.clone(),
            message: format!("invalid quote URL: {err}"),
        })?;

        let bytes = fetch_with_retry(self.fetcher.as_ref(), url.as_str(), self.cfg.retry)?;
        parse_eod_payload(url.as_str(), symbol, &bytes)
    }
}

impl QuoteProvider for QuoteClient {
    fn eod_batch(&self, symbols: &[String]) -> QuoteBatch {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let mut batch = QuoteBatch::default();
        let mut fetched_upstream = false;

        for symbol in symbols {
            if let Some(bars) = self.cached_bars(symbol, &today) {
                debug!(component = "quotes", event = "quotes.cache.hit", symbol = %symbol);
                batch.series.insert(symbol.clone(), bars);
                continue;
            }

            // Fixed pause between consecutive upstream calls, never before
            // the first one and never after a cache hit.
            if fetched_upstream {
                std::thread::sleep(std::time::Duration::from_millis(
                    self.cfg.inter_request_delay_ms,
                ));
            }

            match self.fetch_symbol(symbol) {
                Ok(bars) => {
                    info!(
                        component = "quotes",
                        event = "quotes.fetch.symbol",
                        symbol = %symbol,
                        bars = bars.len()
                    );
                    self.store_bars(symbol, &today, bars.clone());
                    batch.series.insert(symbol.clone(), bars);
                    fetched_upstream = true;
                }
                Err(err) => {
                    warn!(
                        component = "quotes",
                        event = "quotes.fetch.symbol_failed",
                        symbol = %symbol,
                        error = %err
                    );
                    batch
                        .failures
                        .insert(symbol.clone(), format!("Failed to fetch data for {symbol}"));
                    fetched_upstream = true;
                }
            }
        }

        batch
    }
}

fn parse_eod_payload(url: &str, symbol: &str, bytes: &[u8]) -> Result<Vec<EodBar>, UpstreamError> {
    let mut bars: Vec<EodBar> =
        serde_json::from_slice(bytes).map_err(|err| UpstreamError::InvalidPayload {
            url: url.to_string(),
            message: err.to_string(),
        })?;

    // Some providers omit the symbol per bar; backfill from the request.
    for bar in &mut bars {
        if bar.symbol.is_empty() {
            bar.symbol = symbol.to_string();
        }
    }

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct PerUrlFetcher {
        calls: Arc<AtomicU32>,
    }

    impl HttpFetcher for PerUrlFetcher {
        fn get_bytes(&self, url: &str) -> Result<Vec<u8>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("symbol=%5EVIX") {
                return Err(UpstreamError::Request {
                    url: url.to_string(),
                    message: "simulated provider outage".to_string(),
                });
            }
            Ok(
                br#"[{"symbol":"","date":"2025-06-02","price":101.0,"volume":10.0},
                     {"symbol":"","date":"2025-06-01","price":100.0,"volume":12.0}]"#
                    .to_vec(),
            )
        }
    }

    fn test_client(calls: &Arc<AtomicU32>) -> QuoteClient {
        let cfg = QuoteConfig {
            inter_request_delay_ms: 0,
            retry: RetryPolicy {
                max_retries: 0,
                backoff_ms: 0,
            },
            ..QuoteConfig::default()
        };
        QuoteClient::with_fetcher(
            cfg,
            Box::new(PerUrlFetcher {
                calls: Arc::clone(calls),
            }),
        )
    }

    #[test]
    fn batch_keeps_partial_results_when_one_symbol_fails() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = test_client(&calls);

        let symbols = vec!["^GSPC".to_string(), "^VIX".to_string()];
        let batch = client.eod_batch(&symbols);

        assert_eq!(batch.series.len(), 1);
        assert_eq!(batch.series["^GSPC"].len(), 2);
        assert_eq!(batch.series["^GSPC"][0].symbol, "^GSPC");
        assert_eq!(
            batch.failures["^VIX"],
            "Failed to fetch data for ^VIX".to_string()
        );
    }

    #[test]
    fn same_day_cache_serves_repeat_symbols_without_refetch() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = test_client(&calls);

        let symbols = vec!["^GSPC".to_string()];
        let first = client.eod_batch(&symbols);
        let second = client.eod_batch(&symbols);

        assert_eq!(first.series, second.series);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_symbols_are_not_cached() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = test_client(&calls);

        let symbols = vec!["^VIX".to_string()];
        client.eod_batch(&symbols);
        client.eod_batch(&symbols);

        // Two batches, two upstream attempts: failures must retry next time.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
