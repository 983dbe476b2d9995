//! Forex timeseries provider with a same-day response cache.
//!
//! One upstream GET covers the whole USD timeseries; the parsed response is
//! cached under today's `YYYY-MM-DD` string and reused until the calendar
//! date changes, so repeated requests within a day never refetch.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, info};
use url::Url;

use crate::upstream::{
    fetch_with_retry, HttpFetcher, ReqwestBlockingFetcher, RetryPolicy, UpstreamError,
};

/// Upstream timeseries: date -> currency symbol -> rate against the base.
pub type ForexSeries = BTreeMap<String, BTreeMap<String, f64>>;

pub const DEFAULT_FOREX_SYMBOLS: [&str; 9] = [
    "JPY", "EUR", "GBP", "CAD", "AUD", "CNY", "SAR", "THB", "ZAR",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForexConfig {
    pub base_url: String,
    pub api_key: String,
    pub base_currency: String,
    pub symbols: Vec<String>,
    pub start_date: String,
    pub http_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for ForexConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.currencybeacon.com/v1/timeseries".to_string(),
            api_key: String::new(),
            base_currency: "USD".to_string(),
            symbols: DEFAULT_FOREX_SYMBOLS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            start_date: "2023-01-01".to_string(),
            http_timeout_ms: 15_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl ForexConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(base_url) = std::env::var("MARKETBOARD_FOREX_BASE_URL") {
            if !base_url.trim().is_empty() {
                cfg.base_url = base_url;
            }
        }
        if let Ok(api_key) = std::env::var("MARKETBOARD_FOREX_API_KEY") {
            cfg.api_key = api_key;
        }
        cfg
    }
}

pub trait ForexProvider: Send + Sync + 'static {
    /// Returns the full timeseries, served from the same-day cache when the
    /// calendar date has not changed since the last upstream fetch.
    fn daily_series(&self) -> Result<ForexSeries, UpstreamError>;
}

pub struct ForexClient {
    cfg: ForexConfig,
    fetcher: Box<dyn HttpFetcher>,
    cache: Mutex<Option<DailyCache>>,
}

struct DailyCache {
    fetched_on: String,
    series: ForexSeries,
}

impl ForexClient {
    pub fn new(cfg: ForexConfig) -> Result<Self, UpstreamError> {
        let fetcher = Box::new(ReqwestBlockingFetcher::new(cfg.http_timeout_ms)?);
        Ok(Self::with_fetcher(cfg, fetcher))
    }

    pub fn with_fetcher(cfg: ForexConfig, fetcher: Box<dyn HttpFetcher>) -> Self {
        Self {
            cfg,
            fetcher,
            cache: Mutex::new(None),
        }
    }

    fn timeseries_url(&self, end_date: &str) -> Result<Url, UpstreamError> {
        Url::parse_with_params(
            &self.cfg.base_url,
            &[
                ("api_key", self.cfg.api_key.as_str()),
                ("base", self.cfg.base_currency.as_str()),
                ("start_date", self.cfg.start_date.as_str()),
                ("end_date", end_date),
                ("symbols", &self.cfg.symbols.join(",")),
            ],
        )
        .map_err(|err| UpstreamError::InvalidPayload {
            url: self.cfg.base_url.clone(),
            message: format!("invalid timeseries URL: {err}"),
        })
    }

    fn fetch_series(&self, end_date: &str) -> Result<ForexSeries, UpstreamError> {
        let url = self.timeseries_url(end_date)?;
        let bytes = fetch_with_retry(self.fetcher.as_ref(), url.as_str(), self.cfg.retry)?;
        parse_timeseries_payload(url.as_str(), &bytes)
    }
}

impl ForexProvider for ForexClient {
    fn daily_series(&self) -> Result<ForexSeries, UpstreamError> {
        let today = Utc::now().format("%Y-%m-%d").to_string();

        let mut guard = self
            .cache
            .lock()
            .expect("forex cache lock should not be poisoned");

        if let Some(cache) = guard.as_ref() {
            if cache.fetched_on == today {
                debug!(component = "forex", event = "forex.cache.hit", day = %today);
                return Ok(cache.series.clone());
            }
        }

        let series = self.fetch_series(&today)?;
        info!(
            component = "forex",
            event = "forex.fetch.refresh",
            day = %today,
            dates = series.len()
        );

        *guard = Some(DailyCache {
            fetched_on: today,
            series: series.clone(),
        });
        Ok(series)
    }
}

/// Parses the provider payload `{"response": {date: {symbol: rate}}}`.
/// Non-numeric rate entries are skipped rather than failing the whole series.
fn parse_timeseries_payload(url: &str, bytes: &[u8]) -> Result<ForexSeries, UpstreamError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|err| UpstreamError::InvalidPayload {
            url: url.to_string(),
            message: err.to_string(),
        })?;

    let response = value
        .get("response")
        .and_then(|v| v.as_object())
        .ok_or_else(|| UpstreamError::InvalidPayload {
            url: url.to_string(),
            message: "missing 'response' object".to_string(),
        })?;

    let mut series = ForexSeries::new();
    for (date, rates) in response {
        let rates_obj = rates
            .as_object()
            .ok_or_else(|| UpstreamError::InvalidPayload {
                url: url.to_string(),
                message: format!("rates for {date} are not an object"),
            })?;

        let mut day = BTreeMap::new();
        for (symbol, rate) in rates_obj {
            if let Some(rate) = rate.as_f64() {
                day.insert(symbol.clone(), rate);
            }
        }
        series.insert(date.clone(), day);
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingFetcher {
        body: Vec<u8>,
        calls: Arc<AtomicU32>,
    }

    impl HttpFetcher for CountingFetcher {
        fn get_bytes(&self, _url: &str) -> Result<Vec<u8>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    fn sample_payload() -> &'static str {
        r#"{"meta":{"code":200},"response":{
            "2025-01-01":{"JPY":157.2,"EUR":0.96},
            "2025-01-02":{"JPY":156.8,"EUR":0.97}
        }}"#
    }

    #[test]
    fn parses_timeseries_payload_in_date_order() {
        let series =
            parse_timeseries_payload("http://unit.test/ts", sample_payload().as_bytes()).unwrap();
        let dates: Vec<&str> = series.keys().map(String::as_str).collect();
        assert_eq!(dates, vec!["2025-01-01", "2025-01-02"]);
        assert_eq!(series["2025-01-02"]["JPY"], 156.8);
    }

    #[test]
    fn missing_response_object_is_rejected() {
        let err = parse_timeseries_payload("http://unit.test/ts", b"{\"meta\":{}}").unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidPayload { .. }));
    }

    #[test]
    fn same_day_cache_avoids_second_upstream_call() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = ForexClient::with_fetcher(
            ForexConfig::default(),
            Box::new(CountingFetcher {
                body: sample_payload().as_bytes().to_vec(),
                calls: Arc::clone(&calls),
            }),
        );

        let first = client.daily_series().unwrap();
        let second = client.daily_series().unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timeseries_url_carries_all_query_parameters() {
        let cfg = ForexConfig {
            api_key: "k123".to_string(),
            ..ForexConfig::default()
        };
        let client = ForexClient::with_fetcher(
            cfg,
            Box::new(CountingFetcher {
                body: Vec::new(),
                calls: Arc::new(AtomicU32::new(0)),
            }),
        );

        let url = client.timeseries_url("2025-06-30").unwrap();
        let query = url.query().unwrap_or_default();
        assert!(query.contains("api_key=k123"));
        assert!(query.contains("base=USD"));
        assert!(query.contains("end_date=2025-06-30"));
        assert!(query.contains("JPY%2CEUR"));
    }
}
