//! JSON HTTP surface over the store, the upstream providers, the dummy
//! generator, and the shortener.
//!
//! Handlers lock the store synchronously (queries are short); upstream
//! fetches go through `spawn_blocking` because the providers block.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Months, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::asset::{parse_asset_class, AssetClass, DateBuckets, PriceQuote, SeriesDay};
use crate::dummy::{generate_market_data, MarketDataFilters, DUMMY_CLASSES};
use crate::forex::ForexProvider;
use crate::quotes::{QuoteProvider, DEFAULT_INDEX_SYMBOLS};
use crate::shortener;
use crate::store::{parse_price_table, MarketStore, PriceTable};
use crate::transform::{
    filter_buckets_by_date, strip_usdt, transform_asset_rows, transform_crypto_rows,
    transform_forex_series, transform_quote_series, transform_rate_rows, transform_stock_rows,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<MarketStore>>,
    pub forex: Arc<dyn ForexProvider>,
    pub quotes: Arc<dyn QuoteProvider>,
    pub public_base_url: String,
}

/// Error response shape shared by every endpoint: `{"error": message}`.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn market_router(state: AppState) -> Router {
    Router::new()
        .route("/api/assets", get(assets_handler))
        .route("/api/crypto", get(crypto_handler))
        .route("/api/rates", get(rates_handler))
        .route("/api/prices/{table}", get(prices_handler))
        .route("/api/tickers/{table}", get(tickers_handler))
        .route("/api/forex", get(forex_handler))
        .route("/api/stock", get(stock_handler))
        .route("/api/market-data", get(market_data_handler))
        .route("/api/market-data/{class}", get(market_data_class_handler))
        .route("/api/shorten", get(shorten_handler))
        .route("/share/{token}", get(share_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricesQuery {
    date_from: Option<String>,
    date_to: Option<String>,
    tickers: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StockQuery {
    symbols: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarketDataQuery {
    period: Option<u32>,
    crypto: Option<bool>,
    indices: Option<bool>,
    commodities: Option<bool>,
    bonds: Option<bool>,
    forex: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ShortenQuery {
    long_url: Option<String>,
}

/// Default query window for the store-backed endpoints: the last 24 months.
fn default_window() -> (String, String) {
    let today = Utc::now().date_naive();
    let start = today
        .checked_sub_months(Months::new(24))
        .unwrap_or(NaiveDate::MIN);
    (
        start.format("%Y-%m-%d").to_string(),
        today.format("%Y-%m-%d").to_string(),
    )
}

fn is_iso_date(raw: &str) -> bool {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

fn lock_store(state: &AppState) -> std::sync::MutexGuard<'_, MarketStore> {
    state
        .store
        .lock()
        .expect("market store lock should not be poisoned")
}

/// Applies the optional `date=` prefix filter and 404s on an empty result.
fn respond_buckets<T: serde::Serialize>(
    buckets: DateBuckets<T>,
    date: Option<&str>,
) -> Result<Json<DateBuckets<T>>, ApiError> {
    let buckets = match date {
        Some(prefix) => filter_buckets_by_date(buckets, prefix),
        None => buckets,
    };
    if buckets.is_empty() {
        return Err(ApiError::not_found("No data available for this date"));
    }
    Ok(Json(buckets))
}

async fn assets_handler(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    info!(component = "server", event = "http.assets.request");
    let (start, end) = default_window();
    let rows = lock_store(&state)
        .assets_in_range(&start, &end)
        .map_err(|err| {
            warn!(component = "server", event = "http.assets.store_error", error = %err);
            ApiError::internal("Failed to fetch asset data")
        })?;
    respond_buckets(transform_asset_rows(rows), query.date.as_deref())
}

async fn crypto_handler(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    info!(component = "server", event = "http.crypto.request");
    let (start, end) = default_window();
    let rows = lock_store(&state)
        .crypto_in_range(&start, &end, &[])
        .map_err(|err| {
            warn!(component = "server", event = "http.crypto.store_error", error = %err);
            ApiError::internal("Failed to fetch crypto data")
        })?;
    respond_buckets(transform_crypto_rows(rows), query.date.as_deref())
}

async fn rates_handler(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    info!(component = "server", event = "http.rates.request");
    let (start, end) = default_window();
    let rows = lock_store(&state)
        .rates_in_range(&start, &end)
        .map_err(|err| {
            warn!(component = "server", event = "http.rates.store_error", error = %err);
            ApiError::internal("Failed to fetch rate data")
        })?;
    respond_buckets(transform_rate_rows(rows), query.date.as_deref())
}

async fn prices_handler(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(query): Query<PricesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    info!(component = "server", event = "http.prices.request", table = %table);
    let table = parse_price_table(&table).map_err(|_| {
        ApiError::bad_request("The 'table' parameter is required and must be 'stocks' or 'crypto'.")
    })?;

    let (date_from, date_to) = match (query.date_from, query.date_to) {
        (Some(from), Some(to)) if is_iso_date(&from) && is_iso_date(&to) => (from, to),
        _ => {
            return Err(ApiError::bad_request(
                "Invalid date format. Please use YYYY-MM-DD.",
            ))
        }
    };

    let symbols: Vec<String> = query
        .tickers
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();

    let buckets = {
        let store = lock_store(&state);
        let fetch_error = |err: &dyn std::fmt::Display| {
            warn!(component = "server", event = "http.prices.store_error", error = %err);
            ApiError::internal("Failed to fetch asset data")
        };
        match table {
            PriceTable::Stocks => transform_stock_rows(
                store
                    .stocks_in_range(&date_from, &date_to, &symbols)
                    .map_err(|err| fetch_error(&err))?,
            ),
            PriceTable::Crypto => {
                let rows = store
                    .crypto_in_range(&date_from, &date_to, &symbols)
                    .map_err(|err| fetch_error(&err))?;
                // The crypto table keys its price column `close`; the
                // endpoint serves the shared price shape.
                let mut buckets: DateBuckets<PriceQuote> = DateBuckets::new();
                for (date, bucket) in transform_crypto_rows(rows) {
                    let entry = buckets.entry(date).or_default();
                    for q in bucket.currencies {
                        entry.currencies.push(PriceQuote {
                            symbol: q.symbol,
                            price: q.close,
                            volume: q.volume,
                            change_1d: q.change_1d,
                            change_7d: q.change_7d,
                            change_1m: q.change_1m,
                            change_3m: q.change_3m,
                            change_1y: q.change_1y,
                        });
                    }
                }
                buckets
            }
        }
    };

    if buckets.is_empty() {
        return Err(ApiError::not_found("No data found for the given symbols"));
    }
    Ok(Json(buckets))
}

async fn tickers_handler(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    info!(component = "server", event = "http.tickers.request", table = %table);
    let table = parse_price_table(&table).map_err(|_| {
        ApiError::bad_request("The 'table' parameter is required and must be 'stocks' or 'crypto'.")
    })?;

    let symbols = lock_store(&state).distinct_symbols(table).map_err(|err| {
        warn!(component = "server", event = "http.tickers.store_error", error = %err);
        ApiError::internal("Failed to fetch symbols")
    })?;
    if symbols.is_empty() {
        return Err(ApiError::not_found(
            "No symbols found in the specified table.",
        ));
    }

    let symbols: Vec<String> = symbols.iter().map(|s| strip_usdt(s)).collect();
    Ok(Json(json!({ "symbols": symbols })))
}

async fn forex_handler(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    info!(component = "server", event = "http.forex.request");
    let provider = Arc::clone(&state.forex);
    let series = tokio::task::spawn_blocking(move || provider.daily_series())
        .await
        .map_err(|err| {
            warn!(component = "server", event = "http.forex.join_error", error = %err);
            ApiError::internal("Failed to fetch forex data")
        })?
        .map_err(|err| {
            warn!(component = "server", event = "http.forex.upstream_error", error = %err);
            ApiError::internal("Failed to fetch forex data")
        })?;

    let days = transform_forex_series(&series);
    match query.date {
        Some(date) => {
            let day = days
                .into_iter()
                .find(|d| d.date == date)
                .ok_or_else(|| ApiError::not_found("No data available for this date"))?;
            Ok(Json(vec![day]))
        }
        None => Ok(Json(days)),
    }
}

async fn stock_handler(
    State(state): State<AppState>,
    Query(query): Query<StockQuery>,
) -> Result<impl IntoResponse, ApiError> {
    info!(component = "server", event = "http.stock.request");
    let symbols: Vec<String> = match query.symbols.as_deref() {
        Some(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => DEFAULT_INDEX_SYMBOLS.iter().map(|s| s.to_string()).collect(),
    };

    let provider = Arc::clone(&state.quotes);
    let batch = tokio::task::spawn_blocking(move || provider.eod_batch(&symbols))
        .await
        .map_err(|err| {
            warn!(component = "server", event = "http.stock.join_error", error = %err);
            ApiError::internal("Failed to fetch stock data")
        })?;

    for (symbol, message) in &batch.failures {
        warn!(
            component = "server",
            event = "http.stock.symbol_failed",
            symbol = %symbol,
            error = %message
        );
    }

    let mut series = batch.series;
    if query.date_from.is_some() || query.date_to.is_some() {
        let from = query.date_from.as_deref().unwrap_or("0000-00-00");
        let to = query.date_to.as_deref().unwrap_or("9999-99-99");
        for bars in series.values_mut() {
            bars.retain(|bar| bar.date.as_str() >= from && bar.date.as_str() <= to);
        }
    }

    let days: Vec<SeriesDay> = transform_quote_series(&series);
    Ok(Json(days))
}

async fn market_data_handler(
    Query(query): Query<MarketDataQuery>,
) -> Result<impl IntoResponse, ApiError> {
    info!(component = "server", event = "http.market_data.request");
    let period = query.period.unwrap_or(30).clamp(1, 365);
    let filters = MarketDataFilters {
        crypto: query.crypto.unwrap_or(true),
        indices: query.indices.unwrap_or(true),
        commodities: query.commodities.unwrap_or(true),
        bonds: query.bonds.unwrap_or(true),
        forex: query.forex.unwrap_or(true),
    };
    let data = generate_market_data(period, filters);
    Ok(Json(json!({ "data": data })))
}

async fn market_data_class_handler(
    Path(class): Path<String>,
    Query(query): Query<MarketDataQuery>,
) -> Result<impl IntoResponse, ApiError> {
    info!(component = "server", event = "http.market_data_class.request", class = %class);
    let class: AssetClass = parse_asset_class(&class)
        .ok()
        .filter(|c| DUMMY_CLASSES.contains(c))
        .ok_or_else(|| ApiError::not_found("Asset type not found"))?;

    let period = query.period.unwrap_or(30).clamp(1, 365);
    let data = generate_market_data(period, MarketDataFilters::only(class));
    Ok(Json(json!({ "data": data })))
}

async fn shorten_handler(
    State(state): State<AppState>,
    Query(query): Query<ShortenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    info!(component = "server", event = "http.shorten.request");
    let long_url = query
        .long_url
        .ok_or_else(|| ApiError::bad_request("Invalid URL provided."))?;

    let token = {
        let mut store = lock_store(&state);
        shortener::shorten(&mut store, &long_url)
    };
    match token {
        Ok(token) => Ok(Json(
            json!({ "url": shortener::share_url(&state.public_base_url, &token) }),
        )),
        Err(shortener::ShortenError::InvalidUrl) => {
            Err(ApiError::bad_request("Invalid URL provided."))
        }
        Err(err) => {
            warn!(component = "server", event = "http.shorten.store_error", error = %err);
            Err(ApiError::internal("Failed to save URL in database."))
        }
    }
}

async fn share_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Redirect, ApiError> {
    info!(component = "server", event = "http.share.request", token = %token);
    let long_url = {
        let store = lock_store(&state);
        shortener::resolve(&store, &token)
    }
    .map_err(|err| {
        warn!(component = "server", event = "http.share.store_error", error = %err);
        ApiError::internal("Failed to resolve short URL")
    })?;

    match long_url {
        Some(url) => Ok(Redirect::temporary(&url)),
        None => Err(ApiError::not_found("Short URL not found")),
    }
}
