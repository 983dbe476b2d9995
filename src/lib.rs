//! Marketboard core crate.
//!
//! A market-data dashboard backend: a SQLite price store, two upstream
//! market-data clients (forex timeseries and per-symbol EOD quotes), the
//! date-bucketed percent-change transforms, a synthetic-data generator for
//! demo responses, a URL shortener, and the JSON HTTP surface over all of
//! them.

mod asset;
mod dummy;
mod forex;
mod observability;
mod quotes;
mod server;
mod shortener;
mod store;
mod transform;
mod upstream;

pub use asset::{
    parse_asset_class, AssetClass, AssetClassError, AssetQuote, CryptoQuote, DateBucket,
    DateBuckets, PriceQuote, RateQuote, SeriesDay, SeriesQuote,
};
pub use dummy::{
    class_profile, generate_market_data, generate_market_data_with_rng, ClassProfile, DummyAsset,
    MarketDataFilters, Performance, DUMMY_CLASSES,
};
pub use forex::{
    ForexClient, ForexConfig, ForexProvider, ForexSeries, DEFAULT_FOREX_SYMBOLS,
};
pub use observability::{
    init_logging, log_app_bind, log_app_start, logging_config_from_env, LogFormat, LoggingConfig,
    LoggingInitError,
};
pub use quotes::{
    EodBar, QuoteBatch, QuoteClient, QuoteConfig, QuoteProvider, DEFAULT_INDEX_SYMBOLS,
};
pub use server::{market_router, ApiError, AppState};
pub use shortener::{
    generate_token, is_valid_long_url, resolve, share_url, shorten, ShortenError, SHORT_TOKEN_LEN,
};
pub use store::{
    parse_price_table, AssetRow, CryptoRow, MarketStore, PriceTable, RateRow, StockRow, StoreError,
};
pub use transform::{
    bucket_observations, filter_buckets_by_date, strip_usdt, transform_asset_rows,
    transform_crypto_rows, transform_forex_series, transform_quote_series, transform_rate_rows,
    transform_stock_rows, ChangeTracker, FirstChangePolicy, PriceObservation,
};
pub use upstream::{
    fetch_with_retry, HttpFetcher, ReqwestBlockingFetcher, RetryPolicy, UpstreamError,
};
