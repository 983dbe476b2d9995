use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use marketboard::{
    init_logging, log_app_bind, log_app_start, logging_config_from_env, market_router, AppState,
    ForexClient, ForexConfig, MarketStore, QuoteClient, QuoteConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let addr: SocketAddr = std::env::var("MARKETBOARD_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;

    let store_path = PathBuf::from(
        std::env::var("MARKETBOARD_STORE_PATH")
            .unwrap_or_else(|_| "data/marketboard.sqlite".to_string()),
    );
    let public_base_url = std::env::var("MARKETBOARD_PUBLIC_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:8080".to_string());

    let store = MarketStore::open(&store_path)?;
    let forex = ForexClient::new(ForexConfig::from_env())?;
    let quotes = QuoteClient::new(QuoteConfig::from_env())?;

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        forex: Arc::new(forex),
        quotes: Arc::new(quotes),
        public_base_url,
    };

    let app = market_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
