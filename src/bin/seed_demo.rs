use std::path::PathBuf;

use chrono::{Days, Utc};
use marketboard::{
    generate_market_data_with_rng, AssetClass, AssetRow, CryptoRow, MarketDataFilters,
    MarketStore, RateRow, StockRow,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store_path = std::env::var("MARKETBOARD_STORE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/marketboard.sqlite"));
    let days: u64 = std::env::var("MARKETBOARD_SEED_DAYS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(60)
        .max(1);

    let mut store = MarketStore::open(&store_path)?;
    let today = Utc::now().date_naive();
    let start = today
        .checked_sub_days(Days::new(days - 1))
        .ok_or("seed window underflows the calendar")?;

    println!(
        "Demo seed start | store={} days={} range={}..={}",
        store_path.display(),
        days,
        start,
        today
    );

    let mut day = start;
    let mut total_rows = 0usize;
    while day <= today {
        let date = day.format("%Y-%m-%d").to_string();
        // One deterministic snapshot per calendar day, so re-running the
        // seeder upserts the same history instead of rewriting it.
        let mut rng = StdRng::seed_from_u64(seed_for(&date));
        let snapshot = generate_market_data_with_rng(&mut rng, 30, MarketDataFilters::default());

        let mut assets = Vec::new();
        let mut crypto = Vec::new();
        let mut stocks = Vec::new();
        let mut rates = Vec::new();

        for asset in &snapshot {
            assets.push(AssetRow {
                symbol: asset.symbol.clone(),
                name: asset.name.clone(),
                price: asset.price,
                volume: asset.volume,
                price_date: date.clone(),
            });

            match asset.class {
                AssetClass::Crypto => crypto.push(CryptoRow {
                    symbol: format!("{}USDT", asset.symbol),
                    date: date.clone(),
                    close: asset.price,
                    volume: asset.volume,
                    change_1d: Some(asset.performance.day),
                    change_7d: Some(asset.performance.week),
                    change_1m: Some(asset.performance.month),
                    change_3m: None,
                    change_1y: None,
                }),
                AssetClass::Indices | AssetClass::Commodities => stocks.push(StockRow {
                    symbol: asset.symbol.clone(),
                    price_date: date.clone(),
                    price: asset.price,
                    volume: asset.volume,
                    change_1d: Some(asset.performance.day),
                    change_7d: Some(asset.performance.week),
                    change_1m: Some(asset.performance.month),
                    change_3m: None,
                    change_1y: None,
                }),
                AssetClass::Forex => rates.push(RateRow {
                    source: asset.symbol.clone(),
                    price_date: date.clone(),
                    rate: asset.price,
                    change_1m: Some(asset.performance.month),
                    change_3m: None,
                    change_6m: None,
                    change_1y: None,
                }),
                AssetClass::Bonds | AssetClass::Stocks => {}
            }
        }

        let day_rows = assets.len() + crypto.len() + stocks.len() + rates.len();
        store.upsert_assets(&assets)?;
        store.upsert_crypto(&crypto)?;
        store.upsert_stocks(&stocks)?;
        store.upsert_rates(&rates)?;

        println!(
            "day {} | assets={} crypto={} stocks={} rates={}",
            date,
            assets.len(),
            crypto.len(),
            stocks.len(),
            rates.len()
        );
        total_rows += day_rows;

        day = day
            .checked_add_days(Days::new(1))
            .ok_or("next day should exist")?;
    }

    println!("Demo seed complete | rows={total_rows}");
    Ok(())
}

fn seed_for(date: &str) -> u64 {
    date.bytes().fold(0u64, |acc, b| {
        acc.wrapping_mul(131).wrapping_add(u64::from(b))
    })
}
