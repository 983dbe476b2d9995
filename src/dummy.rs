//! Synthetic market snapshot used by the demo endpoints and the seed
//! binary. Each asset class carries a volatility and a plausible price
//! range; everything else is derived from those with a seeded or thread
//! RNG.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::asset::AssetClass;

/// Classes the generator knows catalogs for. `Stocks` is served by real
/// upstream data and has no synthetic catalog.
pub const DUMMY_CLASSES: [AssetClass; 5] = [
    AssetClass::Crypto,
    AssetClass::Indices,
    AssetClass::Commodities,
    AssetClass::Bonds,
    AssetClass::Forex,
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub day: f64,
    pub week: f64,
    pub month: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DummyAsset {
    pub id: u32,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub market_cap: f64,
    pub performance: Performance,
    #[serde(rename = "type")]
    pub class: AssetClass,
    pub featured: bool,
}

/// Which classes to include in a generated snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketDataFilters {
    pub crypto: bool,
    pub indices: bool,
    pub commodities: bool,
    pub bonds: bool,
    pub forex: bool,
}

impl Default for MarketDataFilters {
    fn default() -> Self {
        Self {
            crypto: true,
            indices: true,
            commodities: true,
            bonds: true,
            forex: true,
        }
    }
}

impl MarketDataFilters {
    /// A filter set admitting exactly one class.
    pub fn only(class: AssetClass) -> Self {
        let mut filters = Self {
            crypto: false,
            indices: false,
            commodities: false,
            bonds: false,
            forex: false,
        };
        match class {
            AssetClass::Crypto => filters.crypto = true,
            AssetClass::Indices => filters.indices = true,
            AssetClass::Commodities => filters.commodities = true,
            AssetClass::Bonds => filters.bonds = true,
            AssetClass::Forex => filters.forex = true,
            AssetClass::Stocks => {}
        }
        filters
    }

    fn admits(&self, class: AssetClass) -> bool {
        match class {
            AssetClass::Crypto => self.crypto,
            AssetClass::Indices => self.indices,
            AssetClass::Commodities => self.commodities,
            AssetClass::Bonds => self.bonds,
            AssetClass::Forex => self.forex,
            AssetClass::Stocks => false,
        }
    }
}

/// Per-class movement profile.
#[derive(Debug, Clone, Copy)]
pub struct ClassProfile {
    pub volatility: f64,
    pub price_range: (f64, f64),
}

pub fn class_profile(class: AssetClass) -> ClassProfile {
    match class {
        AssetClass::Crypto => ClassProfile {
            volatility: 15.0,
            price_range: (0.01, 50_000.0),
        },
        AssetClass::Indices => ClassProfile {
            volatility: 3.0,
            price_range: (1_000.0, 40_000.0),
        },
        AssetClass::Commodities => ClassProfile {
            volatility: 5.0,
            price_range: (10.0, 2_000.0),
        },
        AssetClass::Bonds => ClassProfile {
            volatility: 1.0,
            price_range: (80.0, 120.0),
        },
        AssetClass::Forex => ClassProfile {
            volatility: 2.0,
            price_range: (0.5, 2.0),
        },
        AssetClass::Stocks => ClassProfile {
            volatility: 4.0,
            price_range: (10.0, 1_000.0),
        },
    }
}

struct CatalogEntry {
    symbol: &'static str,
    name: &'static str,
    market_cap_multiplier: f64,
}

const fn entry(symbol: &'static str, name: &'static str, mult: f64) -> CatalogEntry {
    CatalogEntry {
        symbol,
        name,
        market_cap_multiplier: mult,
    }
}

const CRYPTO_CATALOG: &[CatalogEntry] = &[
    entry("BTC", "Bitcoin", 100.0),
    entry("ETH", "Ethereum", 40.0),
    entry("BNB", "Binance Coin", 10.0),
    entry("SOL", "Solana", 8.0),
    entry("ADA", "Cardano", 5.0),
    entry("XRP", "Ripple", 4.0),
    entry("DOT", "Polkadot", 3.0),
    entry("DOGE", "Dogecoin", 2.0),
    entry("AVAX", "Avalanche", 2.0),
    entry("LINK", "Chainlink", 1.0),
    entry("LTC", "Litecoin", 15.0),
    entry("MATIC", "Polygon", 6.0),
    entry("UNI", "Uniswap", 4.0),
    entry("AAVE", "Aave", 5.0),
    entry("SUSHI", "SushiSwap", 3.0),
    entry("FTM", "Fantom", 4.0),
    entry("XLM", "Stellar", 3.0),
    entry("VET", "VeChain", 2.0),
    entry("TRX", "Tron", 1.0),
    entry("FIL", "Filecoin", 6.0),
];

const INDICES_CATALOG: &[CatalogEntry] = &[
    entry("SPX", "S&P 500", 200.0),
    entry("NDX", "Nasdaq 100", 150.0),
    entry("DJI", "Dow Jones", 120.0),
    entry("RUT", "Russell 2000", 50.0),
    entry("FTSE", "FTSE 100", 40.0),
    entry("DAX", "DAX 40", 30.0),
    entry("CAC", "CAC 40", 25.0),
    entry("N225", "Nikkei 225", 35.0),
    entry("HSI", "Hang Seng", 30.0),
    entry("SSEC", "Shanghai Composite", 40.0),
    entry("STOXX", "STOXX Europe 600", 45.0),
    entry("BSE", "Bombay Stock Exchange", 50.0),
    entry("KOSPI", "Korea Composite Stock Price Index", 60.0),
    entry("ASX", "ASX 200", 65.0),
    entry("AEX", "AEX Index", 45.0),
    entry("IBEX", "IBEX 35", 55.0),
    entry("BOVESPA", "Bovespa Index", 50.0),
    entry("TA35", "TA-35", 40.0),
    entry("MEXBOL", "Mexican Stock Index", 35.0),
];

const COMMODITIES_CATALOG: &[CatalogEntry] = &[
    entry("GC", "Gold", 60.0),
    entry("SI", "Silver", 20.0),
    entry("CL", "Crude Oil", 50.0),
    entry("NG", "Natural Gas", 15.0),
    entry("HG", "Copper", 10.0),
    entry("PL", "Platinum", 5.0),
    entry("PA", "Palladium", 3.0),
    entry("CT", "Cotton", 2.0),
    entry("KC", "Coffee", 2.0),
    entry("SB", "Sugar", 1.0),
    entry("OJ", "Orange Juice", 4.0),
    entry("WTI", "West Texas Intermediate", 6.0),
    entry("BRN", "Brent Crude", 8.0),
    entry("RICE", "Rice", 3.0),
    entry("WHEAT", "Wheat", 7.0),
    entry("SOY", "Soybean", 9.0),
    entry("LUMBER", "Lumber", 5.0),
    entry("COTTON", "Cotton", 6.0),
    entry("AL", "Aluminum", 8.0),
    entry("TIN", "Tin", 7.0),
];

const BONDS_CATALOG: &[CatalogEntry] = &[
    entry("US10Y", "US 10 Year Treasury", 80.0),
    entry("US2Y", "US 2 Year Treasury", 60.0),
    entry("US30Y", "US 30 Year Treasury", 70.0),
    entry("DE10Y", "German 10 Year Bund", 40.0),
    entry("UK10Y", "UK 10 Year Gilt", 35.0),
    entry("JP10Y", "Japan 10 Year Bond", 30.0),
    entry("FR10Y", "France 10 Year Bond", 25.0),
    entry("IT10Y", "Italy 10 Year Bond", 20.0),
    entry("AU10Y", "Australia 10 Year Bond", 15.0),
    entry("CA10Y", "Canada 10 Year Bond", 15.0),
    entry("ES10Y", "Spain 10 Year Bond", 25.0),
    entry("BR10Y", "Brazil 10 Year Bond", 35.0),
    entry("MX10Y", "Mexico 10 Year Bond", 20.0),
    entry("IN10Y", "India 10 Year Bond", 40.0),
    entry("CN10Y", "China 10 Year Bond", 50.0),
    entry("SG10Y", "Singapore 10 Year Bond", 30.0),
    entry("ZA10Y", "South Africa 10 Year Bond", 40.0),
    entry("RU10Y", "Russia 10 Year Bond", 30.0),
    entry("KR10Y", "South Korea 10 Year Bond", 35.0),
    entry("SA10Y", "Saudi Arabia 10 Year Bond", 25.0),
];

const FOREX_CATALOG: &[CatalogEntry] = &[
    entry("EUR/USD", "Euro / US Dollar", 25.0),
    entry("USD/JPY", "US Dollar / Japanese Yen", 20.0),
    entry("GBP/USD", "British Pound / US Dollar", 15.0),
    entry("USD/CNY", "US Dollar / Chinese Yuan", 7.0),
    entry("USD/INR", "US Dollar / Indian Rupee", 6.0),
    entry("USD/MXN", "US Dollar / Mexican Peso", 4.0),
    entry("NZD/JPY", "New Zealand Dollar / Japanese Yen", 5.0),
    entry("EUR/AUD", "Euro / Australian Dollar", 6.0),
    entry("GBP/AUD", "British Pound / Australian Dollar", 4.0),
    entry("CAD/JPY", "Canadian Dollar / Japanese Yen", 6.0),
];

fn catalog(class: AssetClass) -> &'static [CatalogEntry] {
    match class {
        AssetClass::Crypto => CRYPTO_CATALOG,
        AssetClass::Indices => INDICES_CATALOG,
        AssetClass::Commodities => COMMODITIES_CATALOG,
        AssetClass::Bonds => BONDS_CATALOG,
        AssetClass::Forex => FOREX_CATALOG,
        AssetClass::Stocks => &[],
    }
}

fn rand_change<R: Rng>(rng: &mut R, volatility: f64) -> f64 {
    (rng.gen::<f64>() - 0.5) * 2.0 * volatility
}

/// Generates one snapshot with the process RNG. `period_days` scales the
/// headline change by `sqrt(period / 30)`, so longer windows move more.
pub fn generate_market_data(period_days: u32, filters: MarketDataFilters) -> Vec<DummyAsset> {
    generate_market_data_with_rng(&mut rand::thread_rng(), period_days, filters)
}

pub fn generate_market_data_with_rng<R: Rng>(
    rng: &mut R,
    period_days: u32,
    filters: MarketDataFilters,
) -> Vec<DummyAsset> {
    let time_multiplier = (f64::from(period_days) / 30.0).sqrt();
    let mut out = Vec::new();
    let mut id = 1u32;

    for class in DUMMY_CLASSES {
        if !filters.admits(class) {
            continue;
        }
        let profile = class_profile(class);
        let (min_price, max_price) = profile.price_range;

        for asset in catalog(class) {
            let base_price = rng.gen_range(min_price..max_price);
            let change = rand_change(rng, profile.volatility * time_multiplier);
            let price = base_price * (1.0 + change / 100.0);

            let high = base_price * (1.0 + rand_change(rng, profile.volatility) / 100.0 + 0.05);
            let low = base_price * (1.0 + rand_change(rng, profile.volatility) / 100.0 - 0.05);

            let volume = base_price * rng.gen_range(1_000_000.0..10_000_000.0);
            let market_cap = base_price
                * rng.gen_range(10_000_000.0..100_000_000.0)
                * asset.market_cap_multiplier;

            let performance = Performance {
                day: rand_change(rng, profile.volatility * 0.5),
                week: rand_change(rng, profile.volatility * 0.8),
                month: rand_change(rng, profile.volatility * 1.2),
            };

            out.push(DummyAsset {
                id,
                symbol: asset.symbol.to_string(),
                name: asset.name.to_string(),
                price,
                change,
                high,
                low,
                volume,
                market_cap,
                performance,
                class,
                featured: rng.gen::<f64>() > 0.7,
            });
            id += 1;
        }
    }

    out
}
