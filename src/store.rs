//! SQLite-backed market store: per-class price tables plus short URLs.

use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("short token already taken: {0}")]
    DuplicateToken(String),
    #[error("unknown price table: {0}")]
    UnknownTable(String),
}

/// The two tables `/api/prices/{table}` and `/api/tickers/{table}` accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceTable {
    Stocks,
    Crypto,
}

impl PriceTable {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stocks => "stocks",
            Self::Crypto => "crypto",
        }
    }
}

pub fn parse_price_table(input: &str) -> Result<PriceTable, StoreError> {
    match input {
        "stocks" => Ok(PriceTable::Stocks),
        "crypto" => Ok(PriceTable::Crypto),
        other => Err(StoreError::UnknownTable(other.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRow {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub volume: f64,
    pub price_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoRow {
    pub symbol: String,
    pub date: String,
    pub close: f64,
    pub volume: f64,
    pub change_1d: Option<f64>,
    pub change_7d: Option<f64>,
    pub change_1m: Option<f64>,
    pub change_3m: Option<f64>,
    pub change_1y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRow {
    pub symbol: String,
    pub price_date: String,
    pub price: f64,
    pub volume: f64,
    pub change_1d: Option<f64>,
    pub change_7d: Option<f64>,
    pub change_1m: Option<f64>,
    pub change_3m: Option<f64>,
    pub change_1y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    pub source: String,
    pub price_date: String,
    pub rate: f64,
    pub change_1m: Option<f64>,
    pub change_3m: Option<f64>,
    pub change_6m: Option<f64>,
    pub change_1y: Option<f64>,
}

pub struct MarketStore {
    conn: Connection,
}

impl MarketStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
        )?;
        ensure_schema(&conn)?;

        info!(
            component = "store",
            event = "store.open",
            path = %path.display()
        );

        Ok(Self { conn })
    }

    pub fn upsert_assets(&mut self, rows: &[AssetRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO assets (symbol, name, price, volume, price_date)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(symbol, price_date) DO UPDATE SET
                    name = excluded.name,
                    price = excluded.price,
                    volume = excluded.volume
                ",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.symbol,
                    row.name,
                    row.price,
                    row.volume,
                    row.price_date,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_crypto(&mut self, rows: &[CryptoRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO crypto (
                    symbol, date, close, volume,
                    change_1d, change_7d, change_1m, change_3m, change_1y
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(symbol, date) DO UPDATE SET
                    close = excluded.close,
                    volume = excluded.volume,
                    change_1d = excluded.change_1d,
                    change_7d = excluded.change_7d,
                    change_1m = excluded.change_1m,
                    change_3m = excluded.change_3m,
                    change_1y = excluded.change_1y
                ",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.symbol,
                    row.date,
                    row.close,
                    row.volume,
                    row.change_1d,
                    row.change_7d,
                    row.change_1m,
                    row.change_3m,
                    row.change_1y,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_stocks(&mut self, rows: &[StockRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO stocks (
                    symbol, price_date, price, volume,
                    change_1d, change_7d, change_1m, change_3m, change_1y
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(symbol, price_date) DO UPDATE SET
                    price = excluded.price,
                    volume = excluded.volume,
                    change_1d = excluded.change_1d,
                    change_7d = excluded.change_7d,
                    change_1m = excluded.change_1m,
                    change_3m = excluded.change_3m,
                    change_1y = excluded.change_1y
                ",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.symbol,
                    row.price_date,
                    row.price,
                    row.volume,
                    row.change_1d,
                    row.change_7d,
                    row.change_1m,
                    row.change_3m,
                    row.change_1y,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_rates(&mut self, rows: &[RateRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO rates (
                    source, price_date, rate,
                    change_1m, change_3m, change_6m, change_1y
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(source, price_date) DO UPDATE SET
                    rate = excluded.rate,
                    change_1m = excluded.change_1m,
                    change_3m = excluded.change_3m,
                    change_6m = excluded.change_6m,
                    change_1y = excluded.change_1y
                ",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.source,
                    row.price_date,
                    row.rate,
                    row.change_1m,
                    row.change_3m,
                    row.change_6m,
                    row.change_1y,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn assets_in_range(&self, start: &str, end: &str) -> Result<Vec<AssetRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT symbol, name, price, volume, price_date
            FROM assets
            WHERE price_date >= ?1 AND price_date <= ?2
            ORDER BY price_date ASC, symbol ASC
            ",
        )?;
        let rows = stmt
            .query_map(params![start, end], |row| {
                Ok(AssetRow {
                    symbol: row.get(0)?,
                    name: row.get(1)?,
                    price: row.get(2)?,
                    volume: row.get(3)?,
                    price_date: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn crypto_in_range(
        &self,
        start: &str,
        end: &str,
        symbols: &[String],
    ) -> Result<Vec<CryptoRow>, StoreError> {
        let sql = range_query_sql(
            "SELECT symbol, date, close, volume, change_1d, change_7d, change_1m, change_3m, change_1y FROM crypto",
            "date",
            symbols.len(),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let params = range_query_params(start, end, symbols);
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(CryptoRow {
                    symbol: row.get(0)?,
                    date: row.get(1)?,
                    close: row.get(2)?,
                    volume: row.get(3)?,
                    change_1d: row.get(4)?,
                    change_7d: row.get(5)?,
                    change_1m: row.get(6)?,
                    change_3m: row.get(7)?,
                    change_1y: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn stocks_in_range(
        &self,
        start: &str,
        end: &str,
        symbols: &[String],
    ) -> Result<Vec<StockRow>, StoreError> {
        let sql = range_query_sql(
            "SELECT symbol, price_date, price, volume, change_1d, change_7d, change_1m, change_3m, change_1y FROM stocks",
            "price_date",
            symbols.len(),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let params = range_query_params(start, end, symbols);
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(StockRow {
                    symbol: row.get(0)?,
                    price_date: row.get(1)?,
                    price: row.get(2)?,
                    volume: row.get(3)?,
                    change_1d: row.get(4)?,
                    change_7d: row.get(5)?,
                    change_1m: row.get(6)?,
                    change_3m: row.get(7)?,
                    change_1y: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn rates_in_range(&self, start: &str, end: &str) -> Result<Vec<RateRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT source, price_date, rate, change_1m, change_3m, change_6m, change_1y
            FROM rates
            WHERE price_date >= ?1 AND price_date <= ?2
            ORDER BY price_date ASC, source ASC
            ",
        )?;
        let rows = stmt
            .query_map(params![start, end], |row| {
                Ok(RateRow {
                    source: row.get(0)?,
                    price_date: row.get(1)?,
                    rate: row.get(2)?,
                    change_1m: row.get(3)?,
                    change_3m: row.get(4)?,
                    change_6m: row.get(5)?,
                    change_1y: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn distinct_symbols(&self, table: PriceTable) -> Result<Vec<String>, StoreError> {
        // Table name comes from the validated enum, not from request input.
        let sql = format!(
            "SELECT DISTINCT symbol FROM {} ORDER BY symbol ASC",
            table.as_str()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let symbols = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(symbols)
    }

    pub fn insert_short_url(
        &mut self,
        token: &str,
        long_url: &str,
        created_at: &str,
    ) -> Result<(), StoreError> {
        let result = self.conn.execute(
            "INSERT INTO short_urls (short_token, long_url, created_at) VALUES (?1, ?2, ?3)",
            params![token, long_url, created_at],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateToken(token.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn lookup_short_url(&self, token: &str) -> Result<Option<String>, StoreError> {
        let long_url = self
            .conn
            .query_row(
                "SELECT long_url FROM short_urls WHERE short_token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?;
        Ok(long_url)
    }
}

fn range_query_sql(select: &str, date_column: &str, symbol_count: usize) -> String {
    let mut sql = format!("{select} WHERE {date_column} >= ?1 AND {date_column} <= ?2");
    if symbol_count > 0 {
        sql.push_str(" AND symbol IN (");
        for idx in 0..symbol_count {
            if idx > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format!("?{}", idx + 3));
        }
        sql.push(')');
    }
    sql.push_str(&format!(" ORDER BY {date_column} ASC, symbol ASC"));
    sql
}

fn range_query_params(start: &str, end: &str, symbols: &[String]) -> Vec<String> {
    let mut params = Vec::with_capacity(symbols.len() + 2);
    params.push(start.to_string());
    params.push(end.to_string());
    params.extend(symbols.iter().cloned());
    params
}

fn ensure_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS assets (
            symbol TEXT NOT NULL,
            name TEXT NOT NULL,
            price REAL NOT NULL,
            volume REAL NOT NULL,
            price_date TEXT NOT NULL,
            PRIMARY KEY(symbol, price_date)
        ) WITHOUT ROWID;

        CREATE TABLE IF NOT EXISTS crypto (
            symbol TEXT NOT NULL,
            date TEXT NOT NULL,
            close REAL NOT NULL,
            volume REAL NOT NULL,
            change_1d REAL,
            change_7d REAL,
            change_1m REAL,
            change_3m REAL,
            change_1y REAL,
            PRIMARY KEY(symbol, date)
        ) WITHOUT ROWID;

        CREATE TABLE IF NOT EXISTS stocks (
            symbol TEXT NOT NULL,
            price_date TEXT NOT NULL,
            price REAL NOT NULL,
            volume REAL NOT NULL,
            change_1d REAL,
            change_7d REAL,
            change_1m REAL,
            change_3m REAL,
            change_1y REAL,
            PRIMARY KEY(symbol, price_date)
        ) WITHOUT ROWID;

        CREATE TABLE IF NOT EXISTS rates (
            source TEXT NOT NULL,
            price_date TEXT NOT NULL,
            rate REAL NOT NULL,
            change_1m REAL,
            change_3m REAL,
            change_6m REAL,
            change_1y REAL,
            PRIMARY KEY(source, price_date)
        ) WITHOUT ROWID;

        CREATE TABLE IF NOT EXISTS short_urls (
            short_token TEXT NOT NULL PRIMARY KEY,
            long_url TEXT NOT NULL,
            created_at TEXT NOT NULL
        ) WITHOUT ROWID;
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_temp_store() -> (tempfile::TempDir, MarketStore) {
        let dir = tempdir().unwrap();
        let store = MarketStore::open(&dir.path().join("market.sqlite")).unwrap();
        (dir, store)
    }

    fn crypto_row(symbol: &str, date: &str, close: f64) -> CryptoRow {
        CryptoRow {
            symbol: symbol.to_string(),
            date: date.to_string(),
            close,
            volume: 1_000.0,
            change_1d: Some(1.5),
            change_7d: None,
            change_1m: Some(-2.0),
            change_3m: None,
            change_1y: None,
        }
    }

    #[test]
    fn range_query_sql_numbers_symbol_placeholders_after_dates() {
        let sql = range_query_sql("SELECT symbol FROM crypto", "date", 2);
        assert!(sql.contains("date >= ?1 AND date <= ?2"));
        assert!(sql.contains("symbol IN (?3, ?4)"));
        assert!(sql.ends_with("ORDER BY date ASC, symbol ASC"));
    }

    #[test]
    fn upsert_overwrites_on_conflicting_primary_key() {
        let (_dir, mut store) = open_temp_store();
        store
            .upsert_crypto(&[crypto_row("BTCUSDT", "2025-01-02", 50_000.0)])
            .unwrap();
        store
            .upsert_crypto(&[crypto_row("BTCUSDT", "2025-01-02", 51_000.0)])
            .unwrap();

        let rows = store
            .crypto_in_range("2025-01-01", "2025-01-31", &[])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, 51_000.0);
    }

    #[test]
    fn symbol_filter_limits_range_query() {
        let (_dir, mut store) = open_temp_store();
        store
            .upsert_crypto(&[
                crypto_row("BTCUSDT", "2025-01-02", 50_000.0),
                crypto_row("ETHUSDT", "2025-01-02", 3_000.0),
                crypto_row("SOLUSDT", "2025-01-02", 150.0),
            ])
            .unwrap();

        let rows = store
            .crypto_in_range(
                "2025-01-01",
                "2025-01-31",
                &["BTCUSDT".to_string(), "SOLUSDT".to_string()],
            )
            .unwrap();
        let symbols: Vec<&str> = rows.iter().map(|row| row.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTCUSDT", "SOLUSDT"]);
    }

    #[test]
    fn distinct_symbols_deduplicates_across_dates() {
        let (_dir, mut store) = open_temp_store();
        store
            .upsert_crypto(&[
                crypto_row("BTCUSDT", "2025-01-02", 50_000.0),
                crypto_row("BTCUSDT", "2025-01-03", 50_500.0),
                crypto_row("ETHUSDT", "2025-01-02", 3_000.0),
            ])
            .unwrap();

        let symbols = store.distinct_symbols(PriceTable::Crypto).unwrap();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn duplicate_short_token_is_a_distinct_error() {
        let (_dir, mut store) = open_temp_store();
        store
            .insert_short_url("abc123", "https://example.com/a", "2025-01-01T00:00:00Z")
            .unwrap();

        let err = store
            .insert_short_url("abc123", "https://example.com/b", "2025-01-01T00:00:01Z")
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateToken(token) if token == "abc123"));

        assert_eq!(
            store.lookup_short_url("abc123").unwrap().as_deref(),
            Some("https://example.com/a")
        );
        assert_eq!(store.lookup_short_url("zzzzzz").unwrap(), None);
    }
}
