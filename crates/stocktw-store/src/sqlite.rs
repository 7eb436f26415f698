//! SQLite-backed fact store.

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{Connection, Row, params, types::Type};
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;
use std::sync::Mutex;
use stocktw_core::{
    BalanceSheet, CashFlowStatement, DataError, FactStore, IncomeSheet, IncomeStatement, Keyed,
    PeraRecord, PriceRecord, Result, RevenueRecord, SecurityRecord, StatementSheet, StockCode,
};
use tracing::{debug, instrument};

/// SQLite-backed store for the fact tables.
///
/// Prices, pera rows and revenue have one column per field. Statement line
/// items vary by sheet and are stored as JSON next to their key.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| DataError::Store(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Creates an in-memory store; data is lost when it is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| DataError::Store(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Store(e.to_string()))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS securities (
                code TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                isin TEXT NOT NULL,
                listed_on TEXT,
                market TEXT NOT NULL,
                group_name TEXT NOT NULL,
                cfi TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS prices (
                period TEXT NOT NULL,
                code TEXT NOT NULL,
                traded_shares REAL,
                transactions REAL,
                traded_amount REAL,
                open REAL,
                high REAL,
                low REAL,
                close REAL,
                change REAL,
                change_pct REAL,
                last_bid_price REAL,
                last_bid_volume REAL,
                last_ask_price REAL,
                last_ask_volume REAL,
                per REAL,
                PRIMARY KEY (period, code)
            );

            CREATE TABLE IF NOT EXISTS peras (
                period TEXT NOT NULL,
                code TEXT NOT NULL,
                dividend_yield REAL,
                dividend_year INTEGER,
                per REAL,
                pbr REAL,
                dividend_per_share REAL,
                PRIMARY KEY (period, code)
            );

            CREATE TABLE IF NOT EXISTS revenues (
                period TEXT NOT NULL,
                code TEXT NOT NULL,
                revenue REAL,
                cumulative_revenue REAL,
                last_year_cumulative_revenue REAL,
                PRIMARY KEY (period, code)
            );

            CREATE TABLE IF NOT EXISTS statements (
                sheet TEXT NOT NULL,
                period TEXT NOT NULL,
                code TEXT NOT NULL,
                data_json TEXT NOT NULL,
                PRIMARY KEY (sheet, period, code)
            );

            CREATE INDEX IF NOT EXISTS idx_statements_sheet_period
            ON statements(sheet, period);",
        )
        .map_err(|e| DataError::Store(e.to_string()))?;

        debug!("SQLite store schema initialized");
        Ok(())
    }

    fn load_statements<T: DeserializeOwned>(
        &self,
        sheet: StatementSheet,
        since: NaiveDate,
    ) -> Result<Vec<T>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Store(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT data_json FROM statements
                 WHERE sheet = ?1 AND period >= ?2
                 ORDER BY period, code",
            )
            .map_err(|e| DataError::Store(e.to_string()))?;

        let rows = stmt
            .query_map(params![sheet.table_name(), since.to_string()], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| DataError::Store(e.to_string()))?;

        let mut statements = Vec::new();
        for row in rows {
            let json = row.map_err(|e| DataError::Store(e.to_string()))?;
            let statement: T =
                serde_json::from_str(&json).map_err(|e| DataError::Parse(e.to_string()))?;
            statements.push(statement);
        }

        debug!(%sheet, rows = statements.len(), "Loaded statements");
        Ok(statements)
    }

    fn upsert_statements<T: Serialize + Keyed>(
        &self,
        sheet: StatementSheet,
        rows: &[T],
    ) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Store(e.to_string()))?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| DataError::Store(e.to_string()))?;

        for row in rows {
            let data_json =
                serde_json::to_string(row).map_err(|e| DataError::Parse(e.to_string()))?;
            tx.execute(
                "INSERT OR REPLACE INTO statements (sheet, period, code, data_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    sheet.table_name(),
                    row.period().to_string(),
                    row.code().as_str(),
                    data_json
                ],
            )
            .map_err(|e| DataError::Store(e.to_string()))?;
        }

        tx.commit().map_err(|e| DataError::Store(e.to_string()))?;
        debug!(%sheet, rows = rows.len(), "Upserted statements");
        Ok(rows.len())
    }
}

/// Reads a `TEXT` column holding an ISO date.
fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    text.parse::<NaiveDate>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => date_at(row, idx).map(Some),
        None => Ok(None),
    }
}

fn code_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<StockCode> {
    row.get::<_, String>(idx).map(StockCode::new)
}

#[async_trait]
impl FactStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    #[instrument(skip(self))]
    async fn load_securities(&self) -> Result<Vec<SecurityRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Store(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT code, kind, name, isin, listed_on, market, group_name, cfi
                 FROM securities ORDER BY code",
            )
            .map_err(|e| DataError::Store(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(SecurityRecord {
                    code: code_at(row, 0)?,
                    kind: row.get(1)?,
                    name: row.get(2)?,
                    isin: row.get(3)?,
                    listed_on: optional_date_at(row, 4)?,
                    market: row.get(5)?,
                    group: row.get(6)?,
                    cfi: row.get(7)?,
                })
            })
            .map_err(|e| DataError::Store(e.to_string()))?;

        let securities = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| DataError::Store(e.to_string()))?;
        debug!(rows = securities.len(), "Loaded securities");
        Ok(securities)
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_securities(&self, rows: &[SecurityRecord]) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Store(e.to_string()))?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| DataError::Store(e.to_string()))?;

        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO securities
                 (code, kind, name, isin, listed_on, market, group_name, cfi)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.code.as_str(),
                    row.kind,
                    row.name,
                    row.isin,
                    row.listed_on.map(|d| d.to_string()),
                    row.market,
                    row.group,
                    row.cfi
                ],
            )
            .map_err(|e| DataError::Store(e.to_string()))?;
        }

        tx.commit().map_err(|e| DataError::Store(e.to_string()))?;
        Ok(rows.len())
    }

    #[instrument(skip(self))]
    async fn load_prices(&self, since: NaiveDate) -> Result<Vec<PriceRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Store(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT period, code, traded_shares, transactions, traded_amount,
                        open, high, low, close, change, change_pct,
                        last_bid_price, last_bid_volume, last_ask_price, last_ask_volume, per
                 FROM prices WHERE period >= ?1 ORDER BY period, code",
            )
            .map_err(|e| DataError::Store(e.to_string()))?;

        let rows = stmt
            .query_map(params![since.to_string()], |row| {
                Ok(PriceRecord {
                    period: date_at(row, 0)?,
                    code: code_at(row, 1)?,
                    traded_shares: row.get(2)?,
                    transactions: row.get(3)?,
                    traded_amount: row.get(4)?,
                    open: row.get(5)?,
                    high: row.get(6)?,
                    low: row.get(7)?,
                    close: row.get(8)?,
                    change: row.get(9)?,
                    change_pct: row.get(10)?,
                    last_bid_price: row.get(11)?,
                    last_bid_volume: row.get(12)?,
                    last_ask_price: row.get(13)?,
                    last_ask_volume: row.get(14)?,
                    per: row.get(15)?,
                })
            })
            .map_err(|e| DataError::Store(e.to_string()))?;

        let prices = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| DataError::Store(e.to_string()))?;
        debug!(rows = prices.len(), "Loaded prices");
        Ok(prices)
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_prices(&self, rows: &[PriceRecord]) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Store(e.to_string()))?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| DataError::Store(e.to_string()))?;

        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO prices
                 (period, code, traded_shares, transactions, traded_amount,
                  open, high, low, close, change, change_pct,
                  last_bid_price, last_bid_volume, last_ask_price, last_ask_volume, per)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    row.period.to_string(),
                    row.code.as_str(),
                    row.traded_shares,
                    row.transactions,
                    row.traded_amount,
                    row.open,
                    row.high,
                    row.low,
                    row.close,
                    row.change,
                    row.change_pct,
                    row.last_bid_price,
                    row.last_bid_volume,
                    row.last_ask_price,
                    row.last_ask_volume,
                    row.per
                ],
            )
            .map_err(|e| DataError::Store(e.to_string()))?;
        }

        tx.commit().map_err(|e| DataError::Store(e.to_string()))?;
        debug!(rows = rows.len(), "Upserted prices");
        Ok(rows.len())
    }

    #[instrument(skip(self))]
    async fn load_peras(&self, since: NaiveDate) -> Result<Vec<PeraRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Store(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT period, code, dividend_yield, dividend_year, per, pbr, dividend_per_share
                 FROM peras WHERE period >= ?1 ORDER BY period, code",
            )
            .map_err(|e| DataError::Store(e.to_string()))?;

        let rows = stmt
            .query_map(params![since.to_string()], |row| {
                Ok(PeraRecord {
                    period: date_at(row, 0)?,
                    code: code_at(row, 1)?,
                    dividend_yield: row.get(2)?,
                    dividend_year: row.get(3)?,
                    per: row.get(4)?,
                    pbr: row.get(5)?,
                    dividend_per_share: row.get(6)?,
                })
            })
            .map_err(|e| DataError::Store(e.to_string()))?;

        let peras = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| DataError::Store(e.to_string()))?;
        debug!(rows = peras.len(), "Loaded pera rows");
        Ok(peras)
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_peras(&self, rows: &[PeraRecord]) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Store(e.to_string()))?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| DataError::Store(e.to_string()))?;

        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO peras
                 (period, code, dividend_yield, dividend_year, per, pbr, dividend_per_share)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.period.to_string(),
                    row.code.as_str(),
                    row.dividend_yield,
                    row.dividend_year,
                    row.per,
                    row.pbr,
                    row.dividend_per_share
                ],
            )
            .map_err(|e| DataError::Store(e.to_string()))?;
        }

        tx.commit().map_err(|e| DataError::Store(e.to_string()))?;
        Ok(rows.len())
    }

    #[instrument(skip(self))]
    async fn load_revenues(&self, since: NaiveDate) -> Result<Vec<RevenueRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Store(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT period, code, revenue, cumulative_revenue, last_year_cumulative_revenue
                 FROM revenues WHERE period >= ?1 ORDER BY period, code",
            )
            .map_err(|e| DataError::Store(e.to_string()))?;

        let rows = stmt
            .query_map(params![since.to_string()], |row| {
                Ok(RevenueRecord {
                    period: date_at(row, 0)?,
                    code: code_at(row, 1)?,
                    revenue: row.get(2)?,
                    cumulative_revenue: row.get(3)?,
                    last_year_cumulative_revenue: row.get(4)?,
                })
            })
            .map_err(|e| DataError::Store(e.to_string()))?;

        let revenues = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| DataError::Store(e.to_string()))?;
        debug!(rows = revenues.len(), "Loaded revenue");
        Ok(revenues)
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_revenues(&self, rows: &[RevenueRecord]) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Store(e.to_string()))?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| DataError::Store(e.to_string()))?;

        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO revenues
                 (period, code, revenue, cumulative_revenue, last_year_cumulative_revenue)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    row.period.to_string(),
                    row.code.as_str(),
                    row.revenue,
                    row.cumulative_revenue,
                    row.last_year_cumulative_revenue
                ],
            )
            .map_err(|e| DataError::Store(e.to_string()))?;
        }

        tx.commit().map_err(|e| DataError::Store(e.to_string()))?;
        Ok(rows.len())
    }

    #[instrument(skip(self))]
    async fn load_income_statements(
        &self,
        sheet: IncomeSheet,
        since: NaiveDate,
    ) -> Result<Vec<IncomeStatement>> {
        self.load_statements(sheet.into(), since)
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_income_statements(
        &self,
        sheet: IncomeSheet,
        rows: &[IncomeStatement],
    ) -> Result<usize> {
        self.upsert_statements(sheet.into(), rows)
    }

    #[instrument(skip(self))]
    async fn load_balance_sheets(&self, since: NaiveDate) -> Result<Vec<BalanceSheet>> {
        self.load_statements(StatementSheet::Balance, since)
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_balance_sheets(&self, rows: &[BalanceSheet]) -> Result<usize> {
        self.upsert_statements(StatementSheet::Balance, rows)
    }

    #[instrument(skip(self))]
    async fn load_cash_flows(&self, since: NaiveDate) -> Result<Vec<CashFlowStatement>> {
        self.load_statements(StatementSheet::CashFlow, since)
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_cash_flows(&self, rows: &[CashFlowStatement]) -> Result<usize> {
        self.upsert_statements(StatementSheet::CashFlow, rows)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Store(e.to_string()))?;

        conn.execute_batch(
            "DELETE FROM securities;
             DELETE FROM prices;
             DELETE FROM peras;
             DELETE FROM revenues;
             DELETE FROM statements;",
        )
        .map_err(|e| DataError::Store(e.to_string()))?;

        debug!("Cleared all fact tables");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_store_initialization() {
        let store = SqliteStore::in_memory();
        assert!(store.is_ok());
    }

    #[tokio::test]
    async fn test_prices_round_trip_with_since_filter() {
        let store = SqliteStore::in_memory().unwrap();
        let code = StockCode::new("2330");
        let prices = vec![
            PriceRecord {
                close: Some(560.0),
                traded_shares: Some(20_000.0),
                ..PriceRecord::new(date(2023, 8, 1), code.clone())
            },
            PriceRecord {
                close: Some(565.0),
                ..PriceRecord::new(date(2023, 8, 2), code.clone())
            },
        ];

        assert_eq!(store.upsert_prices(&prices).await.unwrap(), 2);

        let loaded = store.load_prices(date(2023, 8, 2)).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].close, Some(565.0));
        assert_eq!(loaded[0].traded_shares, None);

        let all = store.load_prices(date(2023, 1, 1)).await.unwrap();
        assert_eq!(all, prices);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_key() {
        let store = SqliteStore::in_memory().unwrap();
        let code = StockCode::new("2330");
        let period = date(2023, 8, 10);

        store
            .upsert_revenues(&[RevenueRecord::new(period, code.clone(), Some(1.0))])
            .await
            .unwrap();
        store
            .upsert_revenues(&[RevenueRecord::new(period, code, Some(2.0))])
            .await
            .unwrap();

        let loaded = store.load_revenues(period).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].revenue, Some(2.0));
    }

    #[tokio::test]
    async fn test_statement_sheets_are_separate() {
        let store = SqliteStore::in_memory().unwrap();
        let q = date(2023, 8, 14);
        let quarterly = IncomeStatement {
            basic_eps: Some(9.0),
            ..IncomeStatement::new(q, StockCode::new("2330"))
        };
        let cumulative = IncomeStatement {
            basic_eps: Some(14.0),
            ..IncomeStatement::new(q, StockCode::new("2330"))
        };

        store
            .upsert_income_statements(IncomeSheet::Quarterly, &[quarterly.clone()])
            .await
            .unwrap();
        store
            .upsert_income_statements(IncomeSheet::Cumulative, &[cumulative.clone()])
            .await
            .unwrap();
        store
            .upsert_balance_sheets(&[BalanceSheet::new(
                q,
                StockCode::new("2330"),
                Some(259.0),
                Some(5000.0),
                Some(3000.0),
            )])
            .await
            .unwrap();

        let since = date(2020, 1, 1);
        assert_eq!(
            store
                .load_income_statements(IncomeSheet::Quarterly, since)
                .await
                .unwrap(),
            vec![quarterly]
        );
        assert_eq!(
            store
                .load_income_statements(IncomeSheet::Cumulative, since)
                .await
                .unwrap(),
            vec![cumulative]
        );
        assert_eq!(store.load_balance_sheets(since).await.unwrap().len(), 1);
        assert!(store.load_cash_flows(since).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_securities_and_peras() {
        let store = SqliteStore::in_memory().unwrap();
        let mut security =
            SecurityRecord::new(StockCode::new("2330"), "TSMC").with_group("Semiconductor");
        security.listed_on = Some(date(1994, 9, 5));
        store.upsert_securities(&[security.clone()]).await.unwrap();
        assert_eq!(store.load_securities().await.unwrap(), vec![security]);

        let pera =
            PeraRecord::new(date(2023, 8, 1), StockCode::new("2330")).with_dividend(2.1, 111);
        store.upsert_peras(&[pera.clone()]).await.unwrap();
        assert_eq!(store.load_peras(date(2023, 1, 1)).await.unwrap(), vec![pera]);
    }

    #[tokio::test]
    async fn test_clear_store() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert_securities(&[SecurityRecord::new(StockCode::new("2330"), "TSMC")])
            .await
            .unwrap();

        store.clear().await.unwrap();
        assert!(store.load_securities().await.unwrap().is_empty());
    }
}
