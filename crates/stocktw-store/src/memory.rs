//! In-memory fact store.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use stocktw_core::{
    BalanceSheet, CashFlowStatement, FactStore, FactTable, IncomeSheet, IncomeStatement, Keyed,
    PeraRecord, PriceRecord, Result, RevenueRecord, SecurityRecord, StockCode,
};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Rows of `table` from `since` on, in `(period, code)` order.
fn rows_since<R: Keyed + Clone>(table: &FactTable<R>, since: NaiveDate) -> Vec<R> {
    table
        .iter()
        .skip_while(|row| row.period() < since)
        .cloned()
        .collect()
}

/// Simple in-memory store for tests and short-lived runs.
///
/// Each table is a `RwLock`-protected [`FactTable`]; upserts keep the last
/// row written for a key.
#[derive(Debug)]
pub struct InMemoryStore {
    securities: RwLock<BTreeMap<StockCode, SecurityRecord>>,
    prices: RwLock<FactTable<PriceRecord>>,
    peras: RwLock<FactTable<PeraRecord>>,
    revenues: RwLock<FactTable<RevenueRecord>>,
    income: RwLock<FactTable<IncomeStatement>>,
    cumulative_income: RwLock<FactTable<IncomeStatement>>,
    balance: RwLock<FactTable<BalanceSheet>>,
    cash_flow: RwLock<FactTable<CashFlowStatement>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            securities: RwLock::default(),
            prices: RwLock::new(FactTable::new("price")),
            peras: RwLock::new(FactTable::new("pera")),
            revenues: RwLock::new(FactTable::new("revenue")),
            income: RwLock::new(FactTable::new("income_sheet")),
            cumulative_income: RwLock::new(FactTable::new("cumulate_income_sheet")),
            balance: RwLock::new(FactTable::new("balance_sheet")),
            cash_flow: RwLock::new(FactTable::new("cash_flow")),
        }
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    const fn income_sheet(&self, sheet: IncomeSheet) -> &RwLock<FactTable<IncomeStatement>> {
        match sheet {
            IncomeSheet::Quarterly => &self.income,
            IncomeSheet::Cumulative => &self.cumulative_income,
        }
    }
}

#[async_trait]
impl FactStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load_securities(&self) -> Result<Vec<SecurityRecord>> {
        Ok(self.securities.read().await.values().cloned().collect())
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_securities(&self, rows: &[SecurityRecord]) -> Result<usize> {
        let mut securities = self.securities.write().await;
        for row in rows {
            securities.insert(row.code.clone(), row.clone());
        }
        Ok(rows.len())
    }

    async fn load_prices(&self, since: NaiveDate) -> Result<Vec<PriceRecord>> {
        Ok(rows_since(&*self.prices.read().await, since))
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_prices(&self, rows: &[PriceRecord]) -> Result<usize> {
        self.prices.write().await.extend(rows.iter().cloned());
        debug!(rows = rows.len(), "Upserted prices");
        Ok(rows.len())
    }

    async fn load_peras(&self, since: NaiveDate) -> Result<Vec<PeraRecord>> {
        Ok(rows_since(&*self.peras.read().await, since))
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_peras(&self, rows: &[PeraRecord]) -> Result<usize> {
        self.peras.write().await.extend(rows.iter().cloned());
        Ok(rows.len())
    }

    async fn load_revenues(&self, since: NaiveDate) -> Result<Vec<RevenueRecord>> {
        Ok(rows_since(&*self.revenues.read().await, since))
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_revenues(&self, rows: &[RevenueRecord]) -> Result<usize> {
        self.revenues.write().await.extend(rows.iter().cloned());
        Ok(rows.len())
    }

    async fn load_income_statements(
        &self,
        sheet: IncomeSheet,
        since: NaiveDate,
    ) -> Result<Vec<IncomeStatement>> {
        Ok(rows_since(&*self.income_sheet(sheet).read().await, since))
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_income_statements(
        &self,
        sheet: IncomeSheet,
        rows: &[IncomeStatement],
    ) -> Result<usize> {
        self.income_sheet(sheet)
            .write()
            .await
            .extend(rows.iter().cloned());
        Ok(rows.len())
    }

    async fn load_balance_sheets(&self, since: NaiveDate) -> Result<Vec<BalanceSheet>> {
        Ok(rows_since(&*self.balance.read().await, since))
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_balance_sheets(&self, rows: &[BalanceSheet]) -> Result<usize> {
        self.balance.write().await.extend(rows.iter().cloned());
        Ok(rows.len())
    }

    async fn load_cash_flows(&self, since: NaiveDate) -> Result<Vec<CashFlowStatement>> {
        Ok(rows_since(&*self.cash_flow.read().await, since))
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_cash_flows(&self, rows: &[CashFlowStatement]) -> Result<usize> {
        self.cash_flow.write().await.extend(rows.iter().cloned());
        Ok(rows.len())
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let empty = Self::default();
        *self.securities.write().await = empty.securities.into_inner();
        *self.prices.write().await = empty.prices.into_inner();
        *self.peras.write().await = empty.peras.into_inner();
        *self.revenues.write().await = empty.revenues.into_inner();
        *self.income.write().await = empty.income.into_inner();
        *self.cumulative_income.write().await = empty.cumulative_income.into_inner();
        *self.balance.write().await = empty.balance.into_inner();
        *self.cash_flow.write().await = empty.cash_flow.into_inner();
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
    async fn test_memory_store_basic() {
        let store = InMemoryStore::new();
        let code = StockCode::new("2330");

        let revenues = [
            RevenueRecord::new(date(2023, 6, 10), code.clone(), Some(100.0)),
            RevenueRecord::new(date(2023, 7, 10), code.clone(), Some(120.0)),
        ];
        assert_eq!(store.upsert_revenues(&revenues).await.unwrap(), 2);

        let loaded = store.load_revenues(date(2023, 7, 1)).await.unwrap();
        assert_eq!(loaded, vec![revenues[1].clone()]);
    }

    #[tokio::test]
    async fn test_memory_store_last_write_wins() {
        let store = InMemoryStore::new();
        let period = date(2023, 8, 1);
        let code = StockCode::new("2330");

        store
            .upsert_peras(&[PeraRecord::new(period, code.clone()).with_dividend(1.0, 111)])
            .await
            .unwrap();
        store
            .upsert_peras(&[PeraRecord::new(period, code).with_dividend(2.0, 111)])
            .await
            .unwrap();

        let loaded = store.load_peras(period).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].dividend_yield, Some(2.0));
    }

    #[tokio::test]
    async fn test_memory_store_income_sheets() {
        let store = InMemoryStore::new();
        let q = date(2023, 8, 14);
        let row = IncomeStatement::new(q, StockCode::new("2330"));

        store
            .upsert_income_statements(IncomeSheet::Cumulative, &[row.clone()])
            .await
            .unwrap();

        assert!(
            store
                .load_income_statements(IncomeSheet::Quarterly, q)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            store
                .load_income_statements(IncomeSheet::Cumulative, q)
                .await
                .unwrap(),
            vec![row]
        );
    }

    #[tokio::test]
    async fn test_memory_store_clear() {
        let store = InMemoryStore::new();
        store
            .upsert_securities(&[SecurityRecord::new(StockCode::new("2330"), "TSMC")])
            .await
            .unwrap();
        store
            .upsert_balance_sheets(&[BalanceSheet::new(
                date(2023, 8, 14),
                StockCode::new("2330"),
                None,
                Some(1.0),
                Some(1.0),
            )])
            .await
            .unwrap();

        store.clear().await.unwrap();

        assert!(store.load_securities().await.unwrap().is_empty());
        assert!(
            store
                .load_balance_sheets(date(2000, 1, 1))
                .await
                .unwrap()
                .is_empty()
        );
    }
}
