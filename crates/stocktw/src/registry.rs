//! Store registry for reading fact tables from several stores with fallback.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::BoxFuture;
use tracing::{debug, instrument, warn};

use stocktw_analysis::{AnalysisOptions, AnalysisReport};
use stocktw_core::{
    BalanceSheet, CashFlowStatement, DataError, FactStore, IncomeSheet, IncomeStatement,
    LoadConfig, PeraRecord, PriceRecord, Result, RevenueRecord, SecurityRecord, Snapshot,
};

/// Registry of fact stores with per-table fallback.
///
/// Each table is read from the first store that returns rows for it. A store
/// that fails is logged and skipped. Writes go to every registered store.
///
/// The registry is itself a [`FactStore`], so it can be handed to
/// [`load_snapshot`](stocktw_core::load_snapshot) directly.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use stocktw::{AnalysisOptions, InMemoryStore, LoadConfig, SqliteStore, StoreRegistry};
///
/// let registry = StoreRegistry::new()
///     .with_store(Arc::new(SqliteStore::new("stocktw.db")?))
///     .with_store(Arc::new(InMemoryStore::new()));
///
/// let as_of = chrono::NaiveDate::from_ymd_opt(2024, 8, 20).unwrap();
/// let report = registry
///     .analyze(&LoadConfig::default(), AnalysisOptions::new(as_of))
///     .await?;
/// ```
#[derive(Default)]
pub struct StoreRegistry {
    stores: Vec<Arc<dyn FactStore>>,
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.names())
            .finish()
    }
}

/// Writes to every store, stopping at the first failure.
macro_rules! write_all {
    ($self:ident, $rows:ident, |$store:ident| $call:expr) => {{
        if $self.stores.is_empty() {
            return Err(no_stores());
        }
        for $store in &$self.stores {
            $call.await?;
        }
        Ok($rows.len())
    }};
}

fn no_stores() -> DataError {
    DataError::Store("No stores registered".to_string())
}

impl StoreRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store; stores are tried in registration order.
    pub fn register(&mut self, store: Arc<dyn FactStore>) {
        debug!(store = store.name(), "Registering store");
        self.stores.push(store);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn FactStore>) -> Self {
        self.register(store);
        self
    }

    /// Names of the registered stores, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.stores.iter().map(|s| s.name()).collect()
    }

    /// Number of registered stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Whether no store is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Loads the snapshot for `as_of` through the fallback chain.
    ///
    /// # Errors
    /// Returns an error if no store is registered, or if every store fails
    /// for some table.
    pub async fn load_snapshot(&self, config: &LoadConfig, as_of: NaiveDate) -> Result<Snapshot> {
        stocktw_core::load_snapshot(self, config, as_of).await
    }

    /// Loads a snapshot and computes every analytic view on it.
    ///
    /// # Errors
    /// Propagates load errors and view errors.
    #[instrument(skip(self, config), fields(stores = self.stores.len()))]
    pub async fn analyze(
        &self,
        config: &LoadConfig,
        options: AnalysisOptions,
    ) -> Result<AnalysisReport> {
        let snapshot = self.load_snapshot(config, options.as_of).await?;
        stocktw_analysis::run(&snapshot, options)
    }

    /// Reads one table from the first store returning rows.
    async fn first_with_rows<T, F>(&self, table: &str, load: F) -> Result<Vec<T>>
    where
        F: for<'a> Fn(&'a dyn FactStore) -> BoxFuture<'a, Result<Vec<T>>>,
    {
        if self.stores.is_empty() {
            return Err(no_stores());
        }

        let mut last_error = None;
        let mut answered = false;
        for store in &self.stores {
            match load(store.as_ref()).await {
                Ok(rows) if !rows.is_empty() => {
                    debug!(store = store.name(), table, rows = rows.len(), "Loaded table");
                    return Ok(rows);
                }
                Ok(_) => {
                    debug!(store = store.name(), table, "Store has no rows, trying next");
                    answered = true;
                }
                Err(e) => {
                    warn!(
                        store = store.name(),
                        table,
                        error = %e,
                        "Store failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !answered => Err(e),
            _ => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl FactStore for StoreRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    async fn load_securities(&self) -> Result<Vec<SecurityRecord>> {
        self.first_with_rows("securities", |s| s.load_securities())
            .await
    }

    async fn upsert_securities(&self, rows: &[SecurityRecord]) -> Result<usize> {
        write_all!(self, rows, |store| store.upsert_securities(rows))
    }

    async fn load_prices(&self, since: NaiveDate) -> Result<Vec<PriceRecord>> {
        self.first_with_rows("price", move |s| s.load_prices(since))
            .await
    }

    async fn upsert_prices(&self, rows: &[PriceRecord]) -> Result<usize> {
        write_all!(self, rows, |store| store.upsert_prices(rows))
    }

    async fn load_peras(&self, since: NaiveDate) -> Result<Vec<PeraRecord>> {
        self.first_with_rows("pera", move |s| s.load_peras(since))
            .await
    }

    async fn upsert_peras(&self, rows: &[PeraRecord]) -> Result<usize> {
        write_all!(self, rows, |store| store.upsert_peras(rows))
    }

    async fn load_revenues(&self, since: NaiveDate) -> Result<Vec<RevenueRecord>> {
        self.first_with_rows("revenue", move |s| s.load_revenues(since))
            .await
    }

    async fn upsert_revenues(&self, rows: &[RevenueRecord]) -> Result<usize> {
        write_all!(self, rows, |store| store.upsert_revenues(rows))
    }

    async fn load_income_statements(
        &self,
        sheet: IncomeSheet,
        since: NaiveDate,
    ) -> Result<Vec<IncomeStatement>> {
        let table = stocktw_core::StatementSheet::from(sheet).table_name();
        self.first_with_rows(table, move |s| s.load_income_statements(sheet, since))
            .await
    }

    async fn upsert_income_statements(
        &self,
        sheet: IncomeSheet,
        rows: &[IncomeStatement],
    ) -> Result<usize> {
        write_all!(self, rows, |store| store.upsert_income_statements(sheet, rows))
    }

    async fn load_balance_sheets(&self, since: NaiveDate) -> Result<Vec<BalanceSheet>> {
        self.first_with_rows("balance_sheet", move |s| s.load_balance_sheets(since))
            .await
    }

    async fn upsert_balance_sheets(&self, rows: &[BalanceSheet]) -> Result<usize> {
        write_all!(self, rows, |store| store.upsert_balance_sheets(rows))
    }

    async fn load_cash_flows(&self, since: NaiveDate) -> Result<Vec<CashFlowStatement>> {
        self.first_with_rows("cash_flow", move |s| s.load_cash_flows(since))
            .await
    }

    async fn upsert_cash_flows(&self, rows: &[CashFlowStatement]) -> Result<usize> {
        write_all!(self, rows, |store| store.upsert_cash_flows(rows))
    }

    async fn clear(&self) -> Result<()> {
        for store in &self.stores {
            store.clear().await?;
        }
        Ok(())
    }
}
