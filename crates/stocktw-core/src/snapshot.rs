//! Immutable snapshot of the fact tables for one analysis run.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::{
    config::LoadConfig,
    error::Result,
    store::{FactStore, IncomeSheet},
    table::{FactTable, PeriodRange},
    types::{
        BalanceSheet, CashFlowStatement, IncomeStatement, PeraRecord, PriceRecord, RevenueRecord,
        SecurityRecord, StockCode,
    },
};

/// Security reference data indexed by code.
pub type SecurityTable = BTreeMap<StockCode, SecurityRecord>;

/// The four statement sheets of a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct FinancialStatements {
    /// Quarterly income sheet.
    pub income: FactTable<IncomeStatement>,
    /// Cumulative (year-to-date) income sheet.
    pub cumulative_income: FactTable<IncomeStatement>,
    /// Balance sheet.
    pub balance: FactTable<BalanceSheet>,
    /// Cash flow statement.
    pub cash_flow: FactTable<CashFlowStatement>,
}

impl Default for FinancialStatements {
    fn default() -> Self {
        Self {
            income: FactTable::new("income_sheet"),
            cumulative_income: FactTable::new("cumulate_income_sheet"),
            balance: FactTable::new("balance_sheet"),
            cash_flow: FactTable::new("cash_flow"),
        }
    }
}

/// Period ranges covered by each fact table of a snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SnapshotRanges {
    /// Trading days of prices.
    pub price: Option<PeriodRange>,
    /// Trading days of pera rows.
    pub pera: Option<PeriodRange>,
    /// Revenue months.
    pub revenue: Option<PeriodRange>,
    /// Quarter-ends of statements, measured on the balance sheet.
    pub statement: Option<PeriodRange>,
}

/// Immutable bundle of the fact tables.
///
/// Derived views are computed from a snapshot by pure functions; the
/// snapshot itself is never modified after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    securities: SecurityTable,
    prices: FactTable<PriceRecord>,
    peras: FactTable<PeraRecord>,
    revenues: FactTable<RevenueRecord>,
    statements: FinancialStatements,
    ranges: SnapshotRanges,
}

impl Snapshot {
    /// Bundles fact tables into a snapshot and records their period ranges.
    #[must_use]
    pub fn new(
        securities: SecurityTable,
        prices: FactTable<PriceRecord>,
        peras: FactTable<PeraRecord>,
        revenues: FactTable<RevenueRecord>,
        statements: FinancialStatements,
    ) -> Self {
        let ranges = SnapshotRanges {
            price: prices.range(),
            pera: peras.range(),
            revenue: revenues.range(),
            statement: statements.balance.range(),
        };
        Self {
            securities,
            prices,
            peras,
            revenues,
            statements,
            ranges,
        }
    }

    /// Builds a snapshot from loaded rows.
    #[must_use]
    pub fn from_rows(
        securities: Vec<SecurityRecord>,
        prices: Vec<PriceRecord>,
        peras: Vec<PeraRecord>,
        revenues: Vec<RevenueRecord>,
        statements: FinancialStatements,
    ) -> Self {
        Self::new(
            securities
                .into_iter()
                .map(|s| (s.code.clone(), s))
                .collect(),
            FactTable::from_rows("price", prices),
            FactTable::from_rows("pera", peras),
            FactTable::from_rows("revenue", revenues),
            statements,
        )
    }

    /// Security reference data.
    #[must_use]
    pub const fn securities(&self) -> &SecurityTable {
        &self.securities
    }

    /// Daily prices.
    #[must_use]
    pub const fn prices(&self) -> &FactTable<PriceRecord> {
        &self.prices
    }

    /// Pera rows.
    #[must_use]
    pub const fn peras(&self) -> &FactTable<PeraRecord> {
        &self.peras
    }

    /// Monthly revenue.
    #[must_use]
    pub const fn revenues(&self) -> &FactTable<RevenueRecord> {
        &self.revenues
    }

    /// Quarterly statements.
    #[must_use]
    pub const fn statements(&self) -> &FinancialStatements {
        &self.statements
    }

    /// Period ranges of the tables.
    #[must_use]
    pub const fn ranges(&self) -> &SnapshotRanges {
        &self.ranges
    }
}

/// Loads a snapshot from a single store.
///
/// This is the explicit per-run entry point; the store owns its connection
/// and the snapshot owns its rows.
///
/// # Errors
/// Propagates the first store error.
#[instrument(skip(store, config), fields(store = store.name()))]
pub async fn load_snapshot(
    store: &dyn FactStore,
    config: &LoadConfig,
    as_of: NaiveDate,
) -> Result<Snapshot> {
    let window = config.window(as_of)?;

    let (securities, prices, peras, revenues) = futures::try_join!(
        store.load_securities(),
        store.load_prices(window.prices_since),
        store.load_peras(window.peras_since),
        store.load_revenues(window.revenues_since),
    )?;
    let (income, cumulative_income, balance, cash_flow) = futures::try_join!(
        store.load_income_statements(IncomeSheet::Quarterly, window.statements_since),
        store.load_income_statements(IncomeSheet::Cumulative, window.statements_since),
        store.load_balance_sheets(window.statements_since),
        store.load_cash_flows(window.statements_since),
    )?;

    let statements = FinancialStatements {
        income: FactTable::from_rows("income_sheet", income),
        cumulative_income: FactTable::from_rows("cumulate_income_sheet", cumulative_income),
        balance: FactTable::from_rows("balance_sheet", balance),
        cash_flow: FactTable::from_rows("cash_flow", cash_flow),
    };
    let snapshot = Snapshot::from_rows(securities, prices, peras, revenues, statements);

    debug!(
        securities = snapshot.securities.len(),
        prices = snapshot.prices.len(),
        peras = snapshot.peras.len(),
        revenues = snapshot.revenues.len(),
        balance_sheets = snapshot.statements.balance.len(),
        "Loaded snapshot"
    );
    Ok(snapshot)
}
