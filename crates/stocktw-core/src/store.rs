//! Store trait for persisted fact tables.
//!
//! This module defines the [`FactStore`] trait that provides a unified interface
//! for reading and upserting the five fact tables, whatever the backend
//! (a warehouse, a local SQLite file, memory).

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

use crate::{
    error::Result,
    types::{
        BalanceSheet, CashFlowStatement, IncomeStatement, PeraRecord, PriceRecord, RevenueRecord,
        SecurityRecord,
    },
};

/// Which income sheet a statement row belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncomeSheet {
    /// Figures of the quarter alone.
    #[default]
    Quarterly,
    /// Year-to-date figures.
    Cumulative,
}

/// The four statement sheets sharing the `(period, code)` key space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementSheet {
    /// Quarterly income sheet.
    Income,
    /// Cumulative income sheet.
    CumulativeIncome,
    /// Balance sheet.
    Balance,
    /// Cash flow statement.
    CashFlow,
}

impl StatementSheet {
    /// Table name of the sheet.
    #[must_use]
    pub const fn table_name(&self) -> &'static str {
        match self {
            Self::Income => "income_sheet",
            Self::CumulativeIncome => "cumulate_income_sheet",
            Self::Balance => "balance_sheet",
            Self::CashFlow => "cash_flow",
        }
    }
}

impl From<IncomeSheet> for StatementSheet {
    fn from(sheet: IncomeSheet) -> Self {
        match sheet {
            IncomeSheet::Quarterly => Self::Income,
            IncomeSheet::Cumulative => Self::CumulativeIncome,
        }
    }
}

impl fmt::Display for StatementSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Trait for reading and upserting fact tables.
///
/// Reads take the first period to return (`since`, inclusive). Upserts
/// replace rows with the same unique key and return the number of rows
/// written.
#[async_trait]
pub trait FactStore: Send + Sync + Debug {
    /// Returns the name of this store (e.g. "warehouse").
    fn name(&self) -> &str;

    /// Reads all security reference rows.
    async fn load_securities(&self) -> Result<Vec<SecurityRecord>>;

    /// Upserts security reference rows by code.
    async fn upsert_securities(&self, rows: &[SecurityRecord]) -> Result<usize>;

    /// Reads daily prices from `since` on.
    async fn load_prices(&self, since: NaiveDate) -> Result<Vec<PriceRecord>>;

    /// Upserts daily prices by `(period, code)`.
    async fn upsert_prices(&self, rows: &[PriceRecord]) -> Result<usize>;

    /// Reads pera rows from `since` on.
    async fn load_peras(&self, since: NaiveDate) -> Result<Vec<PeraRecord>>;

    /// Upserts pera rows by `(period, code)`.
    async fn upsert_peras(&self, rows: &[PeraRecord]) -> Result<usize>;

    /// Reads monthly revenue from `since` on.
    async fn load_revenues(&self, since: NaiveDate) -> Result<Vec<RevenueRecord>>;

    /// Upserts monthly revenue by `(period, code)`.
    async fn upsert_revenues(&self, rows: &[RevenueRecord]) -> Result<usize>;

    /// Reads income statements of one sheet from `since` on.
    async fn load_income_statements(
        &self,
        sheet: IncomeSheet,
        since: NaiveDate,
    ) -> Result<Vec<IncomeStatement>>;

    /// Upserts income statements of one sheet by `(period, code)`.
    async fn upsert_income_statements(
        &self,
        sheet: IncomeSheet,
        rows: &[IncomeStatement],
    ) -> Result<usize>;

    /// Reads balance sheets from `since` on.
    async fn load_balance_sheets(&self, since: NaiveDate) -> Result<Vec<BalanceSheet>>;

    /// Upserts balance sheets by `(period, code)`.
    async fn upsert_balance_sheets(&self, rows: &[BalanceSheet]) -> Result<usize>;

    /// Reads cash flow statements from `since` on.
    async fn load_cash_flows(&self, since: NaiveDate) -> Result<Vec<CashFlowStatement>>;

    /// Upserts cash flow statements by `(period, code)`.
    async fn upsert_cash_flows(&self, rows: &[CashFlowStatement]) -> Result<usize>;

    /// Removes every stored row.
    async fn clear(&self) -> Result<()>;
}
