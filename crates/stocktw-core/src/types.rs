//! Fact records for Taiwan-market data.
//!
//! This module defines the row types of the five fact tables:
//!
//! - [`StockCode`] - Security code (e.g. `2330`, `00679B`)
//! - [`SecurityRecord`] - Security reference data
//! - [`PriceRecord`] - Daily trading prices
//! - [`PeraRecord`] - P/E ratio, P/B ratio and dividend yield
//! - [`RevenueRecord`] - Monthly revenue
//! - [`IncomeStatement`], [`BalanceSheet`], [`CashFlowStatement`] - Quarterly statements
//!
//! Every numeric field is optional. A missing value stays `None` and is never
//! read as zero.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::table::Keyed;

/// A security code.
///
/// Codes are trimmed and uppercased on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockCode(String);

impl StockCode {
    /// Creates a new code from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StockCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for StockCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StockCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Security reference data, keyed by code alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityRecord {
    /// Security code.
    pub code: StockCode,
    /// Security type (stock, ETF, warrant, ...).
    pub kind: String,
    /// Display name.
    pub name: String,
    /// International Securities Identification Number.
    pub isin: String,
    /// Listing start date.
    pub listed_on: Option<NaiveDate>,
    /// Market (listed, OTC).
    pub market: String,
    /// Industry group.
    pub group: String,
    /// CFI classification code.
    pub cfi: String,
}

impl SecurityRecord {
    /// Creates a security record with the required fields.
    #[must_use]
    pub fn new(code: StockCode, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the industry group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }
}

/// Daily trading prices for one security.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Trading day.
    pub period: NaiveDate,
    /// Security code.
    pub code: StockCode,
    /// Number of shares traded.
    pub traded_shares: Option<f64>,
    /// Number of transactions.
    pub transactions: Option<f64>,
    /// Traded amount.
    pub traded_amount: Option<f64>,
    /// Opening price.
    pub open: Option<f64>,
    /// Highest price.
    pub high: Option<f64>,
    /// Lowest price.
    pub low: Option<f64>,
    /// Closing price.
    pub close: Option<f64>,
    /// Price change against the previous close.
    pub change: Option<f64>,
    /// Price change in percent of the close.
    pub change_pct: Option<f64>,
    /// Last bid price.
    pub last_bid_price: Option<f64>,
    /// Last bid volume.
    pub last_bid_volume: Option<f64>,
    /// Last ask price.
    pub last_ask_price: Option<f64>,
    /// Last ask volume.
    pub last_ask_volume: Option<f64>,
    /// Trailing price-to-earnings ratio.
    pub per: Option<f64>,
}

impl PriceRecord {
    /// Creates a price record with the key fields.
    #[must_use]
    pub fn new(period: NaiveDate, code: StockCode) -> Self {
        Self {
            period,
            code,
            ..Default::default()
        }
    }
}

/// Price/earnings ratio and dividend yield snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PeraRecord {
    /// Trading day.
    pub period: NaiveDate,
    /// Security code.
    pub code: StockCode,
    /// Dividend yield in percent.
    pub dividend_yield: Option<f64>,
    /// Fiscal year of the dividend, in ROC years.
    pub dividend_year: Option<i32>,
    /// Price-to-earnings ratio.
    pub per: Option<f64>,
    /// Price-to-book ratio.
    pub pbr: Option<f64>,
    /// Dividend per share.
    pub dividend_per_share: Option<f64>,
}

impl PeraRecord {
    /// Creates a pera record with the key fields.
    #[must_use]
    pub fn new(period: NaiveDate, code: StockCode) -> Self {
        Self {
            period,
            code,
            ..Default::default()
        }
    }

    /// Sets the dividend yield and the dividend fiscal year.
    #[must_use]
    pub const fn with_dividend(mut self, dividend_yield: f64, dividend_year: i32) -> Self {
        self.dividend_yield = Some(dividend_yield);
        self.dividend_year = Some(dividend_year);
        self
    }
}

/// Monthly revenue report.
///
/// The period is the publication date (day 10) of the month following the
/// reported month.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueRecord {
    /// Publication month.
    pub period: NaiveDate,
    /// Security code.
    pub code: StockCode,
    /// Revenue of the reported month.
    pub revenue: Option<f64>,
    /// Cumulative revenue of the year so far.
    pub cumulative_revenue: Option<f64>,
    /// Cumulative revenue at the same point last year.
    pub last_year_cumulative_revenue: Option<f64>,
}

impl RevenueRecord {
    /// Creates a revenue record.
    #[must_use]
    pub fn new(period: NaiveDate, code: StockCode, revenue: Option<f64>) -> Self {
        Self {
            period,
            code,
            revenue,
            ..Default::default()
        }
    }
}

/// Income statement line items for one quarter.
///
/// The same shape is used for the cumulative (year-to-date) income sheet.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatement {
    /// Quarter-end date.
    pub period: NaiveDate,
    /// Security code.
    pub code: StockCode,
    /// Basic earnings per share.
    pub basic_eps: Option<f64>,
    /// Total non-operating income and expenses.
    pub non_operating_income: Option<f64>,
    /// Gross profit (loss).
    pub gross_profit: Option<f64>,
    /// Net gross profit (loss).
    pub net_gross_profit: Option<f64>,
    /// Net income (loss) of the period.
    pub net_income: Option<f64>,
    /// Total operating revenue.
    pub operating_revenue: Option<f64>,
    /// Pre-tax income from continuing operations.
    pub pretax_income: Option<f64>,
    /// Net income from continuing operations.
    pub continuing_net_income: Option<f64>,
    /// Net income attributable to owners of the parent.
    pub parent_net_income: Option<f64>,
    /// Net income of continuing units.
    pub continuing_units_net_income: Option<f64>,
    /// Net income of discontinued units.
    pub discontinued_net_income: Option<f64>,
}

impl IncomeStatement {
    /// Creates an income statement with the key fields.
    #[must_use]
    pub fn new(period: NaiveDate, code: StockCode) -> Self {
        Self {
            period,
            code,
            ..Default::default()
        }
    }
}

/// Balance sheet line items for one quarter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    /// Quarter-end date.
    pub period: NaiveDate,
    /// Security code.
    pub code: StockCode,
    /// Common stock (share capital).
    pub common_stock: Option<f64>,
    /// Total assets.
    pub total_assets: Option<f64>,
    /// Total equity.
    pub total_equity: Option<f64>,
}

impl BalanceSheet {
    /// Creates a balance sheet.
    #[must_use]
    pub const fn new(
        period: NaiveDate,
        code: StockCode,
        common_stock: Option<f64>,
        total_assets: Option<f64>,
        total_equity: Option<f64>,
    ) -> Self {
        Self {
            period,
            code,
            common_stock,
            total_assets,
            total_equity,
        }
    }
}

/// Cash flow statement line items for one quarter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    /// Quarter-end date.
    pub period: NaiveDate,
    /// Security code.
    pub code: StockCode,
    /// Pre-tax income of the period.
    pub pretax_income: Option<f64>,
    /// Net cash from operating activities.
    pub operating_cash_flow: Option<f64>,
    /// Net cash from investing activities.
    pub investing_cash_flow: Option<f64>,
    /// Net cash from financing activities.
    pub financing_cash_flow: Option<f64>,
}

macro_rules! impl_keyed {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Keyed for $ty {
                fn period(&self) -> NaiveDate {
                    self.period
                }

                fn code(&self) -> &StockCode {
                    &self.code
                }
            }
        )+
    };
}

impl_keyed!(
    PriceRecord,
    PeraRecord,
    RevenueRecord,
    IncomeStatement,
    BalanceSheet,
    CashFlowStatement,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_is_normalized() {
        assert_eq!(StockCode::new(" 00679b ").as_str(), "00679B");
        assert_eq!("2330".parse::<StockCode>().unwrap(), StockCode::from("2330"));
    }

    #[test]
    fn test_records_serialize_missing_values_as_null() {
        let period = NaiveDate::from_ymd_opt(2023, 8, 14).unwrap();
        let sheet = BalanceSheet::new(period, StockCode::new("2330"), Some(10.0), None, None);
        let json = serde_json::to_value(&sheet).unwrap();
        assert!(json["total_assets"].is_null());

        let back: BalanceSheet = serde_json::from_value(json).unwrap();
        assert_eq!(back, sheet);
    }
}
