//! Historical profitability ratios per fiscal quarter.
//!
//! Income-sheet and balance-sheet rows are joined on `(period, code)` and
//! turned into margin and return ratios:
//!
//! ```text
//! GPM = gross profit / operating revenue * 100
//! NIM = net income / operating revenue * 100
//! ROA = net income / total assets * 100
//! ROE = net income / total equity * 100
//! DBR = (total assets - total equity) / total assets * 100
//! ```
//!
//! Monthly revenue is aggregated onto the same quarters so that it can be
//! compared with the statement's operating revenue.

use chrono::{Months, NaiveDate};
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use stocktw_core::{
    BalanceSheet, FactTable, FiscalQuarter, IncomeStatement, IntoFrame, Keyed, Result,
    RevenueRecord, StockCode,
    frame::{code_column, date_column, f64_column, frame, i64_column},
};

use crate::ratio::{diff, percent};

/// Monthly revenue aggregated onto one fiscal quarter.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RevenueQuarter {
    /// Sum of the monthly revenue.
    pub sum: f64,
    /// Mean monthly revenue.
    pub mean: f64,
    /// Number of months with a reported revenue.
    pub months: u32,
}

/// Profitability ratios of one security for one fiscal quarter.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoricalProfitability {
    /// Quarter-end date.
    pub period: NaiveDate,
    /// Security code.
    pub code: StockCode,
    /// Basic earnings per share.
    pub basic_eps: Option<f64>,
    /// Non-operating income and expenses.
    pub non_operating_income: Option<f64>,
    /// Gross profit.
    pub gross_profit: Option<f64>,
    /// Net income.
    pub net_income: Option<f64>,
    /// Operating revenue.
    pub operating_revenue: Option<f64>,
    /// Common stock.
    pub common_stock: Option<f64>,
    /// Total assets.
    pub total_assets: Option<f64>,
    /// Total equity.
    pub total_equity: Option<f64>,
    /// Gross profit margin in percent.
    pub gpm: Option<f64>,
    /// Net income margin in percent.
    pub nim: Option<f64>,
    /// Return on assets in percent.
    pub roa: Option<f64>,
    /// Return on equity in percent.
    pub roe: Option<f64>,
    /// Debt-to-asset ratio in percent.
    pub dbr: Option<f64>,
    /// Monthly revenue mapped onto this quarter, if any.
    pub revenue: Option<RevenueQuarter>,
}

impl Keyed for HistoricalProfitability {
    fn period(&self) -> NaiveDate {
        self.period
    }

    fn code(&self) -> &StockCode {
        &self.code
    }
}

impl HistoricalProfitability {
    fn from_statements(income: &IncomeStatement, balance: &BalanceSheet) -> Self {
        let net_income = income.net_income;
        let revenue = income.operating_revenue;
        let assets = balance.total_assets;
        let equity = balance.total_equity;

        Self {
            period: income.period,
            code: income.code.clone(),
            basic_eps: income.basic_eps,
            non_operating_income: income.non_operating_income,
            gross_profit: income.gross_profit,
            net_income,
            operating_revenue: revenue,
            common_stock: balance.common_stock,
            total_assets: assets,
            total_equity: equity,
            gpm: percent(income.gross_profit, revenue),
            nim: percent(net_income, revenue),
            roa: percent(net_income, assets),
            roe: percent(net_income, equity),
            dbr: percent(diff(assets, equity), assets),
            revenue: None,
        }
    }
}

/// Aggregates monthly revenue onto fiscal quarters.
///
/// A revenue row published on the 10th reports the previous month, so each
/// period is moved back one month before it is bucketed with
/// [`FiscalQuarter::enclosing`]. Rows without a revenue figure are skipped.
#[must_use]
pub fn revenue_by_quarter(
    revenues: &FactTable<RevenueRecord>,
) -> BTreeMap<(NaiveDate, StockCode), RevenueQuarter> {
    let mut buckets: BTreeMap<(NaiveDate, StockCode), Vec<f64>> = BTreeMap::new();
    for row in revenues.iter() {
        let Some(value) = row.revenue else { continue };
        let reported = row
            .period
            .checked_sub_months(Months::new(1))
            .unwrap_or(row.period);
        let quarter_end = FiscalQuarter::enclosing(reported).end_date();
        buckets
            .entry((quarter_end, row.code.clone()))
            .or_default()
            .push(value);
    }

    buckets
        .into_iter()
        .map(|(key, values)| {
            let sum: f64 = values.iter().sum();
            let months = values.len() as u32;
            let quarter = RevenueQuarter {
                sum,
                mean: sum / f64::from(months),
                months,
            };
            (key, quarter)
        })
        .collect()
}

/// Builds the historical profitability table.
///
/// Income and balance sheets are inner-joined: a key present in only one of
/// them produces no row. The revenue aggregate is left-joined and stays
/// `None` for quarters without monthly revenue.
#[instrument(skip_all, fields(income = income.len(), balance = balance.len()))]
#[must_use]
pub fn historical_profitability(
    income: &FactTable<IncomeStatement>,
    balance: &FactTable<BalanceSheet>,
    revenues: &FactTable<RevenueRecord>,
) -> FactTable<HistoricalProfitability> {
    let revenue_quarters = revenue_by_quarter(revenues);

    let rows = income.iter().filter_map(|income_row| {
        let balance_row = balance.get(income_row.period, &income_row.code)?;
        let mut row = HistoricalProfitability::from_statements(income_row, balance_row);
        row.revenue = revenue_quarters
            .get(&(row.period, row.code.clone()))
            .copied();
        Some(row)
    });
    let table = FactTable::from_rows("historical_profitability", rows);

    debug!(rows = table.len(), "Built historical profitability");
    table
}

impl IntoFrame for HistoricalProfitability {
    const COLUMNS: &'static [&'static str] = &[
        "period",
        "code",
        "basic_eps",
        "non_operating_income",
        "gross_profit",
        "net_income",
        "operating_revenue",
        "common_stock",
        "total_assets",
        "total_equity",
        "gpm",
        "nim",
        "roa",
        "roe",
        "dbr",
        "revenue_sum",
        "revenue_mean",
        "revenue_months",
    ];

    fn into_frame(rows: &[Self]) -> Result<DataFrame> {
        frame(vec![
            date_column("period", rows, |r| r.period)?,
            code_column("code", rows, |r| &r.code),
            f64_column("basic_eps", rows, |r| r.basic_eps),
            f64_column("non_operating_income", rows, |r| r.non_operating_income),
            f64_column("gross_profit", rows, |r| r.gross_profit),
            f64_column("net_income", rows, |r| r.net_income),
            f64_column("operating_revenue", rows, |r| r.operating_revenue),
            f64_column("common_stock", rows, |r| r.common_stock),
            f64_column("total_assets", rows, |r| r.total_assets),
            f64_column("total_equity", rows, |r| r.total_equity),
            f64_column("gpm", rows, |r| r.gpm),
            f64_column("nim", rows, |r| r.nim),
            f64_column("roa", rows, |r| r.roa),
            f64_column("roe", rows, |r| r.roe),
            f64_column("dbr", rows, |r| r.dbr),
            f64_column("revenue_sum", rows, |r| r.revenue.map(|q| q.sum)),
            f64_column("revenue_mean", rows, |r| r.revenue.map(|q| q.mean)),
            i64_column("revenue_months", rows, |r| {
                r.revenue.map(|q| i64::from(q.months))
            }),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn income(period: NaiveDate, code: &str) -> IncomeStatement {
        IncomeStatement {
            basic_eps: Some(1.2),
            gross_profit: Some(40.0),
            net_income: Some(20.0),
            operating_revenue: Some(100.0),
            ..IncomeStatement::new(period, StockCode::new(code))
        }
    }

    #[test]
    fn test_ratios() {
        let q = date(2023, 8, 14);
        let income = FactTable::from_rows("income_sheet", [income(q, "2330")]);
        let balance = FactTable::from_rows(
            "balance_sheet",
            [BalanceSheet::new(q, StockCode::new("2330"), Some(50.0), Some(400.0), Some(250.0))],
        );
        let revenues = FactTable::new("revenue");

        let table = historical_profitability(&income, &balance, &revenues);
        let row = table.get(q, &StockCode::new("2330")).unwrap();

        assert_eq!(row.gpm, Some(40.0));
        assert_eq!(row.nim, Some(20.0));
        assert_eq!(row.roa, Some(5.0));
        assert_eq!(row.roe, Some(8.0));
        assert_eq!(row.dbr, Some(37.5));
        assert_eq!(row.revenue, None);
    }

    #[test]
    fn test_zero_or_missing_assets_yield_missing_ratios() {
        let q = date(2023, 8, 14);
        let income = FactTable::from_rows("income_sheet", [income(q, "1101"), income(q, "2330")]);
        let balance = FactTable::from_rows(
            "balance_sheet",
            [
                BalanceSheet::new(q, StockCode::new("1101"), Some(50.0), Some(0.0), Some(0.0)),
                BalanceSheet::new(q, StockCode::new("2330"), Some(50.0), None, None),
            ],
        );

        let table = historical_profitability(&income, &balance, &FactTable::new("revenue"));
        for row in table.iter() {
            assert_eq!(row.roa, None);
            assert_eq!(row.roe, None);
            assert_eq!(row.dbr, None);
            assert_eq!(row.nim, Some(20.0));
        }
    }

    #[test]
    fn test_income_and_balance_are_inner_joined() {
        let q = date(2023, 8, 14);
        let income = FactTable::from_rows("income_sheet", [income(q, "2330"), income(q, "1101")]);
        let balance = FactTable::from_rows(
            "balance_sheet",
            [
                BalanceSheet::new(q, StockCode::new("2330"), None, Some(1.0), Some(1.0)),
                BalanceSheet::new(q, StockCode::new("2454"), None, Some(1.0), Some(1.0)),
            ],
        );

        let table = historical_profitability(&income, &balance, &FactTable::new("revenue"));
        assert_eq!(table.len(), 1);
        assert!(table.get(q, &StockCode::new("2330")).is_some());
    }

    #[test]
    fn test_revenue_months_map_to_their_quarter() {
        let code = StockCode::new("2330");
        // Published in May-July, reporting April-June: Q2.
        let revenues = FactTable::from_rows(
            "revenue",
            [
                RevenueRecord::new(date(2023, 5, 10), code.clone(), Some(10.0)),
                RevenueRecord::new(date(2023, 6, 10), code.clone(), Some(20.0)),
                RevenueRecord::new(date(2023, 7, 10), code.clone(), Some(30.0)),
                // Reports July: Q3.
                RevenueRecord::new(date(2023, 8, 10), code.clone(), Some(99.0)),
                RevenueRecord::new(date(2023, 9, 10), code.clone(), None),
            ],
        );

        let quarters = revenue_by_quarter(&revenues);
        let q2 = quarters[&(date(2023, 8, 14), code.clone())];
        assert_eq!(q2.sum, 60.0);
        assert_eq!(q2.mean, 20.0);
        assert_eq!(q2.months, 3);

        let q3 = quarters[&(date(2023, 11, 14), code)];
        assert_eq!(q3.months, 1);
    }

    #[test]
    fn test_frame_columns() {
        let q = date(2023, 8, 14);
        let income = FactTable::from_rows("income_sheet", [income(q, "2330")]);
        let balance = FactTable::from_rows(
            "balance_sheet",
            [BalanceSheet::new(q, StockCode::new("2330"), Some(50.0), Some(400.0), Some(250.0))],
        );
        let rows: Vec<_> = historical_profitability(&income, &balance, &FactTable::new("revenue"))
            .iter()
            .cloned()
            .collect();

        let df = HistoricalProfitability::into_frame(&rows).unwrap();
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, HistoricalProfitability::COLUMNS);

        let value = |name: &str| {
            df.column(name)
                .unwrap()
                .as_materialized_series()
                .f64()
                .unwrap()
                .get(0)
        };
        assert_eq!(value("gross_profit"), Some(40.0));
        assert_eq!(value("operating_revenue"), Some(100.0));
    }
}
