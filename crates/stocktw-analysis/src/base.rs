//! Overview of each security: valuation, price activity and capital structure.

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use stocktw_core::{
    FiscalQuarter, IntoFrame, Result, Snapshot, StockCode,
    frame::{code_column, date_column, f64_column, frame, i64_column, str_column},
};

use crate::{
    dividend::DividendStreak,
    price::{DailyPrice, TradingActivity},
    ratio::percent,
};

/// One row of the base overview.
#[derive(Clone, Debug, PartialEq)]
pub struct BaseOverview {
    /// Security code.
    pub code: StockCode,
    /// Security name.
    pub name: Option<String>,
    /// Industry group.
    pub group: Option<String>,
    /// Closing price.
    pub close: Option<f64>,
    /// Price change in percent.
    pub change_pct: Option<f64>,
    /// Average trading activity.
    pub activity: TradingActivity,
    /// Price-to-earnings ratio.
    pub per: Option<f64>,
    /// Price-to-book ratio.
    pub pbr: Option<f64>,
    /// Dividend yield in percent.
    pub dividend_yield: Option<f64>,
    /// Dividend year (ROC).
    pub dividend_year: Option<i32>,
    /// Consecutive dividend years.
    pub dividend_streak: u32,
    /// Quarter end of the balance sheet columns.
    pub statement_period: NaiveDate,
    /// Common stock.
    pub common_stock: Option<f64>,
    /// Total assets.
    pub total_assets: Option<f64>,
    /// Total equity.
    pub total_equity: Option<f64>,
    /// Total equity over total assets, in percent.
    pub equity_ratio: Option<f64>,
}

/// Builds the base overview anchored on the dividend view.
///
/// Prices, the balance sheet at the quarter end and security reference data
/// are left-joined by code. `quarter` defaults to the latest balance-sheet
/// period.
///
/// # Errors
/// Returns an error when `quarter` is `None` and the balance sheet is empty
/// or its latest period is not a quarter end.
#[instrument(skip_all, fields(dividends = dividends.len(), prices = prices.len()))]
pub fn analyze_base(
    snapshot: &Snapshot,
    dividends: &[DividendStreak],
    prices: &[DailyPrice],
    quarter: Option<FiscalQuarter>,
) -> Result<Vec<BaseOverview>> {
    let balance = &snapshot.statements().balance;
    let quarter = match quarter {
        Some(quarter) => quarter,
        None => FiscalQuarter::from_end_date(balance.require_latest_period()?)?,
    };
    let statement_period = quarter.end_date();
    let balance = balance.snapshot(statement_period);
    let prices: BTreeMap<&StockCode, &DailyPrice> = prices.iter().map(|p| (&p.code, p)).collect();
    let securities = snapshot.securities();

    let rows: Vec<_> = dividends
        .iter()
        .map(|dividend| {
            let price = prices.get(&dividend.code);
            let sheet = balance.get(&dividend.code);
            let security = securities.get(&dividend.code);
            let total_assets = sheet.and_then(|b| b.total_assets);
            let total_equity = sheet.and_then(|b| b.total_equity);
            BaseOverview {
                code: dividend.code.clone(),
                name: security.map(|s| s.name.clone()),
                group: security.map(|s| s.group.clone()),
                close: price.and_then(|p| p.close),
                change_pct: price.and_then(|p| p.change_pct),
                activity: price.map(|p| p.activity).unwrap_or_default(),
                per: dividend.per,
                pbr: dividend.pbr,
                dividend_yield: dividend.dividend_yield,
                dividend_year: dividend.dividend_year,
                dividend_streak: dividend.streak,
                statement_period,
                common_stock: sheet.and_then(|b| b.common_stock),
                total_assets,
                total_equity,
                equity_ratio: percent(total_equity, total_assets),
            }
        })
        .collect();

    debug!(%quarter, rows = rows.len(), "Analyzed base overview");
    Ok(rows)
}

impl IntoFrame for BaseOverview {
    const COLUMNS: &'static [&'static str] = &[
        "code",
        "name",
        "group",
        "close",
        "change_pct",
        "avg_traded_shares",
        "avg_transactions",
        "avg_traded_amount",
        "per",
        "pbr",
        "dividend_yield",
        "dividend_year",
        "dividend_streak",
        "statement_period",
        "common_stock",
        "total_assets",
        "total_equity",
        "equity_ratio",
    ];

    fn into_frame(rows: &[Self]) -> Result<DataFrame> {
        frame(vec![
            code_column("code", rows, |r| &r.code),
            str_column("name", rows, |r| r.name.as_deref()),
            str_column("group", rows, |r| r.group.as_deref()),
            f64_column("close", rows, |r| r.close),
            f64_column("change_pct", rows, |r| r.change_pct),
            i64_column("avg_traded_shares", rows, |r| r.activity.shares),
            i64_column("avg_transactions", rows, |r| r.activity.transactions),
            i64_column("avg_traded_amount", rows, |r| r.activity.amount),
            f64_column("per", rows, |r| r.per),
            f64_column("pbr", rows, |r| r.pbr),
            f64_column("dividend_yield", rows, |r| r.dividend_yield),
            i64_column("dividend_year", rows, |r| r.dividend_year.map(i64::from)),
            i64_column("dividend_streak", rows, |r| Some(i64::from(r.dividend_streak))),
            date_column("statement_period", rows, |r| r.statement_period)?,
            f64_column("common_stock", rows, |r| r.common_stock),
            f64_column("total_assets", rows, |r| r.total_assets),
            f64_column("total_equity", rows, |r| r.total_equity),
            f64_column("equity_ratio", rows, |r| r.equity_ratio),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stocktw_core::{BalanceSheet, FactTable, FinancialStatements, SecurityRecord};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn snapshot() -> Snapshot {
        let q = date(2023, 8, 14);
        let statements = FinancialStatements {
            balance: FactTable::from_rows(
                "balance_sheet",
                [BalanceSheet::new(q, StockCode::new("2330"), Some(40.0), Some(400.0), Some(250.0))],
            ),
            ..FinancialStatements::default()
        };
        Snapshot::from_rows(
            vec![SecurityRecord::new(StockCode::new("2330"), "TSMC").with_group("Semiconductor")],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            statements,
        )
    }

    fn dividend(code: &str) -> DividendStreak {
        DividendStreak {
            period: date(2023, 8, 18),
            code: StockCode::new(code),
            per: Some(15.0),
            pbr: None,
            dividend_yield: Some(2.0),
            dividend_year: Some(111),
            streak: 4,
        }
    }

    #[test]
    fn test_left_joins_onto_dividends() {
        let prices = vec![DailyPrice {
            period: date(2023, 8, 18),
            code: StockCode::new("2330"),
            close: Some(560.0),
            change: None,
            change_pct: Some(-0.5),
            traded_shares: Some(1000.0),
            activity: TradingActivity {
                shares: Some(900),
                transactions: Some(30),
                amount: Some(504_000),
            },
        }];

        let rows = analyze_base(&snapshot(), &[dividend("2330"), dividend("9999")], &prices, None)
            .unwrap();
        assert_eq!(rows.len(), 2);

        let tsmc = &rows[0];
        assert_eq!(tsmc.name.as_deref(), Some("TSMC"));
        assert_eq!(tsmc.group.as_deref(), Some("Semiconductor"));
        assert_eq!(tsmc.close, Some(560.0));
        assert_eq!(tsmc.activity.shares, Some(900));
        assert_eq!(tsmc.equity_ratio, Some(62.5));
        assert_eq!(tsmc.statement_period, date(2023, 8, 14));

        let unknown = &rows[1];
        assert_eq!(unknown.name, None);
        assert_eq!(unknown.close, None);
        assert_eq!(unknown.equity_ratio, None);
        assert_eq!(unknown.dividend_streak, 4);
    }

    #[test]
    fn test_empty_balance_sheet_without_quarter() {
        let empty = Snapshot::from_rows(
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            FinancialStatements::default(),
        );
        assert!(analyze_base(&empty, &[dividend("2330")], &[], None).is_err());

        let quarter = FiscalQuarter::new(2023, 2).unwrap();
        let rows = analyze_base(&empty, &[dividend("2330")], &[], Some(quarter)).unwrap();
        assert_eq!(rows[0].total_assets, None);
    }

    #[test]
    fn test_frame_columns() {
        let rows = analyze_base(&snapshot(), &[dividend("2330")], &[], None).unwrap();
        let df = BaseOverview::into_frame(&rows).unwrap();
        assert_eq!(df.width(), BaseOverview::COLUMNS.len());
    }
}
