//! Multi-quarter EPS and profit analysis.
//!
//! The target quarter `q0` and the four quarters before it (`q1` to `q4`)
//! are laid side by side per security. The dividend view and the current
//! quarter are full-outer joined on code, so a security present in either
//! of them gets a row; earlier quarters and the daily price are attached by
//! left join.
//!
//! Trailing figures sum the last four quarters and skip missing values:
//!
//! ```text
//! E(Sum) = E(0) + E(1) + E(2) + E(3)
//! (C)EPS = net income / common stock * 10
//! (C)PER = close / ((C)EPS * 4)
//! YoY    = (NI0 - NI4) / NI4 * 100
//! QoQ    = (NI0 - NI1) / NI1 * 100
//! ```

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

use stocktw_core::{
    FactTable, FiscalQuarter, IntoFrame, Result, StockCode,
    frame::{bool_column, code_column, date_column, f64_column, frame, i64_column},
};

use crate::{
    dividend::DividendStreak,
    price::DailyPrice,
    profitability::{HistoricalProfitability, RevenueQuarter},
    ratio::{
        diff, mean_present, pct_change, percent, quotient, rising_twice, std_present, sum_present,
    },
};

/// Number of quarters compared: the target quarter and four before it.
pub const QUARTERS: usize = 5;

/// Profit analysis of one security for the target quarter.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfitAnalysis {
    /// End date of the target quarter.
    pub period: NaiveDate,
    /// Security code.
    pub code: StockCode,

    /// Price-to-earnings ratio from the dividend view.
    pub per: Option<f64>,
    /// Price-to-book ratio from the dividend view.
    pub pbr: Option<f64>,
    /// Dividend yield in percent.
    pub dividend_yield: Option<f64>,
    /// Dividend year (ROC).
    pub dividend_year: Option<i32>,
    /// Consecutive dividend years, missing when absent from the dividend view.
    pub dividend_streak: Option<u32>,

    /// Closing price on the analysis day.
    pub close: Option<f64>,
    /// Price change in percent on the analysis day.
    pub change_pct: Option<f64>,

    /// Basic EPS of `q0..=q4`.
    pub eps_by_quarter: [Option<f64>; QUARTERS],
    /// Sum of the last four quarters' EPS.
    pub eps_sum: Option<f64>,
    /// Mean of the last four quarters' EPS.
    pub eps_avg: Option<f64>,
    /// Population standard deviation of the last four quarters' EPS.
    pub eps_std: Option<f64>,
    /// Trailing EPS; equal to `eps_sum`.
    pub eps: Option<f64>,
    /// EPS computed from net income and common stock.
    pub computed_eps: Option<f64>,
    /// P/E computed from the closing price and the annualized computed EPS.
    pub computed_per: Option<f64>,

    /// Non-operating income over net income of `q0..=q3`, in percent.
    pub non_operating_ratio: [Option<f64>; 4],

    /// Trailing gross profit margin.
    pub gpm: Option<f64>,
    /// Trailing net income margin.
    pub nim: Option<f64>,
    /// Trailing return on assets.
    pub roa: Option<f64>,
    /// Trailing return on equity.
    pub roe: Option<f64>,
    /// Trailing debt-to-asset ratio.
    pub dbr: Option<f64>,

    /// `E(0) - E(1)`.
    pub eps_delta: Option<f64>,
    /// GPM change against the previous quarter.
    pub gpm_delta: Option<f64>,
    /// NIM change against the previous quarter.
    pub nim_delta: Option<f64>,
    /// ROA change against the previous quarter.
    pub roa_delta: Option<f64>,
    /// ROE change against the previous quarter.
    pub roe_delta: Option<f64>,
    /// DBR change against the previous quarter.
    pub dbr_delta: Option<f64>,
    /// Common stock change against the previous quarter.
    pub capital_delta: Option<f64>,
    /// Total assets change against the previous quarter.
    pub assets_delta: Option<f64>,
    /// Total equity change against the previous quarter.
    pub equity_delta: Option<f64>,

    /// Net income of the target quarter.
    pub net_income: Option<f64>,
    /// Net income change against the same quarter last year, in percent.
    pub yoy: Option<f64>,
    /// Net income change against the previous quarter, in percent.
    pub qoq: Option<f64>,
    /// Net income rose in each of the last two quarters.
    pub is_q3: bool,
    /// EPS change against the same quarter last year, in percent of the
    /// current EPS.
    pub yoe: Option<f64>,
    /// EPS change against the previous quarter, in percent.
    pub qoe: Option<f64>,
    /// EPS rose in each of the last two quarters.
    pub is_e3: bool,

    /// Monthly revenue aggregated onto the target quarter.
    pub revenue: Option<RevenueQuarter>,
}

/// Profitability of one security across `q0..=q4`.
type QuarterRow<'a> = [Option<&'a HistoricalProfitability>; QUARTERS];

fn field<F>(quarters: &QuarterRow<'_>, k: usize, f: F) -> Option<f64>
where
    F: Fn(&HistoricalProfitability) -> Option<f64>,
{
    quarters[k].and_then(f)
}

fn trailing<F>(quarters: &QuarterRow<'_>, f: F) -> Option<f64>
where
    F: Fn(&HistoricalProfitability) -> Option<f64> + Copy,
{
    let values: Vec<_> = (0..4).map(|k| field(quarters, k, f)).collect();
    sum_present(&values)
}

fn delta<F>(quarters: &QuarterRow<'_>, f: F) -> Option<f64>
where
    F: Fn(&HistoricalProfitability) -> Option<f64> + Copy,
{
    diff(field(quarters, 0, f), field(quarters, 1, f))
}

impl ProfitAnalysis {
    fn compose(
        period: NaiveDate,
        code: StockCode,
        dividend: Option<&DividendStreak>,
        price: Option<&DailyPrice>,
        quarters: &QuarterRow<'_>,
    ) -> Self {
        let eps: [Option<f64>; QUARTERS] =
            std::array::from_fn(|k| field(quarters, k, |p| p.basic_eps));
        let ni: [Option<f64>; QUARTERS] =
            std::array::from_fn(|k| field(quarters, k, |p| p.net_income));
        let trailing_eps = &eps[..4];

        let current = quarters[0];
        let computed_eps =
            quotient(ni[0], current.and_then(|p| p.common_stock)).map(|q| q * 10.0);
        let close = price.and_then(|p| p.close);

        Self {
            period,
            code,
            per: dividend.and_then(|d| d.per),
            pbr: dividend.and_then(|d| d.pbr),
            dividend_yield: dividend.and_then(|d| d.dividend_yield),
            dividend_year: dividend.and_then(|d| d.dividend_year),
            dividend_streak: dividend.map(|d| d.streak),
            close,
            change_pct: price.and_then(|p| p.change_pct),
            eps_by_quarter: eps,
            eps_sum: sum_present(trailing_eps),
            eps_avg: mean_present(trailing_eps),
            eps_std: std_present(trailing_eps),
            eps: sum_present(trailing_eps),
            computed_eps,
            computed_per: quotient(close, computed_eps.map(|e| e * 4.0)),
            non_operating_ratio: std::array::from_fn(|k| {
                percent(field(quarters, k, |p| p.non_operating_income), ni[k])
            }),
            gpm: trailing(quarters, |p| p.gpm),
            nim: trailing(quarters, |p| p.nim),
            roa: trailing(quarters, |p| p.roa),
            roe: trailing(quarters, |p| p.roe),
            dbr: trailing(quarters, |p| p.dbr),
            eps_delta: diff(eps[0], eps[1]),
            gpm_delta: delta(quarters, |p| p.gpm),
            nim_delta: delta(quarters, |p| p.nim),
            roa_delta: delta(quarters, |p| p.roa),
            roe_delta: delta(quarters, |p| p.roe),
            dbr_delta: delta(quarters, |p| p.dbr),
            capital_delta: delta(quarters, |p| p.common_stock),
            assets_delta: delta(quarters, |p| p.total_assets),
            equity_delta: delta(quarters, |p| p.total_equity),
            net_income: ni[0],
            yoy: pct_change(ni[0], ni[4]),
            qoq: pct_change(ni[0], ni[1]),
            is_q3: rising_twice(ni[0], ni[1], ni[2]),
            yoe: percent(diff(eps[0], eps[4]), eps[0]),
            qoe: pct_change(eps[0], eps[1]),
            is_e3: rising_twice(eps[0], eps[1], eps[2]),
            revenue: current.and_then(|p| p.revenue),
        }
    }
}

/// Resolves the target quarter: the given one, or the latest profitability period.
fn target_quarter(
    profitability: &FactTable<HistoricalProfitability>,
    quarter: Option<FiscalQuarter>,
) -> Result<FiscalQuarter> {
    match quarter {
        Some(quarter) => Ok(quarter),
        None => FiscalQuarter::from_end_date(profitability.require_latest_period()?),
    }
}

/// Composes the multi-quarter profit analysis.
///
/// # Errors
/// - [`DataError::EmptyTable`](stocktw_core::DataError::EmptyTable) when
///   `quarter` is `None` and there is no profitability data.
/// - [`DataError::InvalidPeriod`](stocktw_core::DataError::InvalidPeriod)
///   when the latest profitability period is not a quarter end.
/// - [`DataError::MissingPeriod`](stocktw_core::DataError::MissingPeriod)
///   when the target quarter has no rows.
#[instrument(
    skip(profitability, dividends, prices),
    fields(profitability = profitability.len(), dividends = dividends.len())
)]
pub fn analyze_profit(
    profitability: &FactTable<HistoricalProfitability>,
    dividends: &[DividendStreak],
    prices: &[DailyPrice],
    quarter: Option<FiscalQuarter>,
) -> Result<Vec<ProfitAnalysis>> {
    let target = target_quarter(profitability, quarter)?;
    let period = target.end_date();
    let current = profitability.require(period)?;

    let mut quarter_ends = [period; QUARTERS];
    let mut cursor = target;
    for end in quarter_ends.iter_mut().skip(1) {
        cursor = cursor.previous();
        *end = cursor.end_date();
    }
    let snapshots: Vec<BTreeMap<StockCode, &HistoricalProfitability>> = quarter_ends
        .iter()
        .skip(1)
        .map(|end| profitability.snapshot(*end))
        .collect();

    let dividends: BTreeMap<&StockCode, &DividendStreak> =
        dividends.iter().map(|d| (&d.code, d)).collect();
    let prices: BTreeMap<&StockCode, &DailyPrice> = prices.iter().map(|p| (&p.code, p)).collect();

    let codes: BTreeSet<&StockCode> = dividends.keys().copied().chain(current.keys()).collect();

    let rows: Vec<_> = codes
        .into_iter()
        .map(|code| {
            let mut quarters: QuarterRow<'_> = [None; QUARTERS];
            quarters[0] = current.get(code).copied();
            for (slot, snapshot) in quarters.iter_mut().skip(1).zip(&snapshots) {
                *slot = snapshot.get(code).copied();
            }
            ProfitAnalysis::compose(
                period,
                code.clone(),
                dividends.get(code).copied(),
                prices.get(code).copied(),
                &quarters,
            )
        })
        .collect();

    debug!(quarter = %target, rows = rows.len(), "Analyzed profit");
    Ok(rows)
}

impl IntoFrame for ProfitAnalysis {
    const COLUMNS: &'static [&'static str] = &[
        "period",
        "code",
        "per",
        "pbr",
        "dividend_yield",
        "dividend_year",
        "dividend_streak",
        "close",
        "change_pct",
        "e0",
        "e1",
        "e2",
        "e3",
        "e4",
        "e_sum",
        "e_avg",
        "e_std",
        "eps",
        "c_eps",
        "c_per",
        "non_operating_0",
        "non_operating_1",
        "non_operating_2",
        "non_operating_3",
        "gpm",
        "nim",
        "roa",
        "roe",
        "dbr",
        "eps_delta",
        "gpm_delta",
        "nim_delta",
        "roa_delta",
        "roe_delta",
        "dbr_delta",
        "capital_delta",
        "assets_delta",
        "equity_delta",
        "net_income",
        "yoy",
        "qoq",
        "is_q3",
        "yoe",
        "qoe",
        "is_e3",
        "revenue_sum",
        "revenue_mean",
        "revenue_months",
    ];

    fn into_frame(rows: &[Self]) -> Result<DataFrame> {
        let mut columns = vec![
            date_column("period", rows, |r| r.period)?,
            code_column("code", rows, |r| &r.code),
            f64_column("per", rows, |r| r.per),
            f64_column("pbr", rows, |r| r.pbr),
            f64_column("dividend_yield", rows, |r| r.dividend_yield),
            i64_column("dividend_year", rows, |r| r.dividend_year.map(i64::from)),
            i64_column("dividend_streak", rows, |r| r.dividend_streak.map(i64::from)),
            f64_column("close", rows, |r| r.close),
            f64_column("change_pct", rows, |r| r.change_pct),
        ];
        for (k, name) in ["e0", "e1", "e2", "e3", "e4"].into_iter().enumerate() {
            columns.push(f64_column(name, rows, |r| r.eps_by_quarter[k]));
        }
        columns.extend([
            f64_column("e_sum", rows, |r| r.eps_sum),
            f64_column("e_avg", rows, |r| r.eps_avg),
            f64_column("e_std", rows, |r| r.eps_std),
            f64_column("eps", rows, |r| r.eps),
            f64_column("c_eps", rows, |r| r.computed_eps),
            f64_column("c_per", rows, |r| r.computed_per),
        ]);
        let non_operating = [
            "non_operating_0",
            "non_operating_1",
            "non_operating_2",
            "non_operating_3",
        ];
        for (k, name) in non_operating.into_iter().enumerate() {
            columns.push(f64_column(name, rows, |r| r.non_operating_ratio[k]));
        }
        columns.extend([
            f64_column("gpm", rows, |r| r.gpm),
            f64_column("nim", rows, |r| r.nim),
            f64_column("roa", rows, |r| r.roa),
            f64_column("roe", rows, |r| r.roe),
            f64_column("dbr", rows, |r| r.dbr),
            f64_column("eps_delta", rows, |r| r.eps_delta),
            f64_column("gpm_delta", rows, |r| r.gpm_delta),
            f64_column("nim_delta", rows, |r| r.nim_delta),
            f64_column("roa_delta", rows, |r| r.roa_delta),
            f64_column("roe_delta", rows, |r| r.roe_delta),
            f64_column("dbr_delta", rows, |r| r.dbr_delta),
            f64_column("capital_delta", rows, |r| r.capital_delta),
            f64_column("assets_delta", rows, |r| r.assets_delta),
            f64_column("equity_delta", rows, |r| r.equity_delta),
            f64_column("net_income", rows, |r| r.net_income),
            f64_column("yoy", rows, |r| r.yoy),
            f64_column("qoq", rows, |r| r.qoq),
            bool_column("is_q3", rows, |r| r.is_q3),
            f64_column("yoe", rows, |r| r.yoe),
            f64_column("qoe", rows, |r| r.qoe),
            bool_column("is_e3", rows, |r| r.is_e3),
            f64_column("revenue_sum", rows, |r| r.revenue.map(|q| q.sum)),
            f64_column("revenue_mean", rows, |r| r.revenue.map(|q| q.mean)),
            i64_column("revenue_months", rows, |r| {
                r.revenue.map(|q| i64::from(q.months))
            }),
        ]);
        frame(columns)
    }
}
