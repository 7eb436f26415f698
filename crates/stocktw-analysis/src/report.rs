//! One analysis run over a snapshot.

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use stocktw_core::{FactTable, FiscalQuarter, IntoFrame, Result, Snapshot};

use crate::{
    base::{BaseOverview, analyze_base},
    composer::{ProfitAnalysis, analyze_profit},
    dividend::{DividendStreak, analyze_dividends},
    price::{DailyPrice, analyze_prices},
    profitability::{HistoricalProfitability, historical_profitability},
    revenue::{RevenueTrend, analyze_revenue},
};

/// Reference dates of an analysis run.
///
/// Every date except `as_of` defaults to the latest period of its table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Date the run is made on; sets the current ROC year.
    pub as_of: NaiveDate,
    /// Trading day of the price view.
    #[serde(default)]
    pub price_day: Option<NaiveDate>,
    /// Reporting month of the revenue view.
    #[serde(default)]
    pub revenue_month: Option<NaiveDate>,
    /// Target quarter of the profit and base views.
    #[serde(default)]
    pub quarter: Option<FiscalQuarter>,
}

impl AnalysisOptions {
    /// Options using the latest data for every view.
    #[must_use]
    pub const fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            price_day: None,
            revenue_month: None,
            quarter: None,
        }
    }

    /// Sets the trading day of the price view.
    #[must_use]
    pub const fn with_price_day(mut self, day: NaiveDate) -> Self {
        self.price_day = Some(day);
        self
    }

    /// Sets the reporting month of the revenue view.
    #[must_use]
    pub const fn with_revenue_month(mut self, month: NaiveDate) -> Self {
        self.revenue_month = Some(month);
        self
    }

    /// Sets the target quarter.
    #[must_use]
    pub const fn with_quarter(mut self, quarter: FiscalQuarter) -> Self {
        self.quarter = Some(quarter);
        self
    }
}

/// Every derived view of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisReport {
    /// Options the report was computed with.
    pub options: AnalysisOptions,
    /// Daily price view.
    pub prices: Vec<DailyPrice>,
    /// Profitability per quarter.
    pub profitability: FactTable<HistoricalProfitability>,
    /// Revenue trend.
    pub revenue: Vec<RevenueTrend>,
    /// Dividend streaks.
    pub dividends: Vec<DividendStreak>,
    /// Base overview.
    pub base: Vec<BaseOverview>,
    /// Multi-quarter profit analysis.
    pub profit: Vec<ProfitAnalysis>,
}

impl AnalysisReport {
    /// Exports every view as a named data frame.
    ///
    /// # Errors
    /// Propagates frame construction errors.
    pub fn frames(&self) -> Result<Vec<(&'static str, DataFrame)>> {
        let profitability: Vec<_> = self.profitability.iter().cloned().collect();
        Ok(vec![
            ("prices", DailyPrice::into_frame(&self.prices)?),
            (
                "profitability",
                HistoricalProfitability::into_frame(&profitability)?,
            ),
            ("revenue", RevenueTrend::into_frame(&self.revenue)?),
            ("dividends", DividendStreak::into_frame(&self.dividends)?),
            ("base", BaseOverview::into_frame(&self.base)?),
            ("profit", ProfitAnalysis::into_frame(&self.profit)?),
        ])
    }
}

/// Computes every view of a snapshot.
///
/// Reference dates left unset in `options` default to the end of the
/// matching [`SnapshotRanges`](stocktw_core::SnapshotRanges) entry; the
/// profit analysis defaults to its own latest quarter.
///
/// Views are computed once each, in dependency order: prices, profitability,
/// revenue and dividends first, then the base overview and the profit
/// analysis built on them.
///
/// # Errors
/// Propagates the first view error, such as an empty table or a missing
/// reference period.
#[instrument(skip(snapshot), fields(as_of = %options.as_of))]
pub fn run(snapshot: &Snapshot, options: AnalysisOptions) -> Result<AnalysisReport> {
    let statements = snapshot.statements();
    let ranges = snapshot.ranges();
    let price_day = options.price_day.or(ranges.price.map(|r| r.max));
    let revenue_month = options.revenue_month.or(ranges.revenue.map(|r| r.max));
    let base_quarter = match (options.quarter, ranges.statement) {
        (Some(quarter), _) => Some(quarter),
        (None, Some(range)) => Some(FiscalQuarter::from_end_date(range.max)?),
        (None, None) => None,
    };

    let prices = analyze_prices(snapshot.prices(), price_day)?;
    let profitability =
        historical_profitability(&statements.income, &statements.balance, snapshot.revenues());
    let revenue = analyze_revenue(snapshot.revenues(), revenue_month)?;
    let dividends = analyze_dividends(snapshot.peras(), options.as_of)?;
    let base = analyze_base(snapshot, &dividends, &prices, base_quarter)?;
    let profit = analyze_profit(&profitability, &dividends, &prices, options.quarter)?;

    info!(
        prices = prices.len(),
        revenue = revenue.len(),
        dividends = dividends.len(),
        profit = profit.len(),
        "Analysis complete"
    );
    Ok(AnalysisReport {
        options,
        prices,
        profitability,
        revenue,
        dividends,
        base,
        profit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stocktw_core::{
        BalanceSheet, DataError, FinancialStatements, IncomeStatement, PeraRecord, PriceRecord,
        RevenueRecord, SecurityRecord, StockCode,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn snapshot() -> Snapshot {
        let code = StockCode::new("2330");
        let q = date(2023, 8, 14);
        let statements = FinancialStatements {
            income: FactTable::from_rows(
                "income_sheet",
                [IncomeStatement {
                    basic_eps: Some(9.0),
                    net_income: Some(180.0),
                    operating_revenue: Some(480.0),
                    ..IncomeStatement::new(q, code.clone())
                }],
            ),
            balance: FactTable::from_rows(
                "balance_sheet",
                [BalanceSheet::new(q, code.clone(), Some(259.0), Some(5000.0), Some(3000.0))],
            ),
            ..FinancialStatements::default()
        };
        Snapshot::from_rows(
            vec![SecurityRecord::new(code.clone(), "TSMC")],
            vec![PriceRecord {
                close: Some(560.0),
                traded_shares: Some(20_000.0),
                ..PriceRecord::new(date(2023, 8, 18), code.clone())
            }],
            vec![PeraRecord::new(date(2023, 8, 18), code.clone()).with_dividend(2.0, 111)],
            vec![RevenueRecord::new(date(2023, 8, 10), code, Some(160.0))],
            statements,
        )
    }

    #[test]
    fn test_run_computes_every_view() {
        let report = run(&snapshot(), AnalysisOptions::new(date(2023, 8, 20))).unwrap();

        assert_eq!(report.prices.len(), 1);
        assert_eq!(report.profitability.len(), 1);
        assert_eq!(report.revenue.len(), 1);
        assert_eq!(report.dividends[0].streak, 1);
        assert_eq!(report.base[0].name.as_deref(), Some("TSMC"));
        assert_eq!(report.profit[0].eps_sum, Some(9.0));
        assert_eq!(report.profit[0].close, Some(560.0));

        let frames = report.frames().unwrap();
        let names: Vec<_> = frames.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            ["prices", "profitability", "revenue", "dividends", "base", "profit"]
        );
    }

    #[test]
    fn test_run_is_repeatable() {
        let snapshot = snapshot();
        let options = AnalysisOptions::new(date(2023, 8, 20));
        assert_eq!(run(&snapshot, options).unwrap(), run(&snapshot, options).unwrap());
    }

    #[test]
    fn test_default_dates_come_from_snapshot_ranges() {
        let snapshot = snapshot();
        let ranges = snapshot.ranges();
        assert_eq!(ranges.price.map(|r| r.max), Some(date(2023, 8, 18)));
        assert_eq!(ranges.revenue.map(|r| r.max), Some(date(2023, 8, 10)));
        assert_eq!(ranges.statement.map(|r| r.max), Some(date(2023, 8, 14)));

        let report = run(&snapshot, AnalysisOptions::new(date(2023, 8, 20))).unwrap();
        assert_eq!(report.prices[0].period, date(2023, 8, 18));
        assert_eq!(report.revenue[0].period, date(2023, 8, 10));
        assert_eq!(report.base[0].statement_period, date(2023, 8, 14));
    }

    #[test]
    fn test_explicit_dates_must_exist() {
        let options =
            AnalysisOptions::new(date(2023, 8, 20)).with_revenue_month(date(2023, 7, 10));
        let err = run(&snapshot(), options).unwrap_err();
        assert!(matches!(err, DataError::MissingPeriod { .. }));
    }

    #[test]
    fn test_options_from_json() {
        let json = r#"{"as_of":"2023-08-20","quarter":{"year":2023,"quarter":2}}"#;
        let options: AnalysisOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.quarter, Some(FiscalQuarter::new(2023, 2).unwrap()));
        assert_eq!(options.price_day, None);

        let json = r#"{"as_of":"2023-08-20","quarter":{"year":2023,"quarter":9}}"#;
        assert!(serde_json::from_str::<AnalysisOptions>(json).is_err());
    }
}
