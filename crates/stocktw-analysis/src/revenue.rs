//! Month-over-month and year-over-year revenue trends.

use chrono::{Months, NaiveDate};
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use stocktw_core::{
    FactTable, IntoFrame, Result, RevenueRecord, StockCode,
    frame::{bool_column, code_column, date_column, f64_column, frame},
};

use crate::ratio::{pct_change, rising_twice};

/// Revenue of one security in the reference month, compared with earlier months.
#[derive(Clone, Debug, PartialEq)]
pub struct RevenueTrend {
    /// Reporting month of the reference snapshot.
    pub period: NaiveDate,
    /// Security code.
    pub code: StockCode,
    /// Revenue of the reference month.
    pub revenue: Option<f64>,
    /// Cumulative revenue of the year so far.
    pub cumulative_revenue: Option<f64>,
    /// Cumulative revenue at the same point last year.
    pub last_year_cumulative_revenue: Option<f64>,
    /// Revenue one month earlier.
    pub month_ago: Option<f64>,
    /// Revenue two months earlier.
    pub two_months_ago: Option<f64>,
    /// Revenue twelve months earlier.
    pub year_ago: Option<f64>,
    /// Year-over-year change in percent.
    pub yoy: Option<f64>,
    /// Month-over-month change in percent.
    pub mom: Option<f64>,
    /// Revenue rose in each of the last two months.
    pub momentum: bool,
}

fn months_before(period: NaiveDate, months: u32) -> Option<NaiveDate> {
    period.checked_sub_months(Months::new(months))
}

fn revenue_at(
    revenues: &FactTable<RevenueRecord>,
    period: Option<NaiveDate>,
) -> BTreeMap<StockCode, Option<f64>> {
    period
        .map(|p| {
            revenues
                .at(p)
                .map(|row| (row.code.clone(), row.revenue))
                .collect()
        })
        .unwrap_or_default()
}

/// Compares the reference month's revenue with one, two and twelve months
/// earlier.
///
/// `reference` defaults to the latest revenue period. The comparison
/// snapshots are left-joined by code, so a security without an earlier row
/// keeps its comparison fields missing.
///
/// # Errors
/// Returns [`DataError::EmptyTable`](stocktw_core::DataError::EmptyTable)
/// when there is no revenue data and
/// [`DataError::MissingPeriod`](stocktw_core::DataError::MissingPeriod) when
/// `reference` has no rows.
#[instrument(skip(revenues), fields(rows = revenues.len()))]
pub fn analyze_revenue(
    revenues: &FactTable<RevenueRecord>,
    reference: Option<NaiveDate>,
) -> Result<Vec<RevenueTrend>> {
    let period = match reference {
        Some(period) => period,
        None => revenues.require_latest_period()?,
    };
    let current = revenues.require(period)?;

    let month_ago = revenue_at(revenues, months_before(period, 1));
    let two_months_ago = revenue_at(revenues, months_before(period, 2));
    let year_ago = revenue_at(revenues, months_before(period, 12));
    let lookup = |map: &BTreeMap<StockCode, Option<f64>>, code: &StockCode| {
        map.get(code).copied().flatten()
    };

    let rows: Vec<_> = current
        .into_iter()
        .map(|(code, row)| {
            let m1 = lookup(&month_ago, &code);
            let m2 = lookup(&two_months_ago, &code);
            let y1 = lookup(&year_ago, &code);
            RevenueTrend {
                period,
                revenue: row.revenue,
                cumulative_revenue: row.cumulative_revenue,
                last_year_cumulative_revenue: row.last_year_cumulative_revenue,
                month_ago: m1,
                two_months_ago: m2,
                year_ago: y1,
                yoy: pct_change(row.revenue, y1),
                mom: pct_change(row.revenue, m1),
                momentum: rising_twice(row.revenue, m1, m2),
                code,
            }
        })
        .collect();

    debug!(%period, rows = rows.len(), "Analyzed revenue trend");
    Ok(rows)
}

impl IntoFrame for RevenueTrend {
    const COLUMNS: &'static [&'static str] = &[
        "period",
        "code",
        "revenue",
        "yoy",
        "mom",
        "momentum",
        "cumulative_revenue",
        "last_year_cumulative_revenue",
        "revenue_1",
        "revenue_2",
        "revenue_y",
    ];

    fn into_frame(rows: &[Self]) -> Result<DataFrame> {
        frame(vec![
            date_column("period", rows, |r| r.period)?,
            code_column("code", rows, |r| &r.code),
            f64_column("revenue", rows, |r| r.revenue),
            f64_column("yoy", rows, |r| r.yoy),
            f64_column("mom", rows, |r| r.mom),
            bool_column("momentum", rows, |r| r.momentum),
            f64_column("cumulative_revenue", rows, |r| r.cumulative_revenue),
            f64_column("last_year_cumulative_revenue", rows, |r| {
                r.last_year_cumulative_revenue
            }),
            f64_column("revenue_1", rows, |r| r.month_ago),
            f64_column("revenue_2", rows, |r| r.two_months_ago),
            f64_column("revenue_y", rows, |r| r.year_ago),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stocktw_core::DataError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn revenue(period: NaiveDate, code: &str, value: f64) -> RevenueRecord {
        RevenueRecord::new(period, StockCode::new(code), Some(value))
    }

    fn sample() -> FactTable<RevenueRecord> {
        FactTable::from_rows(
            "revenue",
            [
                revenue(date(2023, 6, 10), "2330", 120.0),
                revenue(date(2023, 5, 10), "2330", 100.0),
                revenue(date(2023, 4, 10), "2330", 80.0),
                revenue(date(2022, 6, 10), "2330", 90.0),
                revenue(date(2023, 6, 10), "1101", 50.0),
            ],
        )
    }

    #[test]
    fn test_trend_against_earlier_months() {
        let rows = analyze_revenue(&sample(), None).unwrap();
        let row = rows.iter().find(|r| r.code.as_str() == "2330").unwrap();

        assert_eq!(row.period, date(2023, 6, 10));
        assert_eq!(row.mom, Some(20.0));
        assert!((row.yoy.unwrap() - 33.333_333).abs() < 1e-4);
        assert!(row.momentum);
    }

    #[test]
    fn test_missing_comparisons_stay_missing() {
        let rows = analyze_revenue(&sample(), Some(date(2023, 6, 10))).unwrap();
        let row = rows.iter().find(|r| r.code.as_str() == "1101").unwrap();

        assert_eq!(row.revenue, Some(50.0));
        assert_eq!(row.month_ago, None);
        assert_eq!(row.yoy, None);
        assert_eq!(row.mom, None);
        assert!(!row.momentum);
    }

    #[test]
    fn test_reference_without_rows() {
        let err = analyze_revenue(&sample(), Some(date(2024, 1, 10))).unwrap_err();
        assert!(matches!(err, DataError::MissingPeriod { .. }));
    }

    #[test]
    fn test_frame_columns() {
        let rows = analyze_revenue(&sample(), None).unwrap();
        let df = RevenueTrend::into_frame(&rows).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), RevenueTrend::COLUMNS.len());
    }
}
