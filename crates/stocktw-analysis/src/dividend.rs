//! Consecutive dividend years.
//!
//! A pera row qualifies as a dividend record when its dividend year (ROC
//! calendar) is after year 90 and its yield is positive. Per security the
//! streak counts consecutive qualifying years backwards from last year, and
//! ends at the first missing year.

use chrono::{Datelike, NaiveDate};
use polars::prelude::DataFrame;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

use stocktw_core::{
    FactTable, IntoFrame, PeraRecord, Result, StockCode,
    frame::{code_column, date_column, f64_column, frame, i64_column},
    roc_year,
};

/// Dividend years at or before this ROC year are treated as placeholders.
pub const MIN_DIVIDEND_YEAR: i32 = 90;

/// Latest pera snapshot of one security with its dividend streak.
#[derive(Clone, Debug, PartialEq)]
pub struct DividendStreak {
    /// Trading day of the snapshot.
    pub period: NaiveDate,
    /// Security code.
    pub code: StockCode,
    /// Price-to-earnings ratio.
    pub per: Option<f64>,
    /// Price-to-book ratio.
    pub pbr: Option<f64>,
    /// Dividend yield in percent.
    pub dividend_yield: Option<f64>,
    /// Dividend fiscal year (ROC).
    pub dividend_year: Option<i32>,
    /// Consecutive dividend years ending last year.
    pub streak: u32,
}

/// Reduces pera history to the last trading-day row of each calendar year.
#[must_use]
pub fn year_end_peras(peras: &FactTable<PeraRecord>) -> FactTable<PeraRecord> {
    let mut latest: BTreeMap<(i32, &StockCode), &PeraRecord> = BTreeMap::new();
    // Rows iterate in period order, so later rows overwrite earlier ones.
    for row in peras.iter() {
        latest.insert((row.period.year(), &row.code), row);
    }
    FactTable::from_rows("pera_year_end", latest.into_values().cloned())
}

/// Counts consecutive dividend years per security.
///
/// Counting starts at `current_roc_year - 1` and moves backwards while the
/// security has a qualifying record for the year. Securities without any
/// qualifying record are absent from the result.
#[must_use]
pub fn dividend_streaks(
    peras: &FactTable<PeraRecord>,
    current_roc_year: i32,
) -> BTreeMap<StockCode, u32> {
    let years = peras
        .iter()
        .filter(|row| {
            row.dividend_year.is_some_and(|y| y > MIN_DIVIDEND_YEAR)
                && row.dividend_yield.is_some_and(|y| y > 0.0)
        })
        .fold(
            BTreeMap::<&StockCode, BTreeSet<i32>>::new(),
            |mut acc, row| {
                if let Some(year) = row.dividend_year {
                    acc.entry(&row.code).or_default().insert(year);
                }
                acc
            },
        );

    years
        .into_iter()
        .map(|(code, years)| {
            let streak = (MIN_DIVIDEND_YEAR + 1..current_roc_year)
                .rev()
                .take_while(|year| years.contains(year))
                .count() as u32;
            (code.clone(), streak)
        })
        .collect()
}

/// Attaches dividend streaks to the latest pera snapshot.
///
/// The anchor is the set of rows at the latest pera period; `as_of`
/// determines the current ROC year.
///
/// # Errors
/// Returns [`DataError::EmptyTable`](stocktw_core::DataError::EmptyTable) if
/// there is no pera data.
#[instrument(skip(peras), fields(rows = peras.len()))]
pub fn analyze_dividends(
    peras: &FactTable<PeraRecord>,
    as_of: NaiveDate,
) -> Result<Vec<DividendStreak>> {
    let latest = peras.require_latest_period()?;
    let streaks = dividend_streaks(&year_end_peras(peras), roc_year(as_of));

    let rows: Vec<_> = peras
        .at(latest)
        .map(|row| DividendStreak {
            period: row.period,
            code: row.code.clone(),
            per: row.per,
            pbr: row.pbr,
            dividend_yield: row.dividend_yield,
            dividend_year: row.dividend_year,
            streak: streaks.get(&row.code).copied().unwrap_or(0),
        })
        .collect();

    debug!(period = %latest, rows = rows.len(), "Analyzed dividend streaks");
    Ok(rows)
}

impl IntoFrame for DividendStreak {
    const COLUMNS: &'static [&'static str] = &[
        "period",
        "code",
        "per",
        "pbr",
        "dividend_yield",
        "dividend_year",
        "dividend_streak",
    ];

    fn into_frame(rows: &[Self]) -> Result<DataFrame> {
        frame(vec![
            date_column("period", rows, |r| r.period)?,
            code_column("code", rows, |r| &r.code),
            f64_column("per", rows, |r| r.per),
            f64_column("pbr", rows, |r| r.pbr),
            f64_column("dividend_yield", rows, |r| r.dividend_yield),
            i64_column("dividend_year", rows, |r| r.dividend_year.map(i64::from)),
            i64_column("dividend_streak", rows, |r| Some(i64::from(r.streak))),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn pera(period: NaiveDate, code: &str, yield_pct: f64, year: i32) -> PeraRecord {
        PeraRecord::new(period, StockCode::new(code)).with_dividend(yield_pct, year)
    }

    #[test]
    fn test_streak_stops_at_first_gap() {
        let peras = FactTable::from_rows(
            "pera",
            [111, 110, 109, 107]
                .into_iter()
                .map(|y| pera(date(y + 1911, 12, 31), "2330", 2.5, y)),
        );

        let streaks = dividend_streaks(&peras, 112);
        assert_eq!(streaks[&StockCode::new("2330")], 3);
    }

    #[test]
    fn test_streak_stops_at_first_qualifying_year() {
        let peras = FactTable::from_rows(
            "pera",
            (MIN_DIVIDEND_YEAR + 1..=111).map(|y| pera(date(y + 1911, 12, 31), "2330", 1.5, y)),
        );

        let streaks = dividend_streaks(&peras, 112);
        assert_eq!(streaks[&StockCode::new("2330")], 21);
    }

    #[test]
    fn test_streak_requires_last_year() {
        let peras = FactTable::from_rows(
            "pera",
            [
                pera(date(2021, 12, 31), "1101", 3.0, 110),
                pera(date(2020, 12, 31), "1101", 3.0, 109),
            ],
        );

        let streaks = dividend_streaks(&peras, 112);
        assert_eq!(streaks[&StockCode::new("1101")], 0);
    }

    #[test]
    fn test_non_qualifying_rows_are_ignored() {
        let peras = FactTable::from_rows(
            "pera",
            [
                pera(date(2022, 12, 31), "2330", 0.0, 111),
                pera(date(2022, 12, 31), "1101", 1.0, 90),
            ],
        );

        assert!(dividend_streaks(&peras, 112).is_empty());
    }

    #[test]
    fn test_year_end_keeps_last_trading_day() {
        let peras = FactTable::from_rows(
            "pera",
            [
                pera(date(2022, 6, 1), "2330", 1.0, 110),
                pera(date(2022, 12, 30), "2330", 2.0, 111),
                pera(date(2023, 3, 1), "2330", 3.0, 111),
            ],
        );

        let reduced = year_end_peras(&peras);
        assert_eq!(reduced.len(), 2);
        let row = reduced.get(date(2022, 12, 30), &StockCode::new("2330")).unwrap();
        assert_eq!(row.dividend_yield, Some(2.0));
    }

    #[test]
    fn test_analysis_is_anchored_at_latest_period() {
        let peras = FactTable::from_rows(
            "pera",
            [
                pera(date(2022, 12, 30), "2330", 2.0, 111),
                pera(date(2023, 8, 1), "2330", 1.8, 111),
                pera(date(2023, 8, 1), "9999", 0.0, 111),
                pera(date(2023, 7, 31), "1101", 4.0, 111),
            ],
        );

        let rows = analyze_dividends(&peras, date(2023, 8, 2)).unwrap();
        let codes: Vec<_> = rows.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["2330", "9999"]);
        assert_eq!(rows[0].streak, 1);
        assert_eq!(rows[1].streak, 0);
    }

    #[test]
    fn test_repeated_analysis_is_identical() {
        let peras = FactTable::from_rows("pera", [pera(date(2023, 8, 1), "2330", 1.8, 111)]);
        let as_of = date(2023, 8, 2);

        let first = analyze_dividends(&peras, as_of).unwrap();
        let second = analyze_dividends(&peras, as_of).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_pera_table() {
        let peras: FactTable<PeraRecord> = FactTable::new("pera");
        assert!(analyze_dividends(&peras, date(2023, 8, 2)).is_err());
    }
}
