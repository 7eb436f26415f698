//! Daily price snapshot with average trading activity.

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use stocktw_core::{
    FactTable, IntoFrame, PriceRecord, Result, StockCode,
    frame::{code_column, date_column, f64_column, frame, i64_column},
};

use crate::ratio::mean_present;

/// Average daily activity over the loaded price window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TradingActivity {
    /// Mean traded shares.
    pub shares: Option<i64>,
    /// Mean number of transactions.
    pub transactions: Option<i64>,
    /// Mean traded amount.
    pub amount: Option<i64>,
}

/// One security's price on the analysis day.
#[derive(Clone, Debug, PartialEq)]
pub struct DailyPrice {
    /// Trading day.
    pub period: NaiveDate,
    /// Security code.
    pub code: StockCode,
    /// Closing price.
    pub close: Option<f64>,
    /// Price change.
    pub change: Option<f64>,
    /// Price change in percent.
    pub change_pct: Option<f64>,
    /// Traded shares on the day.
    pub traded_shares: Option<f64>,
    /// Average activity over the whole window.
    pub activity: TradingActivity,
}

fn truncated_mean(values: &[Option<f64>]) -> Option<i64> {
    // Saturating cast; NaN is excluded by `mean_present`.
    mean_present(values).map(|mean| mean.trunc() as i64)
}

/// Averages trading activity per security over every loaded day.
#[must_use]
pub fn trading_activity(prices: &FactTable<PriceRecord>) -> BTreeMap<StockCode, TradingActivity> {
    prices
        .by_code()
        .into_iter()
        .map(|(code, rows)| {
            let column = |f: fn(&PriceRecord) -> Option<f64>| -> Vec<Option<f64>> {
                rows.iter().map(|row| f(row)).collect()
            };
            let activity = TradingActivity {
                shares: truncated_mean(&column(|r| r.traded_shares)),
                transactions: truncated_mean(&column(|r| r.transactions)),
                amount: truncated_mean(&column(|r| r.traded_amount)),
            };
            (code.clone(), activity)
        })
        .collect()
}

/// Builds the price view of one trading day.
///
/// `day` defaults to the latest trading day. Each row carries the security's
/// average activity across the whole loaded window.
///
/// # Errors
/// Returns [`DataError::EmptyTable`](stocktw_core::DataError::EmptyTable)
/// when there are no prices and
/// [`DataError::MissingPeriod`](stocktw_core::DataError::MissingPeriod) when
/// `day` has no rows.
#[instrument(skip(prices), fields(rows = prices.len()))]
pub fn analyze_prices(
    prices: &FactTable<PriceRecord>,
    day: Option<NaiveDate>,
) -> Result<Vec<DailyPrice>> {
    let day = match day {
        Some(day) => day,
        None => prices.require_latest_period()?,
    };
    let anchor = prices.require(day)?;
    let activity = trading_activity(prices);

    let rows: Vec<_> = anchor
        .into_iter()
        .map(|(code, row)| DailyPrice {
            period: row.period,
            close: row.close,
            change: row.change,
            change_pct: row.change_pct,
            traded_shares: row.traded_shares,
            activity: activity.get(&code).copied().unwrap_or_default(),
            code,
        })
        .collect();

    debug!(%day, rows = rows.len(), "Analyzed daily prices");
    Ok(rows)
}

impl IntoFrame for DailyPrice {
    const COLUMNS: &'static [&'static str] = &[
        "period",
        "code",
        "close",
        "change",
        "change_pct",
        "traded_shares",
        "avg_traded_shares",
        "avg_transactions",
        "avg_traded_amount",
    ];

    fn into_frame(rows: &[Self]) -> Result<DataFrame> {
        frame(vec![
            date_column("period", rows, |r| r.period)?,
            code_column("code", rows, |r| &r.code),
            f64_column("close", rows, |r| r.close),
            f64_column("change", rows, |r| r.change),
            f64_column("change_pct", rows, |r| r.change_pct),
            f64_column("traded_shares", rows, |r| r.traded_shares),
            i64_column("avg_traded_shares", rows, |r| r.activity.shares),
            i64_column("avg_transactions", rows, |r| r.activity.transactions),
            i64_column("avg_traded_amount", rows, |r| r.activity.amount),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn price(period: NaiveDate, code: &str, close: f64, shares: Option<f64>) -> PriceRecord {
        PriceRecord {
            close: Some(close),
            traded_shares: shares,
            transactions: Some(10.0),
            traded_amount: shares.map(|s| s * close),
            ..PriceRecord::new(period, StockCode::new(code))
        }
    }

    fn sample() -> FactTable<PriceRecord> {
        FactTable::from_rows(
            "price",
            [
                price(date(2023, 8, 1), "2330", 560.0, Some(100.0)),
                price(date(2023, 8, 2), "2330", 565.0, Some(201.0)),
                price(date(2023, 8, 3), "2330", 570.0, None),
                price(date(2023, 8, 2), "1101", 38.0, Some(50.0)),
            ],
        )
    }

    #[test]
    fn test_activity_is_truncated_mean_of_present_values() {
        let activity = trading_activity(&sample());
        let tsmc = activity[&StockCode::new("2330")];
        assert_eq!(tsmc.shares, Some(150));
        assert_eq!(tsmc.transactions, Some(10));
    }

    #[test]
    fn test_defaults_to_latest_day() {
        let rows = analyze_prices(&sample(), None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, Some(570.0));
        assert_eq!(rows[0].traded_shares, None);
        assert_eq!(rows[0].activity.shares, Some(150));
    }

    #[test]
    fn test_explicit_day() {
        let rows = analyze_prices(&sample(), Some(date(2023, 8, 2))).unwrap();
        let codes: Vec<_> = rows.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["1101", "2330"]);
        assert!(analyze_prices(&sample(), Some(date(2023, 8, 5))).is_err());
    }

    #[test]
    fn test_frame_columns() {
        let rows = analyze_prices(&sample(), None).unwrap();
        let df = DailyPrice::into_frame(&rows).unwrap();
        assert_eq!(df.width(), DailyPrice::COLUMNS.len());
    }
}
