//! Keyed fact tables.
//!
//! A [`FactTable`] maps `(period, code)` to exactly one row. Rows inserted
//! under an existing key replace the previous row, matching the
//! upsert-by-unique-key behavior of the stores.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{DataError, Result};
use crate::types::StockCode;

/// A row that is keyed by `(period, code)`.
pub trait Keyed {
    /// Period of the row (trading day, revenue month or quarter-end).
    fn period(&self) -> NaiveDate;

    /// Security code of the row.
    fn code(&self) -> &StockCode;
}

/// Inclusive range of periods present in a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRange {
    /// Earliest period.
    pub min: NaiveDate,
    /// Latest period.
    pub max: NaiveDate,
}

/// A fact table keyed by `(period, code)`.
#[derive(Clone, Debug, PartialEq)]
pub struct FactTable<R> {
    name: &'static str,
    rows: BTreeMap<(NaiveDate, StockCode), R>,
}

impl<R: Keyed> FactTable<R> {
    /// Creates an empty table.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: BTreeMap::new(),
        }
    }

    /// Builds a table from rows. Later rows win on duplicate keys.
    pub fn from_rows(name: &'static str, rows: impl IntoIterator<Item = R>) -> Self {
        let mut table = Self::new(name);
        table.extend(rows);
        table
    }

    /// Inserts or replaces a row, returning the replaced row.
    pub fn upsert(&mut self, row: R) -> Option<R> {
        let key = (row.period(), row.code().clone());
        self.rows.insert(key, row)
    }

    /// Inserts or replaces every row.
    pub fn extend(&mut self, rows: impl IntoIterator<Item = R>) {
        for row in rows {
            self.upsert(row);
        }
    }
}

impl<R> FactTable<R> {
    /// Name of the table, used in error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the row stored under `(period, code)`.
    #[must_use]
    pub fn get(&self, period: NaiveDate, code: &StockCode) -> Option<&R> {
        self.rows.get(&(period, code.clone()))
    }

    /// Iterates all rows ordered by `(period, code)`.
    pub fn iter(&self) -> impl Iterator<Item = &R> + '_ {
        self.rows.values()
    }

    /// Iterates the rows of one period ordered by code.
    pub fn at(&self, period: NaiveDate) -> impl Iterator<Item = &R> + '_ {
        self.rows
            .range::<(NaiveDate, StockCode), _>((period, StockCode::default())..)
            .take_while(move |((p, _), _)| *p == period)
            .map(|(_, row)| row)
    }

    /// Returns the rows of one period indexed by code.
    ///
    /// The result is empty when the period is absent.
    #[must_use]
    pub fn snapshot(&self, period: NaiveDate) -> BTreeMap<StockCode, &R> {
        self.rows
            .range::<(NaiveDate, StockCode), _>((period, StockCode::default())..)
            .take_while(|((p, _), _)| *p == period)
            .map(|((_, code), row)| (code.clone(), row))
            .collect()
    }

    /// Like [`snapshot`](Self::snapshot), but fails when the period has no rows.
    ///
    /// # Errors
    /// Returns [`DataError::MissingPeriod`] naming this table.
    pub fn require(&self, period: NaiveDate) -> Result<BTreeMap<StockCode, &R>> {
        let rows = self.snapshot(period);
        if rows.is_empty() {
            return Err(DataError::missing_period(self.name, period));
        }
        Ok(rows)
    }

    /// Latest period in the table.
    #[must_use]
    pub fn latest_period(&self) -> Option<NaiveDate> {
        self.rows.keys().next_back().map(|(period, _)| *period)
    }

    /// Latest period, failing on an empty table.
    ///
    /// # Errors
    /// Returns [`DataError::EmptyTable`] naming this table.
    pub fn require_latest_period(&self) -> Result<NaiveDate> {
        self.latest_period()
            .ok_or_else(|| DataError::EmptyTable(self.name.to_string()))
    }

    /// Earliest period in the table.
    #[must_use]
    pub fn earliest_period(&self) -> Option<NaiveDate> {
        self.rows.keys().next().map(|(period, _)| *period)
    }

    /// Range of periods present, or `None` for an empty table.
    #[must_use]
    pub fn range(&self) -> Option<PeriodRange> {
        Some(PeriodRange {
            min: self.earliest_period()?,
            max: self.latest_period()?,
        })
    }

    /// Distinct periods in ascending order.
    #[must_use]
    pub fn periods(&self) -> BTreeSet<NaiveDate> {
        self.rows.keys().map(|(period, _)| *period).collect()
    }

    /// Groups all rows by code, each group in period order.
    #[must_use]
    pub fn by_code(&self) -> BTreeMap<&StockCode, Vec<&R>> {
        let mut groups: BTreeMap<&StockCode, Vec<&R>> = BTreeMap::new();
        for ((_, code), row) in &self.rows {
            groups.entry(code).or_default().push(row);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RevenueRecord;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn revenue(period: NaiveDate, code: &str, value: f64) -> RevenueRecord {
        RevenueRecord::new(period, StockCode::new(code), Some(value))
    }

    #[test]
    fn test_duplicate_keys_keep_last_row() {
        let period = date(2023, 6, 10);
        let table = FactTable::from_rows(
            "revenue",
            [revenue(period, "2330", 1.0), revenue(period, "2330", 2.0)],
        );

        assert_eq!(table.len(), 1);
        let row = table.get(period, &StockCode::new("2330")).unwrap();
        assert_eq!(row.revenue, Some(2.0));
    }

    #[test]
    fn test_period_slices() {
        let may = date(2023, 5, 10);
        let june = date(2023, 6, 10);
        let table = FactTable::from_rows(
            "revenue",
            [
                revenue(june, "2330", 3.0),
                revenue(may, "2330", 1.0),
                revenue(may, "1101", 2.0),
            ],
        );

        let codes: Vec<_> = table.at(may).map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["1101", "2330"]);
        assert_eq!(table.snapshot(june).len(), 1);
        assert_eq!(table.latest_period(), Some(june));
        assert_eq!(
            table.range(),
            Some(PeriodRange {
                min: may,
                max: june
            })
        );
        assert_eq!(table.by_code()[&StockCode::new("2330")].len(), 2);
    }

    #[test]
    fn test_require_reports_table_and_period() {
        let table: FactTable<RevenueRecord> = FactTable::new("revenue");
        let period = date(2023, 6, 10);

        match table.require(period) {
            Err(DataError::MissingPeriod { table, period: p }) => {
                assert_eq!(table, "revenue");
                assert_eq!(p, period);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            table.require_latest_period(),
            Err(DataError::EmptyTable(_))
        ));
    }
}
