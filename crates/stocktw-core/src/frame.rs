//! Conversion of typed rows into polars data frames.
//!
//! Analytic views are computed over typed rows and exported as a
//! [`DataFrame`] with a stable column list. Missing values become nulls.

use chrono::NaiveDate;
use polars::prelude::*;

use crate::{error::Result, types::StockCode};

/// Rows that can be exported as a [`DataFrame`].
pub trait IntoFrame: Sized {
    /// Column names of the exported frame, in order.
    const COLUMNS: &'static [&'static str];

    /// Builds a frame holding one row per element.
    ///
    /// # Errors
    /// Returns [`DataError::Frame`](crate::DataError::Frame) if polars
    /// rejects the columns.
    fn into_frame(rows: &[Self]) -> Result<DataFrame>;
}

/// Builds a `Date` column.
///
/// # Errors
/// Returns an error if the date strings cannot be cast.
pub fn date_column<T>(name: &str, rows: &[T], f: impl Fn(&T) -> NaiveDate) -> Result<Column> {
    let values: Vec<String> = rows.iter().map(|row| f(row).to_string()).collect();
    Ok(Column::new(name.into(), values).cast(&DataType::Date)?)
}

/// Builds a string column of security codes.
pub fn code_column<T>(name: &str, rows: &[T], f: impl Fn(&T) -> &StockCode) -> Column {
    let values: Vec<&str> = rows.iter().map(|row| f(row).as_str()).collect();
    Column::new(name.into(), values)
}

/// Builds a nullable string column.
pub fn str_column<T>(name: &str, rows: &[T], f: impl Fn(&T) -> Option<&str>) -> Column {
    let values: Vec<Option<&str>> = rows.iter().map(f).collect();
    Column::new(name.into(), values)
}

/// Builds a nullable `Float64` column.
pub fn f64_column<T>(name: &str, rows: &[T], f: impl Fn(&T) -> Option<f64>) -> Column {
    let values: Vec<Option<f64>> = rows.iter().map(f).collect();
    Column::new(name.into(), values)
}

/// Builds a nullable `Int64` column.
pub fn i64_column<T>(name: &str, rows: &[T], f: impl Fn(&T) -> Option<i64>) -> Column {
    let values: Vec<Option<i64>> = rows.iter().map(f).collect();
    Column::new(name.into(), values)
}

/// Builds a `Boolean` column.
pub fn bool_column<T>(name: &str, rows: &[T], f: impl Fn(&T) -> bool) -> Column {
    let values: Vec<bool> = rows.iter().map(f).collect();
    Column::new(name.into(), values)
}

/// Assembles columns into a frame.
///
/// # Errors
/// Returns an error if the columns differ in length or repeat a name.
pub fn frame(columns: Vec<Column>) -> Result<DataFrame> {
    Ok(DataFrame::new(columns)?)
}
