//! Error types for fact loading and analysis.
//!
//! This module defines [`DataError`] which covers all error cases that can occur
//! when loading fact tables, mapping fiscal periods, or deriving analytic views.

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors that can occur during data operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// A date does not match any canonical fiscal quarter-end.
    #[error("Invalid fiscal period: {0} is not a quarter-end date")]
    InvalidPeriod(NaiveDate),

    /// The requested period has no rows in the anchor table.
    #[error("No rows in table `{table}` for period {period}")]
    MissingPeriod {
        /// The table that was queried.
        table: String,
        /// The period that was requested.
        period: NaiveDate,
    },

    /// A table holds no rows at all, so no default period can be chosen.
    #[error("Table `{0}` is empty")]
    EmptyTable(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error interacting with a fact store.
    #[error("Store error: {0}")]
    Store(String),

    /// Error parsing stored or configured data.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error building a tabular view.
    #[error("Frame error: {0}")]
    Frame(#[from] PolarsError),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl DataError {
    /// Builds a [`DataError::MissingPeriod`] for the given table.
    #[must_use]
    pub fn missing_period(table: impl Into<String>, period: NaiveDate) -> Self {
        Self::MissingPeriod {
            table: table.into(),
            period,
        }
    }
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;
