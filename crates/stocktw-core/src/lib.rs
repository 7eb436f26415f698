#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/stocktw/stocktw/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types for Taiwan-market fundamentals analysis.
//!
//! This crate provides the foundations the analytic views are built on:
//!
//! - [`FiscalQuarter`](calendar::FiscalQuarter) - Quarterly reporting calendar
//! - [`FactTable`](table::FactTable) - Tables keyed by `(period, code)`
//! - [`Snapshot`](snapshot::Snapshot) - Immutable bundle of the fact tables
//! - [`FactStore`](store::FactStore) - Storage abstraction for fact tables
//! - [`IntoFrame`](frame::IntoFrame) - Export of typed rows as data frames

/// Fiscal quarter calendar.
pub mod calendar;
/// Lookback configuration for loading snapshots.
pub mod config;
/// Error types for data operations.
pub mod error;
/// Data frame export helpers.
pub mod frame;
/// Immutable snapshot of the fact tables.
pub mod snapshot;
/// Store trait for persisted fact tables.
pub mod store;
/// Keyed fact tables.
pub mod table;
/// Fact record types (StockCode, PriceRecord, IncomeStatement, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use calendar::{FiscalQuarter, QuarterIter, roc_year};
pub use config::{LoadConfig, LoadWindow};
pub use error::{DataError, Result};
pub use frame::IntoFrame;
pub use snapshot::{FinancialStatements, SecurityTable, Snapshot, SnapshotRanges, load_snapshot};
pub use store::{FactStore, IncomeSheet, StatementSheet};
pub use table::{FactTable, Keyed, PeriodRange};
pub use types::{
    BalanceSheet, CashFlowStatement, IncomeStatement, PeraRecord, PriceRecord, RevenueRecord,
    SecurityRecord, StockCode,
};
