#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/stocktw/stocktw/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Derived fundamentals analytics for the Taiwan stock market.
//!
//! This crate re-exports the core fact types, the store implementations and
//! the analytic views, and provides a [`StoreRegistry`] for reading fact
//! tables from several stores with fallback.
//!
//! # Features
//!
//! - `sqlite` - SQLite-backed [`SqliteStore`] (enabled by default)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use stocktw::{AnalysisOptions, LoadConfig, SqliteStore, StoreRegistry};
//!
//! #[tokio::main]
//! async fn main() -> stocktw::Result<()> {
//!     let registry = StoreRegistry::new()
//!         .with_store(Arc::new(SqliteStore::new("stocktw.db")?));
//!
//!     let as_of = NaiveDate::from_ymd_opt(2024, 8, 20).unwrap();
//!     let report = registry
//!         .analyze(&LoadConfig::default(), AnalysisOptions::new(as_of))
//!         .await?;
//!
//!     for (name, frame) in report.frames()? {
//!         println!("{name}: {frame:?}");
//!     }
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use stocktw_core::*;

// Analytic views
pub use stocktw_analysis::*;

// Stores
#[cfg(feature = "sqlite")]
pub use stocktw_store::SqliteStore;
pub use stocktw_store::InMemoryStore;

mod registry;
pub use registry::StoreRegistry;
