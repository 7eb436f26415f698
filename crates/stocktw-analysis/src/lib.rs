#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/stocktw/stocktw/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Derived analytic views over a [`Snapshot`](stocktw_core::Snapshot).
//!
//! Every view is a pure function of its inputs:
//!
//! - [`historical_profitability`] - Margin and return ratios per quarter
//! - [`analyze_dividends`] - Consecutive dividend years
//! - [`analyze_revenue`] - Monthly revenue trend
//! - [`analyze_prices`] - Daily price with average activity
//! - [`analyze_base`] - Valuation and capital structure overview
//! - [`analyze_profit`] - Multi-quarter EPS and profit analysis
//! - [`run`] - All of the above in one pass

/// Base overview.
pub mod base;
/// Multi-quarter profit composer.
pub mod composer;
/// Dividend streaks.
pub mod dividend;
/// Daily price activity.
pub mod price;
/// Historical profitability.
pub mod profitability;
/// Missing-aware arithmetic.
pub mod ratio;
/// Report runner.
pub mod report;
/// Revenue trend.
pub mod revenue;

pub use base::{BaseOverview, analyze_base};
pub use composer::{ProfitAnalysis, analyze_profit};
pub use dividend::{DividendStreak, analyze_dividends, dividend_streaks, year_end_peras};
pub use price::{DailyPrice, TradingActivity, analyze_prices, trading_activity};
pub use profitability::{
    HistoricalProfitability, RevenueQuarter, historical_profitability, revenue_by_quarter,
};
pub use report::{AnalysisOptions, AnalysisReport, run};
pub use revenue::{RevenueTrend, analyze_revenue};
