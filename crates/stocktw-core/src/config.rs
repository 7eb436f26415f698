//! Lookback configuration for loading fact snapshots.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// How far back each fact table is read when a snapshot is loaded.
///
/// Deserializes from JSON with every field optional:
///
/// ```
/// use stocktw_core::LoadConfig;
///
/// let config = LoadConfig::from_json(r#"{ "price_months": 3 }"#).unwrap();
/// assert_eq!(config.price_months, 3);
/// assert_eq!(config.statement_years, 6);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Months of daily prices.
    pub price_months: u32,
    /// Years of pera history, used for dividend streaks.
    pub pera_years: u32,
    /// Years of quarterly statements.
    pub statement_years: u32,
    /// Extra months of revenue read before the statement window, so the
    /// earliest quarter still gets a full revenue aggregate.
    pub revenue_lead_months: u32,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            price_months: 6,
            pera_years: 6,
            statement_years: 6,
            revenue_lead_months: 5,
        }
    }
}

/// Start dates of each table's lookback window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadWindow {
    /// First trading day of prices.
    pub prices_since: NaiveDate,
    /// First trading day of pera rows.
    pub peras_since: NaiveDate,
    /// First revenue month.
    pub revenues_since: NaiveDate,
    /// First quarter-end of statements.
    pub statements_since: NaiveDate,
}

impl LoadConfig {
    /// Parses a configuration from JSON, filling absent fields with defaults.
    ///
    /// # Errors
    /// Returns [`DataError::Parse`] on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DataError::Parse(e.to_string()))
    }

    /// Sets the months of daily prices.
    #[must_use]
    pub const fn with_price_months(mut self, months: u32) -> Self {
        self.price_months = months;
        self
    }

    /// Sets the years of pera history.
    #[must_use]
    pub const fn with_pera_years(mut self, years: u32) -> Self {
        self.pera_years = years;
        self
    }

    /// Sets the years of quarterly statements.
    #[must_use]
    pub const fn with_statement_years(mut self, years: u32) -> Self {
        self.statement_years = years;
        self
    }

    /// Sets the extra months of revenue read before the statement window.
    #[must_use]
    pub const fn with_revenue_lead_months(mut self, months: u32) -> Self {
        self.revenue_lead_months = months;
        self
    }

    /// Computes the lookback window as of a date.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] if a window start falls outside
    /// the supported date range.
    pub fn window(&self, as_of: NaiveDate) -> Result<LoadWindow> {
        let back = |months: u32| {
            as_of.checked_sub_months(Months::new(months)).ok_or_else(|| {
                DataError::InvalidParameter(format!("{months} months before {as_of}"))
            })
        };

        let statement_months = self.statement_years * 12;
        Ok(LoadWindow {
            prices_since: back(self.price_months)?,
            peras_since: back(self.pera_years * 12)?,
            revenues_since: back(statement_months + self.revenue_lead_months)?,
            statements_since: back(statement_months)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window() {
        let as_of = NaiveDate::from_ymd_opt(2024, 8, 20).unwrap();
        let window = LoadConfig::default().window(as_of).unwrap();

        assert_eq!(window.prices_since, NaiveDate::from_ymd_opt(2024, 2, 20).unwrap());
        assert_eq!(window.peras_since, NaiveDate::from_ymd_opt(2018, 8, 20).unwrap());
        assert_eq!(window.statements_since, NaiveDate::from_ymd_opt(2018, 8, 20).unwrap());
        assert_eq!(window.revenues_since, NaiveDate::from_ymd_opt(2018, 3, 20).unwrap());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = LoadConfig::from_json(r#"{"pera_years": 10}"#).unwrap();
        assert_eq!(config, LoadConfig::default().with_pera_years(10));
        assert!(LoadConfig::from_json("{").is_err());
    }

    #[test]
    fn test_revenue_lead_extends_statement_window() {
        let as_of = NaiveDate::from_ymd_opt(2024, 8, 20).unwrap();
        let config = LoadConfig::default()
            .with_statement_years(1)
            .with_revenue_lead_months(0);
        let window = config.window(as_of).unwrap();
        assert_eq!(window.revenues_since, window.statements_since);

        let window = config.with_revenue_lead_months(2).window(as_of).unwrap();
        assert_eq!(window.revenues_since, NaiveDate::from_ymd_opt(2023, 6, 20).unwrap());
    }
}
