//! Fiscal reporting calendar.
//!
//! Listed companies in Taiwan publish quarterly statements on four regulatory
//! deadlines per year. A [`FiscalQuarter`] names one of those reporting
//! periods and maps to and from its canonical quarter-end date:
//!
//! | quarter | quarter-end date   |
//! |---------|--------------------|
//! | Q1      | May 15 (same year) |
//! | Q2      | Aug 14 (same year) |
//! | Q3      | Nov 14 (same year) |
//! | Q4      | Mar 31 (next year) |

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::fmt;

use crate::error::{DataError, Result};

/// Offset between the Gregorian year and the ROC (Minguo) year.
pub const ROC_EPOCH_OFFSET: i32 = 1911;

/// Days a statement may lag behind its quarter-end deadline.
const REPORTING_DELAY_DAYS: u64 = 4;

/// Returns the ROC calendar year of a date (Gregorian year minus 1911).
#[must_use]
pub fn roc_year(date: NaiveDate) -> i32 {
    date.year() - ROC_EPOCH_OFFSET
}

/// A fiscal reporting quarter, ordered by `(year, quarter)`.
///
/// Deserializing goes through [`FiscalQuarter::new`], so a quarter number
/// outside `1..=4` is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FiscalQuarter {
    year: i32,
    quarter: u8,
}

impl<'de> Deserialize<'de> for FiscalQuarter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Parts {
            year: i32,
            quarter: u8,
        }

        let Parts { year, quarter } = Parts::deserialize(deserializer)?;
        Self::new(year, quarter).map_err(de::Error::custom)
    }
}

impl FiscalQuarter {
    /// Creates a fiscal quarter.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] if `quarter` is not within `1..=4`.
    pub fn new(year: i32, quarter: u8) -> Result<Self> {
        if !(1..=4).contains(&quarter) {
            return Err(DataError::InvalidParameter(format!(
                "quarter must be within 1..=4, got {quarter}"
            )));
        }
        Ok(Self { year, quarter })
    }

    /// Fiscal year of the quarter.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Quarter number (1-4).
    #[must_use]
    pub const fn quarter(&self) -> u8 {
        self.quarter
    }

    /// Returns the canonical quarter-end date.
    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        let (year, month, day) = match self.quarter {
            1 => (self.year, 5, 15),
            2 => (self.year, 8, 14),
            3 => (self.year, 11, 14),
            _ => (self.year + 1, 3, 31),
        };
        NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MAX)
    }

    /// Maps a canonical quarter-end date back to its quarter.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidPeriod`] if `date` is not one of the four
    /// quarter-end dates.
    pub fn from_end_date(date: NaiveDate) -> Result<Self> {
        let (year, quarter) = match (date.month(), date.day()) {
            (3, 31) => (date.year() - 1, 4),
            (5, 15) => (date.year(), 1),
            (8, 14) => (date.year(), 2),
            (11, 14) => (date.year(), 3),
            _ => return Err(DataError::InvalidPeriod(date)),
        };
        Ok(Self { year, quarter })
    }

    /// Returns the most recently completed quarter as of `date`.
    ///
    /// The date is first moved back by the reporting delay, then matched to
    /// the latest quarter-end date not after it.
    #[must_use]
    pub fn closest(date: NaiveDate) -> Self {
        let shifted = date
            .checked_sub_days(Days::new(REPORTING_DELAY_DAYS))
            .unwrap_or(date);
        let year = shifted.year();

        [
            Self { year, quarter: 3 },
            Self { year, quarter: 2 },
            Self { year, quarter: 1 },
            Self {
                year: year - 1,
                quarter: 4,
            },
        ]
        .into_iter()
        .find(|q| q.end_date() <= shifted)
        .unwrap_or(Self {
            year: year - 1,
            quarter: 3,
        })
    }

    /// Returns the quarter whose calendar months contain `date`.
    ///
    /// Jan-Mar is Q1, Apr-Jun Q2, Jul-Sep Q3 and Oct-Dec Q4, all of the same
    /// year. Used to line monthly revenue up with quarterly statements.
    #[must_use]
    pub fn enclosing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            quarter: (date.month0() / 3 + 1) as u8,
        }
    }

    /// Returns the preceding quarter.
    #[must_use]
    pub const fn previous(&self) -> Self {
        if self.quarter == 1 {
            Self {
                year: self.year - 1,
                quarter: 4,
            }
        } else {
            Self {
                year: self.year,
                quarter: self.quarter - 1,
            }
        }
    }

    /// Returns the following quarter.
    #[must_use]
    pub const fn next(&self) -> Self {
        if self.quarter == 4 {
            Self {
                year: self.year + 1,
                quarter: 1,
            }
        } else {
            Self {
                year: self.year,
                quarter: self.quarter + 1,
            }
        }
    }

    /// Iterates quarters from `self` up to and including `end`.
    ///
    /// The iterator is empty when `self` is after `end`.
    #[must_use]
    pub const fn iter_to(self, end: Self) -> QuarterIter {
        QuarterIter {
            next: Some(self),
            end,
        }
    }
}

impl fmt::Display for FiscalQuarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

/// Forward iterator over fiscal quarters, see [`FiscalQuarter::iter_to`].
#[derive(Clone, Debug)]
pub struct QuarterIter {
    next: Option<FiscalQuarter>,
    end: FiscalQuarter,
}

impl Iterator for QuarterIter {
    type Item = FiscalQuarter;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.filter(|q| *q <= self.end)?;
        self.next = Some(current.next());
        Some(current)
    }
}
