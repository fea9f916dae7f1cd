//! Core key types for the frame cache.
//!
//! - `Dataset`: which measurement series a frame belongs to
//! - `CacheKey`: identifies one frame, a calendar day of one dataset
//!
//! Dates travel as `chrono::NaiveDate` and are formatted as ISO `YYYY-MM-DD`,
//! which is also the format of the available-dates listing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ISO calendar date format used by the dates listing.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Measurement series that can be draped on the globe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dataset {
    /// Raw sea surface temperature.
    Temperature,
    /// Deviation from the climatological mean.
    #[default]
    #[serde(rename = "Temp Anomaly")]
    TempAnomaly,
}

impl Dataset {
    pub fn label(&self) -> &'static str {
        match self {
            Dataset::Temperature => "Temperature",
            Dataset::TempAnomaly => "Temp Anomaly",
        }
    }

    pub fn all() -> &'static [Dataset] {
        &[Dataset::Temperature, Dataset::TempAnomaly]
    }

    /// The other dataset (there are only two).
    pub fn toggled(&self) -> Dataset {
        match self {
            Dataset::Temperature => Dataset::TempAnomaly,
            Dataset::TempAnomaly => Dataset::Temperature,
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifies a single frame: one dataset on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub date: NaiveDate,
    pub dataset: Dataset,
}

impl CacheKey {
    pub fn new(date: NaiveDate, dataset: Dataset) -> Self {
        Self { date, dataset }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.date.format(DATE_FORMAT), self.dataset)
    }
}

/// Parse a single ISO `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

/// Parse an available-dates listing, skipping entries that are not valid dates.
pub fn parse_dates<S: AsRef<str>>(dates: &[S]) -> Vec<NaiveDate> {
    dates
        .iter()
        .filter_map(|s| {
            let s = s.as_ref();
            let parsed = parse_date(s);
            if parsed.is_none() {
                log::warn!("Skipping malformed date in listing: {:?}", s);
            }
            parsed
        })
        .collect()
}
