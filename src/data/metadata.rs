//! Per-frame metadata shipped alongside each texture.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Metadata record describing one rendered frame.
///
/// Deserialized from the JSON document published next to each texture.
/// Missing fields fall back to their defaults so a partially populated
/// record still loads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Colour-map stops as (data value, CSS colour) pairs
    pub cmap: Vec<(f64, String)>,
    /// Human-readable title of the rendering
    pub title: String,
    /// Dataset name as published by the source
    pub dataset: String,
    /// Human-readable date
    pub date: String,
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl Metadata {
    /// Parse a metadata record from its JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Calendar date built from the numeric year/month/day fields.
    ///
    /// Returns `None` when the fields do not form a valid date (including the
    /// all-zero default).
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    /// Data values of the colour-map stops.
    pub fn cmap_domains(&self) -> Vec<f64> {
        self.cmap.iter().map(|(value, _)| *value).collect()
    }

    /// Colours of the colour-map stops.
    pub fn cmap_ranges(&self) -> Vec<String> {
        self.cmap.iter().map(|(_, color)| color.clone()).collect()
    }
}
