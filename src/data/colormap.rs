//! Legend configuration derived from frame metadata.
//!
//! The legend itself is drawn by the UI layer; this module only decides the
//! scale stops, labelled cells, title and number format for each dataset.

use super::keys::Dataset;
use super::metadata::Metadata;

/// Labelled cells used by the absolute temperature legend (degrees C).
const TEMPERATURE_CELLS: [f64; 11] = [
    0.0, 10.0, 20.0, 22.0, 23.0, 24.0, 25.0, 30.0, 32.0, 33.0, 35.0,
];

/// Everything the UI needs to draw a linear colour legend.
#[derive(Debug, Clone, PartialEq)]
pub struct ColormapConfig {
    /// Data values of the scale stops
    pub domains: Vec<f64>,
    /// CSS colours paired with `domains`
    pub ranges: Vec<String>,
    /// Values that receive a labelled swatch
    pub cells: Vec<f64>,
    pub title: &'static str,
    /// d3-style number format for cell labels
    pub format: &'static str,
}

impl ColormapConfig {
    /// Build the legend for a dataset from the metadata of the displayed frame.
    pub fn for_dataset(dataset: Dataset, metadata: &Metadata) -> Self {
        let domains = metadata.cmap_domains();
        let ranges = metadata.cmap_ranges();

        match dataset {
            Dataset::Temperature => Self {
                domains,
                ranges,
                cells: TEMPERATURE_CELLS.to_vec(),
                title: "Temperature, °C",
                format: ".0f",
            },
            Dataset::TempAnomaly => Self {
                cells: domains.clone(),
                domains,
                ranges,
                title: "Temperature Anomaly, °C",
                format: ".1f",
            },
        }
    }

    /// Linearly interpolated colour stop index and blend factor for a value.
    ///
    /// Values outside the domain clamp to the first or last stop. Returns
    /// `None` when the colour map is empty.
    pub fn locate(&self, value: f64) -> Option<(usize, f64)> {
        let last = self.domains.len().checked_sub(1)?;
        if value <= self.domains[0] || last == 0 {
            return Some((0, 0.0));
        }
        if value >= self.domains[last] {
            return Some((last, 0.0));
        }

        let upper = self.domains.iter().position(|d| *d >= value)?;
        let lower = upper - 1;
        let span = self.domains[upper] - self.domains[lower];
        let t = if span > 0.0 {
            (value - self.domains[lower]) / span
        } else {
            0.0
        };
        Some((lower, t))
    }
}
