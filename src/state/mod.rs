//! Application-facing state.
//!
//! This module contains the externally owned playback signals, the change
//! requests the scheduler sends back to their owner, tuning settings, and
//! session statistics.

mod playback;
mod settings;
mod stats;

pub use playback::{AnimationSpeed, PlaybackSignals};
pub use settings::{PlaybackSettings, SettingsError};
pub use stats::SessionStats;

/// A change the scheduler asks the owner of `PlaybackSignals` to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateRequest {
    /// Move playback to this index of the date sequence
    SetDateIndex(usize),
    /// Start or stop animation
    SetAnimating(bool),
}
