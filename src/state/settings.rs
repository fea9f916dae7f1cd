//! Playback tuning settings.
//!
//! Settings are read from an optional JSON file; anything missing or
//! unreadable falls back to the defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Errors that can occur while reading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Cache capacity and playback timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Maximum number of decoded frames kept on the GPU.
    pub cache_capacity: usize,
    /// Default time between frames while animating.
    pub frame_interval_ms: u64,
    /// Extra hold on the last frame before playback loops.
    pub loop_pause_ms: u64,
    /// How often to check whether the next frame has landed.
    pub poll_interval_ms: u64,
    /// Checks before advancing without the next frame.
    pub max_poll_attempts: u32,
    /// How long a load failure notice stays visible.
    pub error_display_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            cache_capacity: 100,
            frame_interval_ms: 100,  // 10 fps
            loop_pause_ms: 1000,
            poll_interval_ms: 100,
            max_poll_attempts: 100, // ~10 s at the default poll interval
            error_display_ms: 3000,
        }
    }
}

impl PlaybackSettings {
    /// Creates new settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read settings from a JSON file.
    pub fn read(path: &Path) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load settings from a JSON file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(settings) => {
                log::info!("Loaded playback settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Using default playback settings ({}): {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn loop_pause(&self) -> Duration {
        Duration::from_millis(self.loop_pause_ms)
    }

    /// Poll interval, never shorter than a millisecond.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn error_display(&self) -> Duration {
        Duration::from_millis(self.error_display_ms)
    }

    /// Upper bound on how long playback waits for a missing frame.
    pub fn max_wait(&self) -> Duration {
        self.poll_interval() * self.max_poll_attempts
    }
}
