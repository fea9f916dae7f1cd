//! Playback controls state.
//!
//! `PlaybackSignals` is owned by the host application. The scheduler only
//! reads it and asks for changes through `StateRequest`s.

use super::StateRequest;
use crate::data::{CacheKey, Dataset};
use chrono::NaiveDate;
use std::time::Duration;

/// Animation speed presets offered by the controls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AnimationSpeed {
    Slow,
    #[default]
    Medium,
    Fast,
    VeryFast,
}

impl AnimationSpeed {
    pub fn label(&self) -> &'static str {
        match self {
            AnimationSpeed::Slow => "Slow",
            AnimationSpeed::Medium => "Medium",
            AnimationSpeed::Fast => "Fast",
            AnimationSpeed::VeryFast => "Very Fast",
        }
    }

    pub fn all() -> &'static [AnimationSpeed] {
        &[
            AnimationSpeed::Slow,
            AnimationSpeed::Medium,
            AnimationSpeed::Fast,
            AnimationSpeed::VeryFast,
        ]
    }

    /// Time between frames.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(match self {
            AnimationSpeed::Slow => 1000,
            AnimationSpeed::Medium => 500,
            AnimationSpeed::Fast => 200,
            AnimationSpeed::VeryFast => 100,
        })
    }

    /// Preset matching an interval; intervals without a preset read as Medium.
    pub fn from_interval(interval: Duration) -> Self {
        Self::all()
            .iter()
            .copied()
            .find(|speed| speed.interval() == interval)
            .unwrap_or_default()
    }
}

/// Date sequence, selection and animation flags driving the globe.
#[derive(Debug, Clone)]
pub struct PlaybackSignals {
    /// Available days, in playback order
    pub dates: Vec<NaiveDate>,

    /// Index into `dates` of the displayed day
    pub current_date_index: usize,

    /// Dataset draped on the globe
    pub dataset: Dataset,

    /// Whether playback is currently active
    pub is_animating: bool,

    /// Time between frames while animating
    pub animation_interval: Duration,
}

impl Default for PlaybackSignals {
    fn default() -> Self {
        Self {
            dates: Vec::new(),
            current_date_index: 0,
            dataset: Dataset::default(),
            is_animating: false,
            // 10 fps
            animation_interval: AnimationSpeed::VeryFast.interval(),
        }
    }
}

impl PlaybackSignals {
    pub fn new(dates: Vec<NaiveDate>, dataset: Dataset) -> Self {
        Self {
            dates,
            dataset,
            ..Default::default()
        }
    }

    /// The displayed day, if any dates are available.
    pub fn current_date(&self) -> Option<NaiveDate> {
        self.dates.get(self.current_date_index).copied()
    }

    pub fn current_key(&self) -> Option<CacheKey> {
        self.key_at(self.current_date_index)
    }

    pub fn key_at(&self, index: usize) -> Option<CacheKey> {
        self.dates
            .get(index)
            .map(|date| CacheKey::new(*date, self.dataset))
    }

    pub fn has_multiple_dates(&self) -> bool {
        self.dates.len() > 1
    }

    /// Whether the displayed day is the last one in the sequence.
    pub fn is_at_end(&self) -> bool {
        !self.dates.is_empty() && self.current_date_index == self.dates.len() - 1
    }

    /// Index playback advances to from the displayed day, wrapping at the end.
    pub fn next_index(&self) -> Option<usize> {
        if self.dates.is_empty() {
            return None;
        }
        Some((self.current_date_index + 1) % self.dates.len())
    }

    pub fn speed(&self) -> AnimationSpeed {
        AnimationSpeed::from_interval(self.animation_interval)
    }

    pub fn set_speed(&mut self, speed: AnimationSpeed) {
        self.animation_interval = speed.interval();
    }

    /// Apply a change requested by the scheduler.
    pub fn apply(&mut self, request: StateRequest) {
        match request {
            StateRequest::SetDateIndex(index) => {
                if index < self.dates.len() {
                    self.current_date_index = index;
                } else {
                    log::warn!(
                        "Ignoring date index {} outside {} available dates",
                        index,
                        self.dates.len()
                    );
                }
            }
            StateRequest::SetAnimating(animating) => self.is_animating = animating,
        }
    }

    /// Play/pause. Starting from the last day rewinds to the first.
    ///
    /// Has no effect unless there is more than one date.
    pub fn toggle_playback(&mut self) {
        if !self.has_multiple_dates() {
            return;
        }
        if !self.is_animating && self.is_at_end() {
            self.current_date_index = 0;
        }
        self.is_animating = !self.is_animating;
    }

    /// Step to the next day without wrapping.
    pub fn step_forward(&mut self) {
        if self.current_date_index + 1 < self.dates.len() {
            self.current_date_index += 1;
        }
    }

    /// Step to the previous day without wrapping.
    pub fn step_back(&mut self) {
        self.current_date_index = self.current_date_index.saturating_sub(1);
    }

    pub fn toggle_dataset(&mut self) {
        self.dataset = self.dataset.toggled();
    }
}
