//! Frame display and animation pacing.
//!
//! This module provides:
//! - `PlaybackScheduler`, the per-frame state machine that shows the selected
//!   frame and advances the date index while animating
//! - `RequestFence`, which lets only the latest display load apply
//! - `ErrorNotice`, the self-dismissing failure message

mod fence;
mod loader;
mod notice;
mod scheduler;

pub use fence::{RequestFence, Ticket};
pub use notice::ErrorNotice;
pub use scheduler::{PlaybackPhase, PlaybackScheduler};
