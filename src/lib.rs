#![warn(clippy::all)]

//! SST Globe - animated sea surface temperature playback core.
//!
//! Daily SST textures are fetched, decoded to GPU textures, and kept in a
//! bounded per-dataset LRU cache. A poll-driven scheduler shows the selected
//! day on the globe, prefetches the next one while animating, and discards
//! the results of superseded loads.

pub mod data;
pub mod playback;
pub mod state;
pub mod texture;

#[cfg(target_arch = "wasm32")]
pub mod spawn;

pub use data::{AssetFetcher, CacheKey, Dataset, FetchedAssets, LoadError, Metadata};
pub use playback::{PlaybackPhase, PlaybackScheduler};
pub use state::{PlaybackSettings, PlaybackSignals, StateRequest};
pub use texture::{DatasetTextureCache, RenderTarget, TextureDecoder};
