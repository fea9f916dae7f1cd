//! GPU texture handling for globe frames.
//!
//! This module provides:
//! - The `TextureDecoder` and `RenderTarget` interfaces implemented by the host
//!   renderer
//! - `DatasetTextureCache`, the bounded LRU cache that owns decoded textures

mod cache;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheEntry, CacheStats, DatasetTextureCache};

use crate::data::{CacheKey, LoadError, Metadata};
use std::future::Future;

/// Errors reported by best-effort texture operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextureError {
    /// The handle was already released.
    #[error("texture handle already released")]
    Released,
    /// The graphics backend rejected the operation.
    #[error("GPU error: {0}")]
    Gpu(String),
}

/// Turns compressed image bytes into GPU textures and releases them.
///
/// `Handle` is an opaque, cheaply clonable reference to a GPU-resident
/// texture. Clones refer to the same resource; only `dispose` frees it.
pub trait TextureDecoder {
    type Handle: Clone + 'static;

    /// Decode image bytes and upload them as a texture.
    fn decode(&self, image: Vec<u8>) -> impl Future<Output = Result<Self::Handle, LoadError>>;

    /// Pre-decode a texture into GPU memory ahead of first display.
    ///
    /// Best effort: a failure only means the first draw may stutter.
    fn warm(&self, texture: &Self::Handle) -> Result<(), TextureError>;

    /// Release the GPU memory (and any object URL) behind a handle.
    fn dispose(&self, texture: &Self::Handle) -> Result<(), TextureError>;
}

/// The globe material the scheduler publishes frames to.
///
/// The target may keep the handle for drawing but never disposes it; the
/// cache remains the owner.
pub trait RenderTarget<H> {
    fn show_frame(&mut self, key: &CacheKey, texture: &H, metadata: &Metadata);
}
