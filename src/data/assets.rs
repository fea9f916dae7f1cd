//! Remote asset retrieval interface.
//!
//! The network protocol (bucket layout, URL construction, decoding of the
//! HTTP bodies) belongs to the host application. The playback core only sees
//! the `AssetFetcher` trait and the errors a load can produce.

use super::keys::Dataset;
use super::metadata::Metadata;
use chrono::NaiveDate;
use std::future::Future;

/// Compressed texture bytes plus the metadata record published with them.
#[derive(Debug, Clone)]
pub struct FetchedAssets {
    /// Compressed image (PNG) bytes, not yet decoded
    pub image: Vec<u8>,
    pub metadata: Metadata,
}

impl FetchedAssets {
    pub fn new(image: Vec<u8>, metadata: Metadata) -> Self {
        Self { image, metadata }
    }
}

/// Errors that can occur while loading a frame.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    /// The remote object is missing or the transfer failed.
    #[error("failed to fetch assets for {date}: {reason}")]
    Fetch { date: String, reason: String },
    /// The retrieved bytes could not be turned into a texture.
    #[error("failed to decode texture: {0}")]
    Decode(String),
    /// The metadata describes a different day than the one requested.
    #[error("metadata is for {received}, expected {requested}")]
    DateMismatch {
        requested: NaiveDate,
        received: NaiveDate,
    },
    /// The load could not be scheduled on the executor.
    #[error("failed to spawn load: {0}")]
    Spawn(String),
}

impl LoadError {
    /// Build a fetch error; `None` means the "latest" frame was requested.
    pub fn fetch(date: Option<NaiveDate>, reason: impl Into<String>) -> Self {
        LoadError::Fetch {
            date: date.map_or_else(|| "latest".to_string(), |d| d.to_string()),
            reason: reason.into(),
        }
    }
}

/// Source of compressed frame textures and their metadata.
///
/// Implementations are expected to be cheap to call concurrently; the
/// scheduler may have the active frame and a prefetch in flight at once.
///
/// Note: This trait does not require `Send` bounds since loads run on a
/// single-threaded executor (and JS types cannot be sent between threads).
pub trait AssetFetcher {
    /// Fetch the texture and metadata for a day, or the latest available day
    /// when `date` is `None`.
    fn fetch(
        &self,
        date: Option<NaiveDate>,
        dataset: Dataset,
    ) -> impl Future<Output = Result<FetchedAssets, LoadError>>;
}
