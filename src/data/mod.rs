//! Frame identity, metadata and the asset-fetch interface.

mod assets;
mod colormap;
mod keys;
mod metadata;

pub use assets::{AssetFetcher, FetchedAssets, LoadError};
pub use colormap::ColormapConfig;
pub use keys::{parse_date, parse_dates, CacheKey, Dataset};
pub use metadata::Metadata;
