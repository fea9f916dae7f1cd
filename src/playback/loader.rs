//! Async frame loading bridged back to the scheduler's update loop.
//!
//! Loads run as local futures on the host executor. Each one fetches,
//! validates, decodes and warms a frame, stores it in the shared cache, and
//! (for display loads) records an outcome that the scheduler drains on its
//! next `update`. Outcomes carry only the key; the texture stays in the cache.

use crate::data::{AssetFetcher, CacheKey, Dataset, LoadError};
use crate::playback::fence::Ticket;
use crate::texture::{CacheEntry, DatasetTextureCache, TextureDecoder};
use chrono::NaiveDate;
use futures_util::task::{LocalSpawn, LocalSpawnExt};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Result of a display load, waiting to be applied or discarded.
#[derive(Debug)]
pub(crate) struct LoadOutcome {
    pub key: CacheKey,
    pub ticket: Ticket,
    pub result: Result<(), LoadError>,
}

/// Internal state shared with in-flight loads.
#[derive(Default)]
struct LoadState {
    completed: Vec<LoadOutcome>,
    prefetching: HashSet<CacheKey>,
    prefetch_failures: u64,
}

/// Collaborators every load needs.
pub(crate) struct LoadContext<F, D: TextureDecoder> {
    pub fetcher: Rc<F>,
    pub decoder: Rc<D>,
    pub cache: Rc<RefCell<DatasetTextureCache<D>>>,
}

impl<F, D: TextureDecoder> Clone for LoadContext<F, D> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Rc::clone(&self.fetcher),
            decoder: Rc::clone(&self.decoder),
            cache: Rc::clone(&self.cache),
        }
    }
}

/// Channel between spawned loads and the update loop.
pub(crate) struct LoadChannel {
    state: Rc<RefCell<LoadState>>,
}

impl LoadChannel {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(LoadState::default())),
        }
    }

    /// Take every display outcome that completed since the last call.
    pub fn take_completed(&self) -> Vec<LoadOutcome> {
        std::mem::take(&mut self.state.borrow_mut().completed)
    }

    pub fn is_prefetching(&self, key: &CacheKey) -> bool {
        self.state.borrow().prefetching.contains(key)
    }

    pub fn prefetch_failures(&self) -> u64 {
        self.state.borrow().prefetch_failures
    }

    /// Spawn a ticketed load for the frame about to be displayed.
    pub fn load<F, D>(
        &self,
        spawner: &dyn LocalSpawn,
        ctx: LoadContext<F, D>,
        key: CacheKey,
        ticket: Ticket,
    ) -> Result<(), LoadError>
    where
        F: AssetFetcher + 'static,
        D: TextureDecoder + 'static,
    {
        let state = self.state.clone();

        spawner
            .spawn_local(async move {
                let result = load_frame(&ctx, Some(key.date), key.dataset)
                    .await
                    .map(|(loaded_key, entry)| store_if_absent(&ctx, loaded_key, entry));

                state
                    .borrow_mut()
                    .completed
                    .push(LoadOutcome { key, ticket, result });
            })
            .map_err(|e| LoadError::Spawn(e.to_string()))
    }

    /// Spawn a fire-and-forget load that only warms the cache.
    ///
    /// Failures are counted and logged at debug level, never surfaced.
    pub fn prefetch<F, D>(
        &self,
        spawner: &dyn LocalSpawn,
        ctx: LoadContext<F, D>,
        key: CacheKey,
    ) -> Result<(), LoadError>
    where
        F: AssetFetcher + 'static,
        D: TextureDecoder + 'static,
    {
        self.state.borrow_mut().prefetching.insert(key);
        let state = self.state.clone();

        let spawned = spawner.spawn_local(async move {
            match load_frame(&ctx, Some(key.date), key.dataset).await {
                Ok((loaded_key, entry)) => {
                    store_if_absent(&ctx, loaded_key, entry);
                    log::debug!("Prefetched frame {}", key);
                }
                Err(e) => {
                    log::debug!("Prefetch of {} failed: {}", key, e);
                    state.borrow_mut().prefetch_failures += 1;
                }
            }
            state.borrow_mut().prefetching.remove(&key);
        });

        spawned.map_err(|e| {
            self.state.borrow_mut().prefetching.remove(&key);
            LoadError::Spawn(e.to_string())
        })
    }
}

/// Fetch the latest available frame of a dataset and store it in the cache.
///
/// The key is taken from the metadata's calendar date.
pub(crate) async fn seed_latest<F, D>(
    ctx: &LoadContext<F, D>,
    dataset: Dataset,
) -> Result<CacheKey, LoadError>
where
    F: AssetFetcher,
    D: TextureDecoder,
{
    let (key, entry) = load_frame(ctx, None, dataset).await?;
    store_if_absent(ctx, key, entry);
    log::info!("Seeded cache with latest frame {}", key);
    Ok(key)
}

/// Fetch, validate, decode and warm one frame.
async fn load_frame<F, D>(
    ctx: &LoadContext<F, D>,
    date: Option<NaiveDate>,
    dataset: Dataset,
) -> Result<(CacheKey, CacheEntry<D::Handle>), LoadError>
where
    F: AssetFetcher,
    D: TextureDecoder,
{
    let assets = ctx.fetcher.fetch(date, dataset).await?;
    let published = assets.metadata.calendar_date();

    let date = match (date, published) {
        (Some(requested), Some(received)) if requested != received => {
            return Err(LoadError::DateMismatch {
                requested,
                received,
            });
        }
        (Some(requested), _) => requested,
        (None, Some(received)) => received,
        (None, None) => {
            return Err(LoadError::fetch(None, "metadata carries no valid date"));
        }
    };

    let texture = ctx.decoder.decode(assets.image).await?;
    if let Err(e) = ctx.decoder.warm(&texture) {
        log::debug!("Failed to warm texture for {}: {}", date, e);
    }

    Ok((
        CacheKey::new(date, dataset),
        CacheEntry::new(texture, assets.metadata),
    ))
}

/// Store a freshly loaded frame unless another load already cached it.
///
/// The existing entry may be on screen, so the duplicate is released
/// instead of replacing it.
fn store_if_absent<F, D: TextureDecoder>(
    ctx: &LoadContext<F, D>,
    key: CacheKey,
    entry: CacheEntry<D::Handle>,
) {
    let mut cache = ctx.cache.borrow_mut();
    if cache.has(&key) {
        drop(cache);
        log::debug!("Frame {} already cached, releasing duplicate", key);
        if let Err(e) = ctx.decoder.dispose(&entry.texture) {
            log::warn!("Failed to dispose duplicate texture for {}: {}", key, e);
        }
        return;
    }
    cache.set(key, entry);
}
