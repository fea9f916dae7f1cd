#![warn(clippy::all)]

//! SST Globe demo - drives the playback core against a synthetic data source.
//!
//! Plays ten days of data on a simulated 60 Hz clock and logs each frame the
//! globe would show. One day is missing from the synthetic bucket, so the run
//! also shows the failure notice. Pass a settings JSON path as the first
//! argument to override the defaults; set `RUST_LOG=debug` to see the
//! scheduler's decisions.

// Native entry point
#[cfg(not(target_arch = "wasm32"))]
fn main() {
    demo::run();
}

// WASM builds use the library directly; main is not called on wasm32
#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use chrono::{Datelike, NaiveDate};
    use futures_executor::LocalPool;
    use sst_globe::data::{parse_dates, ColormapConfig};
    use sst_globe::texture::TextureError;
    use sst_globe::{
        AssetFetcher, CacheKey, Dataset, FetchedAssets, LoadError, Metadata, PlaybackScheduler,
        PlaybackSettings, PlaybackSignals, RenderTarget, TextureDecoder,
    };
    use std::cell::Cell;
    use std::path::Path;
    use std::time::Duration;
    use web_time::Instant;

    const FRAME: Duration = Duration::from_millis(16);
    const SIMULATED_FRAMES: u32 = 600;
    const MISSING_DAY: u32 = 8;
    /// Sea surface temperature whose legend position is logged per frame.
    const SAMPLE_CELSIUS: f64 = 20.0;

    /// Bucket that publishes every day of January 2020 except one.
    struct SyntheticBucket;

    impl AssetFetcher for SyntheticBucket {
        async fn fetch(
            &self,
            date: Option<NaiveDate>,
            dataset: Dataset,
        ) -> Result<FetchedAssets, LoadError> {
            let latest = NaiveDate::from_ymd_opt(2020, 1, 31)
                .ok_or_else(|| LoadError::fetch(None, "invalid latest date"))?;
            let day = date.unwrap_or(latest);
            if day.day() == MISSING_DAY {
                return Err(LoadError::fetch(date, "404 Not Found"));
            }

            let metadata = Metadata {
                cmap: vec![
                    (-2.0, "#313695".to_string()),
                    (15.0, "#ffffbf".to_string()),
                    (32.0, "#a50026".to_string()),
                ],
                title: format!("{} {}", dataset, day),
                dataset: dataset.label().to_string(),
                date: day.format("%Y-%m-%d").to_string(),
                year: day.year(),
                month: day.month(),
                day: day.day(),
                ..Default::default()
            };
            Ok(FetchedAssets::new(day.to_string().into_bytes(), metadata))
        }
    }

    /// Hands out sequential texture ids and counts live ones.
    #[derive(Default)]
    struct CountingGpu {
        next_id: Cell<u64>,
        live: Cell<usize>,
    }

    impl TextureDecoder for CountingGpu {
        type Handle = u64;

        async fn decode(&self, image: Vec<u8>) -> Result<u64, LoadError> {
            if image.is_empty() {
                return Err(LoadError::Decode("empty image".to_string()));
            }
            let id = self.next_id.get() + 1;
            self.next_id.set(id);
            self.live.set(self.live.get() + 1);
            Ok(id)
        }

        fn warm(&self, _texture: &u64) -> Result<(), TextureError> {
            Ok(())
        }

        fn dispose(&self, _texture: &u64) -> Result<(), TextureError> {
            let live = self.live.get();
            if live == 0 {
                return Err(TextureError::Released);
            }
            self.live.set(live - 1);
            Ok(())
        }
    }

    /// Logs each frame instead of drawing it.
    #[derive(Default)]
    struct LoggingGlobe {
        frames_shown: usize,
    }

    impl RenderTarget<u64> for LoggingGlobe {
        fn show_frame(&mut self, key: &CacheKey, texture: &u64, metadata: &Metadata) {
            self.frames_shown += 1;
            let legend = ColormapConfig::for_dataset(key.dataset, metadata);
            log::info!(
                "Globe shows {} (texture {}, legend \"{}\" with {} stops)",
                key,
                texture,
                legend.title,
                legend.domains.len()
            );
            if let Some((stop, blend)) = legend.locate(SAMPLE_CELSIUS) {
                let colour = legend.ranges.get(stop).map_or("?", String::as_str);
                log::debug!("{} °C sits {:.2} past stop {}", SAMPLE_CELSIUS, blend, colour);
            }
        }
    }

    pub fn run() {
        env_logger::init();

        let settings = match std::env::args().nth(1) {
            Some(path) => PlaybackSettings::load(Path::new(&path)),
            None => PlaybackSettings::default(),
        };

        let mut pool = LocalPool::new();
        let (mut scheduler, mut requests) = PlaybackScheduler::new(
            SyntheticBucket,
            CountingGpu::default(),
            LoggingGlobe::default(),
            pool.spawner(),
            settings.clone(),
        );

        match pool.run_until(scheduler.seed_latest(Dataset::Temperature)) {
            Ok(key) => log::info!("Latest published frame is {}", key),
            Err(e) => log::warn!("Could not seed the cache: {}", e),
        }

        let listing: Vec<String> = (1..=10).map(|d| format!("2020-01-{:02}", d)).collect();
        let mut signals = PlaybackSignals::new(parse_dates(&listing), Dataset::Temperature);
        signals.animation_interval = settings.frame_interval();
        signals.is_animating = true;

        let start = Instant::now();
        for frame in 0..SIMULATED_FRAMES {
            let now = start + FRAME * frame;

            pool.run_until_stalled();
            while let Ok(Some(request)) = requests.try_next() {
                signals.apply(request);
            }
            scheduler.update(&signals, now);

            if let Some(message) = scheduler.error_message() {
                log::trace!("Notice: {}", message);
            }
            if frame == SIMULATED_FRAMES / 2 && !signals.is_animating {
                log::info!("Restarting playback after {:?}", now - start);
                signals.step_forward();
                signals.toggle_playback();
            }
        }

        log::info!(
            "Showed {} frames over {:?}",
            scheduler.render_target().frames_shown,
            FRAME * SIMULATED_FRAMES
        );
        log::info!("{}", scheduler.stats().summary());
        scheduler.shutdown();
    }
}
