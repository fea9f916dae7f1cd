//! End-to-end playback tests on a simulated clock.
//!
//! The harness plays the host's role: it runs spawned loads, calls
//! `update`, and applies the scheduler's state requests in between.

use chrono::{Datelike, NaiveDate};
use futures_channel::mpsc::UnboundedReceiver;
use futures_channel::oneshot;
use futures_executor::LocalPool;
use sst_globe::texture::TextureError;
use sst_globe::{
    AssetFetcher, CacheKey, Dataset, FetchedAssets, LoadError, Metadata, PlaybackPhase,
    PlaybackScheduler, PlaybackSettings, PlaybackSignals, RenderTarget, StateRequest,
    TextureDecoder,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;
use web_time::Instant;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
}

fn temperature(d: u32) -> CacheKey {
    CacheKey::new(day(d), Dataset::Temperature)
}

#[derive(Default)]
struct BucketState {
    requested: Vec<CacheKey>,
    missing: HashSet<NaiveDate>,
    gates: HashMap<NaiveDate, oneshot::Receiver<()>>,
}

/// Remote bucket whose objects can be held back or removed per day.
struct FakeBucket {
    state: Rc<RefCell<BucketState>>,
}

impl AssetFetcher for FakeBucket {
    async fn fetch(
        &self,
        date: Option<NaiveDate>,
        dataset: Dataset,
    ) -> Result<FetchedAssets, LoadError> {
        let d = date.ok_or_else(|| LoadError::fetch(None, "no latest in fake bucket"))?;
        self.state
            .borrow_mut()
            .requested
            .push(CacheKey::new(d, dataset));

        let gate = self.state.borrow_mut().gates.remove(&d);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if self.state.borrow().missing.contains(&d) {
            return Err(LoadError::fetch(date, "404 Not Found"));
        }
        let metadata = Metadata {
            year: d.year(),
            month: d.month(),
            day: d.day(),
            ..Default::default()
        };
        Ok(FetchedAssets::new(vec![0x89, 0x50, 0x4e, 0x47], metadata))
    }
}

#[derive(Default)]
struct GpuLog {
    next_id: u32,
    live: HashSet<u32>,
    disposed: Vec<u32>,
    double_disposals: usize,
}

struct FakeGpu {
    log: Rc<RefCell<GpuLog>>,
}

impl TextureDecoder for FakeGpu {
    type Handle = u32;

    async fn decode(&self, _image: Vec<u8>) -> Result<u32, LoadError> {
        let mut log = self.log.borrow_mut();
        log.next_id += 1;
        let id = log.next_id;
        log.live.insert(id);
        Ok(id)
    }

    fn warm(&self, _texture: &u32) -> Result<(), TextureError> {
        Ok(())
    }

    fn dispose(&self, texture: &u32) -> Result<(), TextureError> {
        let mut log = self.log.borrow_mut();
        log.disposed.push(*texture);
        if !log.live.remove(texture) {
            log.double_disposals += 1;
            return Err(TextureError::Released);
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingGlobe {
    shown: Vec<(CacheKey, u32)>,
}

impl RenderTarget<u32> for RecordingGlobe {
    fn show_frame(&mut self, key: &CacheKey, texture: &u32, _metadata: &Metadata) {
        self.shown.push((*key, *texture));
    }
}

struct Harness {
    pool: LocalPool,
    scheduler: PlaybackScheduler<FakeBucket, FakeGpu, RecordingGlobe>,
    requests: UnboundedReceiver<StateRequest>,
    signals: PlaybackSignals,
    applied: Vec<StateRequest>,
    bucket: Rc<RefCell<BucketState>>,
    gpu: Rc<RefCell<GpuLog>>,
    start: Instant,
}

impl Harness {
    fn new(days: &[u32], settings: PlaybackSettings) -> Self {
        let pool = LocalPool::new();
        let bucket = Rc::new(RefCell::new(BucketState::default()));
        let gpu = Rc::new(RefCell::new(GpuLog::default()));
        let (scheduler, requests) = PlaybackScheduler::new(
            FakeBucket {
                state: bucket.clone(),
            },
            FakeGpu { log: gpu.clone() },
            RecordingGlobe::default(),
            pool.spawner(),
            settings,
        );
        let dates = days.iter().map(|d| day(*d)).collect();

        Self {
            pool,
            scheduler,
            requests,
            signals: PlaybackSignals::new(dates, Dataset::Temperature),
            applied: Vec::new(),
            bucket,
            gpu,
            start: Instant::now(),
        }
    }

    /// Run one host frame at `ms` after the start of the test.
    fn at(&mut self, ms: u64) {
        let now = self.start + Duration::from_millis(ms);
        self.pool.run_until_stalled();
        self.scheduler.update(&self.signals, now);
        while let Ok(Some(request)) = self.requests.try_next() {
            self.signals.apply(request);
            self.applied.push(request);
        }
    }

    /// Hold back the fetch for a day until the returned sender fires.
    fn gate(&mut self, d: u32) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.bucket.borrow_mut().gates.insert(day(d), rx);
        tx
    }

    fn shown(&self) -> Vec<CacheKey> {
        self.scheduler
            .render_target()
            .shown
            .iter()
            .map(|(key, _)| *key)
            .collect()
    }
}

#[test]
fn test_temperature_playback_loops_with_pause() {
    let mut h = Harness::new(&[1, 2], PlaybackSettings::default());

    h.at(0);
    assert!(matches!(
        h.scheduler.phase(),
        PlaybackPhase::LoadingFrame { key, .. } if *key == temperature(1)
    ));
    h.at(0);
    assert_eq!(h.shown(), vec![temperature(1)]);
    assert_eq!(h.bucket.borrow().requested, vec![temperature(1)]);
    assert!(h.scheduler.cache().borrow().has(&temperature(1)));

    h.signals.is_animating = true;
    h.at(0);
    assert_eq!(h.scheduler.stats().prefetches_issued, 1);
    assert!(matches!(
        h.scheduler.phase(),
        PlaybackPhase::WaitingForNextFrame { next_index: 1, .. }
    ));

    h.at(50);
    assert!(h.bucket.borrow().requested.contains(&temperature(2)));
    assert!(h.scheduler.cache().borrow().has(&temperature(2)));
    assert!(h.applied.is_empty());

    // Next frame is ready; the advance waits for the frame interval
    h.at(100);
    assert_eq!(h.applied, vec![StateRequest::SetDateIndex(1)]);

    h.at(116);
    assert_eq!(h.scheduler.displayed(), Some(temperature(2)));
    assert!(matches!(
        h.scheduler.phase(),
        PlaybackPhase::Paused { next_index: 0, .. }
    ));

    // Last frame holds for interval + loop pause
    h.at(1215);
    assert_eq!(h.applied.len(), 1);
    h.at(1216);
    assert_eq!(h.applied.last(), Some(&StateRequest::SetDateIndex(0)));

    h.at(1232);
    assert_eq!(h.scheduler.displayed(), Some(temperature(1)));
    assert_eq!(h.scheduler.stats().loads_issued, 1);
    assert_eq!(h.bucket.borrow().requested.len(), 2);
}

#[test]
fn test_newer_load_wins_when_it_finishes_first() {
    let mut h = Harness::new(&[1, 2], PlaybackSettings::default());
    let gate1 = h.gate(1);
    let gate2 = h.gate(2);

    h.at(0);
    h.signals.current_date_index = 1;
    h.at(0);

    gate2.send(()).unwrap();
    h.at(10);
    assert_eq!(h.shown(), vec![temperature(2)]);

    gate1.send(()).unwrap();
    h.at(20);
    assert_eq!(h.shown(), vec![temperature(2)]);
    assert_eq!(h.scheduler.displayed(), Some(temperature(2)));
    assert_eq!(h.scheduler.stats().stale_discards, 1);
    assert_eq!(*h.scheduler.phase(), PlaybackPhase::Idle);
}

#[test]
fn test_superseded_load_is_discarded_when_it_finishes_first() {
    let mut h = Harness::new(&[1, 2], PlaybackSettings::default());
    let gate1 = h.gate(1);
    let gate2 = h.gate(2);

    h.at(0);
    h.signals.current_date_index = 1;
    h.at(0);

    gate1.send(()).unwrap();
    h.at(10);
    assert!(h.shown().is_empty());
    assert_eq!(h.scheduler.stats().stale_discards, 1);
    assert!(matches!(
        h.scheduler.phase(),
        PlaybackPhase::LoadingFrame { key, .. } if *key == temperature(2)
    ));

    gate2.send(()).unwrap();
    h.at(20);
    assert_eq!(h.shown(), vec![temperature(2)]);
    // The stale frame still landed in the cache
    assert!(h.scheduler.cache().borrow().has(&temperature(1)));
}

#[test]
fn test_advances_anyway_after_bounded_wait() {
    let settings = PlaybackSettings {
        max_poll_attempts: 5,
        ..Default::default()
    };
    let mut h = Harness::new(&[1, 2, 3], settings);
    let _held = h.gate(2);
    h.signals.is_animating = true;

    h.at(0);
    h.at(0);
    assert_eq!(h.scheduler.displayed(), Some(temperature(1)));

    for ms in [100, 200, 300, 400] {
        h.at(ms);
        assert!(h.applied.is_empty(), "advanced early at {}ms", ms);
    }

    h.at(500);
    assert_eq!(h.applied, vec![StateRequest::SetDateIndex(1)]);

    // The display load is not gated, unlike the stuck prefetch
    h.at(516);
    h.at(532);
    assert_eq!(h.scheduler.displayed(), Some(temperature(2)));
    assert_eq!(h.scheduler.stats().loads_issued, 2);
}

#[test]
fn test_missing_day_stops_animation_and_shows_notice() {
    let settings = PlaybackSettings {
        max_poll_attempts: 3,
        ..Default::default()
    };
    let mut h = Harness::new(&[1, 2], settings);
    h.bucket.borrow_mut().missing.insert(day(2));
    h.signals.is_animating = true;

    h.at(0);
    h.at(0);
    assert_eq!(h.scheduler.displayed(), Some(temperature(1)));
    // Prefetch failures stay silent
    assert_eq!(h.scheduler.stats().prefetch_failures, 1);
    assert_eq!(h.scheduler.error_message(), None);

    h.at(100);
    h.at(200);
    assert!(h.applied.is_empty());
    h.at(300);
    assert_eq!(h.applied, vec![StateRequest::SetDateIndex(1)]);

    h.at(316);
    h.at(332);
    assert_eq!(
        h.scheduler.error_message(),
        Some("Data unavailable for 2020-01-02")
    );
    assert!(!h.signals.is_animating);
    assert!(matches!(
        h.scheduler.phase(),
        PlaybackPhase::ErrorBackoff { .. }
    ));
    assert_eq!(h.scheduler.displayed(), Some(temperature(1)));
    assert_eq!(h.scheduler.stats().load_failures, 1);

    h.at(3331);
    assert!(h.scheduler.error_message().is_some());
    h.at(3332);
    assert_eq!(h.scheduler.error_message(), None);
    assert_eq!(*h.scheduler.phase(), PlaybackPhase::Idle);
    assert_eq!(h.signals.current_date_index, 1);
}

#[test]
fn test_evicted_textures_are_disposed_once() {
    let settings = PlaybackSettings {
        cache_capacity: 2,
        ..Default::default()
    };
    let mut h = Harness::new(&[1, 2, 3], settings);

    for index in 0..3 {
        h.signals.current_date_index = index;
        h.at(0);
        h.at(0);
    }
    assert_eq!(h.shown(), vec![temperature(1), temperature(2), temperature(3)]);

    let first_texture = h.scheduler.render_target().shown[0].1;
    assert!(!h.scheduler.cache().borrow().has(&temperature(1)));
    assert_eq!(h.gpu.borrow().disposed, vec![first_texture]);
    assert_eq!(h.gpu.borrow().live.len(), 2);

    h.scheduler.shutdown();
    assert!(h.gpu.borrow().live.is_empty());
    assert_eq!(h.gpu.borrow().double_disposals, 0);
}

#[test]
fn test_datasets_are_cached_separately() {
    let mut h = Harness::new(&[1], PlaybackSettings::default());

    h.at(0);
    h.at(0);
    h.signals.toggle_dataset();
    h.at(0);
    h.at(0);

    let anomaly = CacheKey::new(day(1), Dataset::TempAnomaly);
    assert_eq!(h.shown(), vec![temperature(1), anomaly]);
    assert_eq!(h.scheduler.cache().borrow().len(), 2);

    // Switching back is a cache hit
    h.signals.toggle_dataset();
    h.at(0);
    assert_eq!(h.scheduler.displayed(), Some(temperature(1)));
    assert_eq!(h.bucket.borrow().requested.len(), 2);
}

#[test]
fn test_cached_frame_supersedes_slower_load() {
    let mut h = Harness::new(&[1, 2], PlaybackSettings::default());
    h.signals.current_date_index = 1;
    h.at(0);
    h.at(0);
    assert_eq!(h.scheduler.displayed(), Some(temperature(2)));

    let gate1 = h.gate(1);
    h.signals.current_date_index = 0;
    h.at(0);
    h.at(0);
    assert!(matches!(
        h.scheduler.phase(),
        PlaybackPhase::LoadingFrame { key, .. } if *key == temperature(1)
    ));

    // Back to a cached frame while day 1 is still loading
    h.signals.current_date_index = 1;
    h.at(10);
    assert_eq!(h.scheduler.displayed(), Some(temperature(2)));

    gate1.send(()).unwrap();
    h.at(20);
    assert_eq!(h.scheduler.displayed(), Some(temperature(2)));
    assert_eq!(h.shown(), vec![temperature(2), temperature(2)]);
    assert_eq!(h.scheduler.stats().stale_discards, 1);
    assert_eq!(h.signals.current_date_index, 1);
}

#[test]
fn test_emptied_dates_supersede_in_flight_load() {
    let mut h = Harness::new(&[1, 2], PlaybackSettings::default());
    let gate1 = h.gate(1);

    h.at(0);
    h.signals.dates.clear();
    h.at(0);
    assert_eq!(*h.scheduler.phase(), PlaybackPhase::Idle);

    gate1.send(()).unwrap();
    h.at(10);
    assert!(h.shown().is_empty());
    assert_eq!(h.scheduler.displayed(), None);
    assert_eq!(h.scheduler.stats().stale_discards, 1);
    assert_eq!(*h.scheduler.phase(), PlaybackPhase::Idle);
}

#[test]
fn test_manual_date_change_cancels_pending_advance() {
    let mut h = Harness::new(&[1, 2, 3], PlaybackSettings::default());
    h.signals.is_animating = true;

    h.at(0);
    h.at(0);
    assert!(matches!(
        h.scheduler.phase(),
        PlaybackPhase::WaitingForNextFrame {
            next_index: 1,
            advance_at: Some(_),
            ..
        }
    ));

    // Jump to the last day before the scheduled advance at 100ms
    h.signals.current_date_index = 2;
    h.at(50);
    h.at(150);
    assert_eq!(h.scheduler.displayed(), Some(temperature(3)));
    assert!(!h.applied.contains(&StateRequest::SetDateIndex(1)));
    assert!(h.applied.is_empty());
    assert!(matches!(
        h.scheduler.phase(),
        PlaybackPhase::Paused { next_index: 0, .. }
    ));
}
