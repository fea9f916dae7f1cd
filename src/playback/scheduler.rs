//! Playback scheduler for the globe.
//!
//! The scheduler is polled once per rendered frame with the current
//! `PlaybackSignals` and the frame time. It keeps the render target on the
//! selected `(date, dataset)`, loads missing frames through the fence,
//! prefetches the next day while animating, and paces advances through the
//! date sequence. Time is only ever read from the `now` argument, so every
//! deadline is deterministic for a given sequence of calls.

use super::fence::{RequestFence, Ticket};
use super::loader::{self, LoadChannel, LoadContext, LoadOutcome};
use super::notice::ErrorNotice;
use crate::data::{AssetFetcher, CacheKey, Dataset, LoadError};
use crate::state::{PlaybackSettings, PlaybackSignals, SessionStats, StateRequest};
use crate::texture::{DatasetTextureCache, RenderTarget, TextureDecoder};
use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures_util::task::LocalSpawn;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use web_time::Instant;

/// Where the scheduler is in the display/advance cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackPhase {
    /// Not animating; the last applied frame stays on screen.
    Idle,

    /// A ticketed load for `key` is in flight.
    LoadingFrame { key: CacheKey, ticket: Ticket },

    /// The current frame is shown and playback is waiting to advance.
    ///
    /// Until `advance_at` is known the scheduler polls the cache for the
    /// next frame; `attempts` counts polls since `entered`.
    WaitingForNextFrame {
        next_index: usize,
        entered: Instant,
        attempts: u32,
        next_poll: Instant,
        advance_at: Option<Instant>,
    },

    /// Holding the last frame of the sequence before looping to the start.
    Paused { next_index: usize, resume_at: Instant },

    /// The active load failed; the notice is visible until `until`.
    ErrorBackoff { until: Instant },
}

/// Signal values seen on the previous update.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Observed {
    key: Option<CacheKey>,
    index: usize,
    animating: bool,
}

/// Drives frame display and animation pacing.
pub struct PlaybackScheduler<F, D: TextureDecoder, R> {
    fetcher: Rc<F>,
    decoder: Rc<D>,
    cache: Rc<RefCell<DatasetTextureCache<D>>>,
    spawner: Box<dyn LocalSpawn>,
    loads: LoadChannel,
    fence: RequestFence,
    requests: UnboundedSender<StateRequest>,
    render_target: R,
    settings: PlaybackSettings,
    phase: PlaybackPhase,
    observed: Option<Observed>,
    displayed: Option<CacheKey>,
    notice: Option<ErrorNotice>,
    stats: SessionStats,
}

impl<F, D, R> PlaybackScheduler<F, D, R>
where
    F: AssetFetcher + 'static,
    D: TextureDecoder + 'static,
    R: RenderTarget<D::Handle>,
{
    /// Creates a scheduler and the receiving end of its state requests.
    ///
    /// The owner of `PlaybackSignals` drains the receiver and applies each
    /// request before the next `update`.
    pub fn new(
        fetcher: F,
        decoder: D,
        render_target: R,
        spawner: impl LocalSpawn + 'static,
        settings: PlaybackSettings,
    ) -> (Self, UnboundedReceiver<StateRequest>) {
        let decoder = Rc::new(decoder);
        let cache = DatasetTextureCache::new(decoder.clone(), settings.cache_capacity);
        let (requests, receiver) = mpsc::unbounded();

        log::info!(
            "Playback scheduler ready (cache capacity {}, max wait {:?})",
            cache.max_size(),
            settings.max_wait()
        );

        let scheduler = Self {
            fetcher: Rc::new(fetcher),
            decoder,
            cache: Rc::new(RefCell::new(cache)),
            spawner: Box::new(spawner),
            loads: LoadChannel::new(),
            fence: RequestFence::new(),
            requests,
            render_target,
            settings,
            phase: PlaybackPhase::Idle,
            observed: None,
            displayed: None,
            notice: None,
            stats: SessionStats::default(),
        };
        (scheduler, receiver)
    }

    /// Advance the state machine to `now`.
    ///
    /// Call once per rendered frame, after applying any pending
    /// `StateRequest`s to `signals`.
    pub fn update(&mut self, signals: &PlaybackSignals, now: Instant) {
        self.expire_notice(now);
        self.observe(signals, now);
        self.drain_loads(signals, now);
        self.tick_timers(signals, now);
    }

    /// Fetch the latest published frame of a dataset into the cache.
    ///
    /// Used at startup, before the dates listing is known.
    pub fn seed_latest(
        &self,
        dataset: Dataset,
    ) -> impl Future<Output = Result<CacheKey, LoadError>> + 'static {
        let ctx = self.context();
        async move { loader::seed_latest(&ctx, dataset).await }
    }

    /// Release every cached texture and forget pending timers.
    pub fn shutdown(&mut self) {
        log::info!("Shutting down playback: {}", self.stats().summary());
        self.cache.borrow_mut().clear();
        self.phase = PlaybackPhase::Idle;
        self.observed = None;
        self.displayed = None;
        self.notice = None;
    }

    pub fn phase(&self) -> &PlaybackPhase {
        &self.phase
    }

    /// The visible load-failure message, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.notice.as_ref().map(|n| n.message.as_str())
    }

    /// Frame currently published to the render target.
    pub fn displayed(&self) -> Option<CacheKey> {
        self.displayed
    }

    pub fn cache(&self) -> &Rc<RefCell<DatasetTextureCache<D>>> {
        &self.cache
    }

    pub fn render_target(&self) -> &R {
        &self.render_target
    }

    pub fn render_target_mut(&mut self) -> &mut R {
        &mut self.render_target
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            cache: self.cache.borrow().stats(),
            prefetch_failures: self.loads.prefetch_failures(),
            ..self.stats
        }
    }

    fn context(&self) -> LoadContext<F, D> {
        LoadContext {
            fetcher: Rc::clone(&self.fetcher),
            decoder: Rc::clone(&self.decoder),
            cache: Rc::clone(&self.cache),
        }
    }

    fn request(&self, request: StateRequest) {
        if self.requests.unbounded_send(request).is_err() {
            log::warn!("Dropping {:?}: state owner is gone", request);
        }
    }

    fn expire_notice(&mut self, now: Instant) {
        if self.notice.as_ref().is_some_and(|n| n.is_expired(now)) {
            log::debug!("Clearing load failure notice");
            self.notice = None;
        }
        if let PlaybackPhase::ErrorBackoff { until } = self.phase {
            if now >= until {
                self.phase = PlaybackPhase::Idle;
            }
        }
    }

    /// React to changes of the externally owned signals.
    fn observe(&mut self, signals: &PlaybackSignals, now: Instant) {
        let current = Observed {
            key: signals.current_key(),
            index: signals.current_date_index,
            animating: signals.is_animating,
        };
        let previous = self.observed.replace(current);
        if previous == Some(current) {
            return;
        }

        let frame_changed =
            previous.map_or(true, |p| p.key != current.key || p.index != current.index);
        let animating_changed = previous.map_or(true, |p| p.animating != current.animating);

        if frame_changed {
            match current.key {
                Some(key) => self.begin_load(key, signals, now),
                None => {
                    self.fence.issue();
                    self.phase = PlaybackPhase::Idle;
                }
            }
        } else if animating_changed {
            if current.animating {
                let in_flight = matches!(
                    self.phase,
                    PlaybackPhase::LoadingFrame { key, .. } if Some(key) == current.key
                );
                if let (Some(key), false) = (current.key, in_flight) {
                    self.begin_load(key, signals, now);
                }
            } else if matches!(
                self.phase,
                PlaybackPhase::WaitingForNextFrame { .. } | PlaybackPhase::Paused { .. }
            ) {
                log::debug!("Animation stopped, cancelling pending advance");
                self.phase = PlaybackPhase::Idle;
            }
        }

        self.prefetch_next(signals);
    }

    /// Show `key` from the cache, or start a ticketed load for it.
    ///
    /// A ticket is issued either way so loads still in flight for earlier
    /// frames can no longer apply.
    fn begin_load(&mut self, key: CacheKey, signals: &PlaybackSignals, now: Instant) {
        let ticket = self.fence.issue();
        if self.present(&key) {
            self.frame_applied(signals, now);
            return;
        }

        self.stats.loads_issued += 1;
        self.phase = PlaybackPhase::LoadingFrame { key, ticket };
        log::debug!("Loading frame {} ({})", key, ticket);

        if let Err(e) = self
            .loads
            .load(self.spawner.as_ref(), self.context(), key, ticket)
        {
            self.fail(key, e, signals, now);
        }
    }

    /// Publish a cached frame to the render target.
    ///
    /// Returns false if the frame is not cached.
    fn present(&mut self, key: &CacheKey) -> bool {
        let mut cache = self.cache.borrow_mut();
        let Some(entry) = cache.get(key) else {
            return false;
        };
        self.render_target
            .show_frame(key, &entry.texture, &entry.metadata);
        drop(cache);

        log::debug!("Showing frame {}", key);
        self.displayed = Some(*key);
        self.notice = None;
        true
    }

    fn frame_applied(&mut self, signals: &PlaybackSignals, now: Instant) {
        match signals.next_index() {
            Some(next_index) if signals.is_animating && signals.has_multiple_dates() => {
                self.phase = PlaybackPhase::WaitingForNextFrame {
                    next_index,
                    entered: now,
                    attempts: 0,
                    next_poll: now,
                    advance_at: None,
                };
            }
            _ => self.phase = PlaybackPhase::Idle,
        }
    }

    fn fail(&mut self, key: CacheKey, error: LoadError, signals: &PlaybackSignals, now: Instant) {
        log::warn!("Failed to load frame {}: {}", key, error);
        self.stats.load_failures += 1;

        let until = now + self.settings.error_display();
        self.notice = Some(ErrorNotice::unavailable(key.date, until));
        if signals.is_animating {
            log::info!("Stopping animation on unavailable frame {}", key);
            self.request(StateRequest::SetAnimating(false));
        }
        self.phase = PlaybackPhase::ErrorBackoff { until };
    }

    /// Apply or discard every load that completed since the last update.
    fn drain_loads(&mut self, signals: &PlaybackSignals, now: Instant) {
        for LoadOutcome {
            key,
            ticket,
            result,
        } in self.loads.take_completed()
        {
            if !self.fence.is_current(ticket) {
                self.stats.stale_discards += 1;
                log::trace!("Discarding superseded load of {} ({})", key, ticket);
                continue;
            }

            match result {
                Ok(()) => {
                    if self.present(&key) {
                        self.frame_applied(signals, now);
                    } else {
                        log::debug!("Frame {} left the cache before display, reloading", key);
                        self.begin_load(key, signals, now);
                    }
                }
                Err(e) => self.fail(key, e, signals, now),
            }
        }
    }

    /// Fire-and-forget load of the frame playback will advance to.
    fn prefetch_next(&mut self, signals: &PlaybackSignals) {
        if !signals.is_animating || !signals.has_multiple_dates() {
            return;
        }
        let Some(next_key) = signals.next_index().and_then(|i| signals.key_at(i)) else {
            return;
        };
        if self.cache.borrow().has(&next_key) || self.loads.is_prefetching(&next_key) {
            return;
        }
        if matches!(self.phase, PlaybackPhase::LoadingFrame { key, .. } if key == next_key) {
            return;
        }

        self.stats.prefetches_issued += 1;
        log::debug!("Prefetching frame {}", next_key);
        if let Err(e) = self
            .loads
            .prefetch(self.spawner.as_ref(), self.context(), next_key)
        {
            log::debug!("Prefetch of {} not started: {}", next_key, e);
        }
    }

    /// Inter-frame delay, plus the loop pause when leaving the last frame.
    fn pacing_delay(&self, signals: &PlaybackSignals) -> Duration {
        if signals.is_at_end() {
            signals.animation_interval + self.settings.loop_pause()
        } else {
            signals.animation_interval
        }
    }

    fn tick_timers(&mut self, signals: &PlaybackSignals, now: Instant) {
        match self.phase {
            PlaybackPhase::WaitingForNextFrame {
                next_index,
                advance_at: Some(at),
                ..
            } => {
                if now >= at {
                    self.advance(next_index);
                }
            }
            PlaybackPhase::WaitingForNextFrame {
                next_index,
                entered,
                next_poll,
                advance_at: None,
                ..
            } => {
                if now >= next_poll {
                    self.poll_next_frame(signals, next_index, entered, now);
                }
            }
            PlaybackPhase::Paused {
                next_index,
                resume_at,
            } => {
                if now >= resume_at {
                    self.advance(next_index);
                }
            }
            _ => {}
        }
    }

    /// Check whether the next frame has landed; schedule or force the advance.
    fn poll_next_frame(
        &mut self,
        signals: &PlaybackSignals,
        next_index: usize,
        entered: Instant,
        now: Instant,
    ) {
        let Some(next_key) = signals.key_at(next_index) else {
            self.phase = PlaybackPhase::Idle;
            return;
        };

        let poll = self.settings.poll_interval();
        let attempts = elapsed_polls(entered, now, poll).min(self.settings.max_poll_attempts);

        if self.cache.borrow().has(&next_key) {
            let due = (entered + self.pacing_delay(signals)).max(now);
            if due <= now {
                self.advance(next_index);
            } else if signals.is_at_end() {
                log::debug!("Holding last frame until {:?} before looping", due - now);
                self.phase = PlaybackPhase::Paused {
                    next_index,
                    resume_at: due,
                };
            } else {
                self.phase = PlaybackPhase::WaitingForNextFrame {
                    next_index,
                    entered,
                    attempts,
                    next_poll: due,
                    advance_at: Some(due),
                };
            }
            return;
        }

        if attempts >= self.settings.max_poll_attempts {
            log::warn!(
                "Frame {} not ready after {} checks, advancing anyway",
                next_key,
                attempts
            );
            self.advance(next_index);
            return;
        }

        self.phase = PlaybackPhase::WaitingForNextFrame {
            next_index,
            entered,
            attempts,
            next_poll: entered + poll * (attempts + 1),
            advance_at: None,
        };
    }

    fn advance(&mut self, next_index: usize) {
        log::trace!("Advancing to date index {}", next_index);
        self.request(StateRequest::SetDateIndex(next_index));
        self.phase = PlaybackPhase::Idle;
    }
}

/// Whole poll intervals elapsed between `entered` and `now`.
fn elapsed_polls(entered: Instant, now: Instant, poll: Duration) -> u32 {
    let elapsed = now.saturating_duration_since(entered).as_nanos();
    let polls = elapsed / poll.as_nanos().max(1);
    polls.min(u32::MAX as u128) as u32
}
