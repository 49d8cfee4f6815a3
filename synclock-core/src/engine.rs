//! The synced clock engine.
//!
//! `SyncedClock` is a cheap, cloneable handle. Shared state sits behind
//! critical sections that are entered from both the timer-fire path and the
//! foreground; the user callback, event emission and staged submissions
//! always run with no engine lock held, so the callback may call back into
//! the engine.
//!
//! Lock order: clock state, then tap tracker or telemetry. The gate has its
//! own section and is never held across an update.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use synclock_types::{
    clamp_divisor, clamp_multiplier, clamp_period, ClockConfig, ClockEvent, HeartbeatState,
};

use crate::config::EngineSettings;
use crate::critical::CriticalSection;
use crate::event_log::{EventLogReader, EventLogWriter};
use crate::gate::{Admission, ConfigGate, ConfigPatch};
use crate::intervals::IntervalTable;
use crate::phase::PhaseState;
use crate::position::{self, adjust_position, Placement};
use crate::scheduler::{FireFn, HeartbeatScheduler, TickSource};
use crate::tap::{TapOutcome, TapTracker};
use crate::telemetry::{ClockTelemetry, TelemetrySummary};

/// User callback run on every delivered pulse.
pub type PulseFn = Box<dyn Fn() + Send + Sync>;

struct ClockState {
    config: ClockConfig,
    table: IntervalTable,
    phase: PhaseState,
    scheduler: Box<dyn HeartbeatScheduler>,
    current_index: u8,
    ticks_in_interval: u32,
    /// Tick at which the timer was last programmed, and for how long.
    armed_at: u64,
    armed_ticks: u32,
    last_fire: u64,
    has_fired: bool,
    running: bool,
    /// Position reads are frozen at this tick while stopped.
    stopped_at: Option<u64>,
    /// Div/mult change waiting for the next wrap to slot 0.
    staged: Option<ConfigPatch>,
}

impl ClockState {
    fn heartbeat(&self, now: u64) -> HeartbeatState {
        let deadline = self.armed_at + self.armed_ticks as u64;
        HeartbeatState {
            current_index: self.current_index,
            ticks_in_interval: self.ticks_in_interval,
            ticks_remaining: deadline.saturating_sub(now).min(u32::MAX as u64) as u32,
            last_fire: self.last_fire,
        }
    }

    fn position(&self, now: u64) -> u32 {
        position::position(&self.table, &self.heartbeat(now))
    }

    /// Clock reading used for position math: frozen while stopped.
    fn clock_now(&self, now: u64) -> u64 {
        self.stopped_at.unwrap_or(now)
    }

    /// Program the timer (when running) and remember what was programmed.
    fn arm(&mut self, now: u64, ticks: u32) {
        self.armed_at = now;
        self.armed_ticks = ticks;
        if self.running {
            self.scheduler.reschedule(ticks);
        }
    }

    fn saved_config(&self) -> ClockConfig {
        ClockConfig {
            lock_enabled: self.phase.lock_enabled,
            ..self.config
        }
    }
}

struct Shared {
    state: CriticalSection<ClockState>,
    taps: CriticalSection<TapTracker>,
    telemetry: CriticalSection<ClockTelemetry>,
    gate: ConfigGate,
    ticks: Arc<dyn TickSource>,
    callback: PulseFn,
    events: EventLogWriter,
    reader: EventLogReader,
    coalesced: AtomicU64,
}

enum Pulse {
    Fired {
        index: u8,
        staged: Option<ConfigPatch>,
    },
    Suppressed {
        index: u8,
        since_last_fire: u64,
    },
}

/// Tap-synchronised heartbeat generator.
#[derive(Clone)]
pub struct SyncedClock {
    shared: Arc<Shared>,
}

impl SyncedClock {
    /// Build a stopped clock with default engine settings.
    pub fn new(
        config: ClockConfig,
        ticks: impl TickSource + 'static,
        scheduler: impl HeartbeatScheduler + 'static,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self::with_settings(config, EngineSettings::default(), ticks, scheduler, callback)
    }

    pub fn with_settings(
        config: ClockConfig,
        settings: EngineSettings,
        ticks: impl TickSource + 'static,
        scheduler: impl HeartbeatScheduler + 'static,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let config = config.sanitized();
        let table = IntervalTable::new(config.period_ticks, config.divisor, config.multiplier);
        let now = ticks.now();

        let last = config.multiplier - 1;
        let state = ClockState {
            config,
            phase: PhaseState::new(config.lock_enabled),
            scheduler: Box::new(scheduler),
            current_index: last,
            ticks_in_interval: table.slot(last),
            armed_at: now,
            armed_ticks: table.slot(last),
            last_fire: 0,
            has_fired: false,
            running: false,
            stopped_at: Some(now),
            staged: None,
            table,
        };

        let mut taps = TapTracker::new(config.period_ticks)
            .with_window(settings.averaging_taps)
            .with_disconnect_ticks(settings.disconnect_ticks);
        taps.set_divisor(config.divisor);

        let (events, reader) = EventLogWriter::with_capacity(settings.event_capacity);

        log::debug!(
            target: "clock::engine",
            "init div={} mult={} period={} lock={}",
            config.divisor,
            config.multiplier,
            config.period_ticks,
            config.lock_enabled
        );

        Self {
            shared: Arc::new(Shared {
                state: CriticalSection::new(state),
                taps: CriticalSection::new(taps),
                telemetry: CriticalSection::new(ClockTelemetry::new()),
                gate: ConfigGate::new(),
                ticks: Arc::new(ticks),
                callback: Box::new(callback),
                events,
                reader,
                coalesced: AtomicU64::new(0),
            }),
        }
    }

    fn now(&self) -> u64 {
        self.shared.ticks.now()
    }

    fn fire_fn(&self) -> FireFn {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                SyncedClock { shared }.on_heartbeat();
            }
        })
    }

    /// Arm the timer and deliver the first pulse of slot 0 right away.
    pub fn start(&self) {
        let now = self.now();
        let on_fire = self.fire_fn();
        let started = self.shared.state.with(|s| {
            if s.running {
                return false;
            }
            s.running = true;
            s.stopped_at = None;
            s.current_index = s.table.multiplier() - 1;
            let len = s.table.slot(s.current_index).max(1);
            s.ticks_in_interval = len;
            s.armed_at = now;
            s.armed_ticks = len;
            s.scheduler.schedule(len, on_fire);
            true
        });
        if !started {
            return;
        }
        log::info!(target: "clock::engine", "started at tick {}", now);
        self.shared.events.emit(ClockEvent::Started { at: now });
        self.fire(true);
    }

    /// Cancel the pending heartbeat.
    pub fn stop(&self) {
        let now = self.now();
        let stopped = self.shared.state.with(|s| {
            if !s.running {
                return false;
            }
            s.running = false;
            s.stopped_at = Some(now);
            s.scheduler.cancel();
            true
        });
        if stopped {
            log::info!(target: "clock::engine", "stopped at tick {}", now);
            self.shared.events.emit(ClockEvent::Stopped { at: now });
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.with(|s| s.running)
    }

    /// Timer expiry entry point, called by the scheduler's fire callback.
    pub fn on_heartbeat(&self) {
        self.fire(false);
    }

    fn fire(&self, forced: bool) {
        let now = self.now();
        let telemetry = &self.shared.telemetry;
        let pulse = self.shared.state.with(|s| {
            if !s.running {
                return None;
            }
            let since_last_fire = now.saturating_sub(s.last_fire);
            if !forced && s.has_fired && since_last_fire < s.table.quarter() as u64 {
                let len = s.table.slot(s.current_index).max(1);
                s.ticks_in_interval = len;
                s.arm(now, len);
                telemetry.with(|t| t.record_suppressed());
                return Some(Pulse::Suppressed {
                    index: s.current_index,
                    since_last_fire,
                });
            }

            let expected = (s.armed_at + s.armed_ticks as u64).saturating_sub(s.last_fire);
            let observed = s.has_fired.then_some(since_last_fire);
            telemetry.with(|t| t.record_fire(observed, expected.min(u32::MAX as u64) as u32));

            s.last_fire = now;
            s.has_fired = true;
            s.current_index = (s.current_index + 1) % s.table.multiplier();
            let len = s.table.slot(s.current_index).max(1);
            s.ticks_in_interval = len;
            s.arm(now, len);

            let staged = if s.current_index == 0 {
                s.staged.take()
            } else {
                None
            };
            Some(Pulse::Fired {
                index: s.current_index,
                staged,
            })
        });

        match pulse {
            None => {}
            Some(Pulse::Suppressed {
                index,
                since_last_fire,
            }) => {
                log::debug!(
                    target: "clock::heartbeat",
                    "suppressed fire for slot {} ({} ticks after last)",
                    index,
                    since_last_fire
                );
                self.shared.events.emit(ClockEvent::Suppressed {
                    index,
                    at: now,
                    since_last_fire,
                });
            }
            Some(Pulse::Fired { index, staged }) => {
                log::trace!(target: "clock::heartbeat", "fire slot {} at {}", index, now);
                self.shared.events.emit(ClockEvent::Fired { index, at: now });
                (self.shared.callback)();
                if let Some(patch) = staged {
                    self.submit(patch);
                }
            }
        }
    }

    /// Feed an external tap. Returns the current period estimate.
    pub fn process_tap(&self, timestamp: u64) -> u32 {
        let (outcome, period) = self.shared.taps.with(|t| {
            let outcome = t.ingest(timestamp);
            (outcome, t.period())
        });

        match outcome {
            TapOutcome::First | TapOutcome::Ignored => {
                log::trace!(target: "clock::tap", "tap at {} not measured ({:?})", timestamp, outcome);
            }
            TapOutcome::Disconnected { elapsed } => {
                log::info!(
                    target: "clock::tap",
                    "tap source disconnected ({} ticks since last tap), keeping period {}",
                    elapsed,
                    period
                );
                self.shared.telemetry.with(|t| t.record_disconnect());
                self.shared.events.emit(ClockEvent::Disconnected {
                    at: timestamp,
                    elapsed,
                });
            }
            TapOutcome::Accepted {
                interval,
                period,
                window_reset,
            } => {
                if window_reset {
                    log::debug!(target: "clock::tap", "tempo change, interval {} restarts averaging", interval);
                }
                self.shared.events.emit(ClockEvent::TapAccepted {
                    at: timestamp,
                    interval,
                    period,
                    window_reset,
                });
                self.submit(ConfigPatch::tap(period));
            }
        }
        period
    }

    pub fn update_divisor(&self, divisor: u8) {
        self.submit(ConfigPatch::divisor(divisor));
    }

    pub fn update_multiplier(&self, multiplier: u8) {
        self.submit(ConfigPatch::multiplier(multiplier));
    }

    /// Change divisor and multiplier together. When not immediate (and the
    /// clock is running) the change waits for the next wrap to slot 0, with
    /// later staged requests replacing earlier ones.
    pub fn update_div_mult(&self, divisor: u8, multiplier: u8, apply_immediately: bool) {
        let patch = ConfigPatch::div_mult(divisor, multiplier);
        let staged = !apply_immediately
            && self.shared.state.with(|s| {
                if !s.running {
                    return false;
                }
                s.staged = Some(s.staged.map_or(patch, |prev| prev.merge(patch)));
                true
            });
        if staged {
            log::debug!(target: "clock::gate", "staged div={} mult={} for next cycle", divisor, multiplier);
            self.shared.events.emit(ClockEvent::Staged {
                divisor: clamp_divisor(divisor),
                multiplier: clamp_multiplier(multiplier),
            });
        } else {
            self.submit(patch);
        }
    }

    pub fn set_lock_mode(&self, enabled: bool) {
        self.submit(ConfigPatch::lock(enabled));
    }

    /// Apply a stored record. `update_period` and `update_div_mult` select
    /// which fields are taken from `config`; the lock flag always is.
    /// `from_clock_context` marks a call made from the pulse callback, where
    /// the clock sits at the start of its current slot.
    pub fn load_config(
        &self,
        config: ClockConfig,
        update_period: bool,
        update_div_mult: bool,
        from_clock_context: bool,
    ) {
        let mut patch = ConfigPatch {
            lock_enabled: Some(config.lock_enabled),
            from_clock: from_clock_context,
            ..ConfigPatch::default()
        };
        if update_period {
            patch.period = Some(config.period_ticks);
            patch.reset_taps = true;
        }
        if update_div_mult {
            patch.divisor = Some(config.divisor);
            patch.multiplier = Some(config.multiplier);
        }
        self.submit(patch);
    }

    /// Current configuration as a persistable record.
    pub fn save_config(&self) -> ClockConfig {
        self.shared.state.with(|s| s.saved_config())
    }

    /// Route a patch through the gate, draining anything coalesced meanwhile.
    fn submit(&self, patch: ConfigPatch) {
        let mut next = match self.shared.gate.admit(patch) {
            Admission::Run(patch) => patch,
            Admission::Coalesced => {
                self.shared.coalesced.fetch_add(1, Ordering::Relaxed);
                log::debug!(target: "clock::gate", "update in flight, coalesced {:?}", patch);
                self.shared.events.emit(ClockEvent::Coalesced);
                return;
            }
        };
        loop {
            self.apply(next);
            match self.shared.gate.complete() {
                Some(pending) => next = pending,
                None => break,
            }
        }
    }

    /// One full update cycle: snapshot, apply, recompute, remap, reprogram.
    fn apply(&self, patch: ConfigPatch) {
        let now = self.now();
        let taps = &self.shared.taps;
        let (config, placement, at) = self.shared.state.with(|s| {
            let clock_now = s.clock_now(now);
            let saved = if patch.from_clock {
                s.table.offset_of(s.current_index)
            } else {
                s.position(clock_now)
            };

            if let Some(lock) = patch.lock_enabled {
                s.phase.set_lock(lock);
                s.config.lock_enabled = lock;
            }
            if let Some(divisor) = patch.divisor {
                s.config.divisor = clamp_divisor(divisor);
                taps.with(|t| t.set_divisor(s.config.divisor));
            }
            if let Some(multiplier) = patch.multiplier {
                let old = s.config.multiplier;
                let multiplier = clamp_multiplier(multiplier);
                if multiplier != old {
                    let (period, total) = (s.config.period_ticks, s.table.total());
                    let aligned = taps.with(|t| t.aligned_position(period, total, clock_now));
                    if let Some(aligned) = aligned {
                        s.phase.carry(saved, aligned, total);
                    }
                }
                s.config.multiplier = multiplier;
                if s.current_index >= multiplier {
                    s.current_index = 0;
                }
            }
            if let Some(period) = patch.period {
                s.config.period_ticks = period;
            }
            s.config.period_ticks = clamp_period(s.config.period_ticks, s.config.divisor);
            if patch.reset_taps {
                taps.with(|t| t.set_period(s.config.period_ticks));
            }

            s.table.recompute(s.config.period_ticks, s.config.divisor, s.config.multiplier);

            let target = if patch.align_to_tap {
                let sub_index = taps.with(|t| t.sub_index());
                s.phase
                    .tap_position(s.config.period_ticks, sub_index, s.table.total())
            } else {
                saved
            };
            let since_last_fire = clock_now.saturating_sub(s.last_fire);
            let placement = adjust_position(&s.table, target, since_last_fire);

            s.current_index = placement.index;
            s.ticks_in_interval = placement.ticks_in_interval;
            s.arm(clock_now, placement.remaining);

            (s.saved_config(), placement, clock_now)
        });

        self.shared.telemetry.with(|t| t.record_reconfigure());
        log::debug!(
            target: "clock::gate",
            "reconfigured div={} mult={} period={} -> slot {} in {} ticks",
            config.divisor,
            config.multiplier,
            config.period_ticks,
            placement.index,
            placement.remaining
        );
        self.shared.events.emit(ClockEvent::Reconfigured {
            config,
            index: placement.index,
            remaining: placement.remaining,
            at,
        });
    }

    /// Tick offset into the current output cycle.
    pub fn position(&self) -> u32 {
        let now = self.now();
        self.shared.state.with(|s| s.position(s.clock_now(now)))
    }

    pub fn heartbeat(&self) -> HeartbeatState {
        let now = self.now();
        self.shared.state.with(|s| s.heartbeat(s.clock_now(now)))
    }

    /// Where the heartbeat would land if `saved` were remapped onto the
    /// current table right now.
    pub fn placement_for(&self, saved: u32) -> Placement {
        let now = self.now();
        self.shared.state.with(|s| {
            let since = s.clock_now(now).saturating_sub(s.last_fire);
            adjust_position(&s.table, saved, since)
        })
    }

    /// Live slot durations.
    pub fn intervals(&self) -> Vec<u32> {
        self.shared.state.with(|s| s.table.slots().to_vec())
    }

    pub fn interval_table(&self) -> IntervalTable {
        self.shared.state.with(|s| s.table.clone())
    }

    pub fn phase(&self) -> PhaseState {
        self.shared.state.with(|s| s.phase)
    }

    /// Smoothed tap period, which may be ahead of the applied config while
    /// an update is coalesced.
    pub fn period_estimate(&self) -> u32 {
        self.shared.taps.with(|t| t.period())
    }

    pub fn has_staged_change(&self) -> bool {
        self.shared.state.with(|s| s.staged.is_some())
    }

    pub fn telemetry_summary(&self) -> TelemetrySummary {
        let mut summary = self.shared.telemetry.with(|t| t.take_summary());
        summary.coalesced = self.shared.coalesced.load(Ordering::Relaxed);
        summary
    }

    /// Reader for the engine's event log. Clones share one queue.
    pub fn events(&self) -> EventLogReader {
        self.shared.reader.clone()
    }
}
