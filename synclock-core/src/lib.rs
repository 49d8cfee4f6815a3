//! # synclock-core
//!
//! Tap-synchronised clock engine. Tracks the tempo of an irregular external
//! pulse train and emits a steady heartbeat that is a divided or multiplied
//! version of it, staying phase-continuous while tempo, subdivision and lock
//! mode change under it.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use synclock_core::{SimTicks, SimTimer, SyncedClock};
//! use synclock_core::config::Config;
//!
//! let config = Config::load();
//! let ticks = SimTicks::new();
//! let timer = SimTimer::new(ticks.clone());
//! let clock = SyncedClock::with_settings(config.clock(), config.engine(), ticks, timer.clone(), || {
//!     // runs on every heartbeat
//! });
//! clock.start();
//! clock.process_tap(1_000);
//! timer.advance(500);
//! ```
//!
//! ## Module Overview
//!
//! - [`tap`]: tap interval averaging with jitter and disconnect rejection
//! - [`intervals`]: fixed-point slot table with an exact-sum invariant
//! - [`position`]: cycle position and near-boundary remapping
//! - [`phase`]: free-run phase carry across multiplier changes
//! - [`gate`]: single-writer update arbitration with coalescing
//! - [`engine`]: `SyncedClock`, wiring the above to a timer
//! - [`scheduler`]: timer and tick-counter seams plus simulated versions
//! - [`config`]: TOML defaults and engine settings
//! - [`store`]: the persisted clock record
//! - [`event_log`], [`telemetry`]: observable events and jitter metrics

pub mod config;
pub mod critical;
pub mod engine;
pub mod event_log;
pub mod gate;
pub mod intervals;
pub mod phase;
pub mod position;
pub mod scheduler;
pub mod store;
pub mod tap;
pub mod telemetry;

pub use engine::{PulseFn, SyncedClock};
pub use scheduler::{FireFn, HeartbeatScheduler, SimTicks, SimTimer, TickSource, TimerOp};
pub use synclock_types::{ClockConfig, ClockEvent, HeartbeatState, MAX_MULT, PHASE_DENOM};
