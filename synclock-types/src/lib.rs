//! # synclock-types
//!
//! Shared data types for the synclock tap-synchronised clock.
//! Plain records and constants only; the engine lives in `synclock-core`.

mod config;
mod event;
mod heartbeat;

pub use config::{clamp_divisor, clamp_multiplier, clamp_period, ClockConfig, DEFAULT_PERIOD_TICKS};
pub use event::ClockEvent;
pub use heartbeat::HeartbeatState;

/// Maximum number of heartbeat slots per cycle.
pub const MAX_MULT: u8 = 16;

/// Least common multiple of 1..=16, so `PHASE_DENOM / m` is exact for every multiplier.
pub const PHASE_DENOM: u32 = 720_720;

/// Gap between taps (in ticks) after which the tap source is considered disconnected.
pub const DISCONNECT_TICKS: u64 = 60_000;

/// Number of inter-tap intervals averaged into the period estimate.
pub const AVERAGING_TAPS: usize = 3;
