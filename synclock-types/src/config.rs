//! Clock configuration record, also used as the persisted form.

use serde::{Deserialize, Serialize};

use crate::MAX_MULT;

/// Base period used when nothing else is known (120 BPM on a 1 kHz tick).
pub const DEFAULT_PERIOD_TICKS: u32 = 500;

/// Divisor, multiplier and base period of the synced clock.
///
/// `period_ticks` is the tapped (input) period. One full output cycle lasts
/// `period_ticks * divisor` ticks and is split into `multiplier` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockConfig {
    pub divisor: u8,
    pub multiplier: u8,
    pub period_ticks: u32,
    /// Phase-lock to the tap source instead of free-running.
    #[serde(default)]
    pub lock_enabled: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            divisor: 1,
            multiplier: 1,
            period_ticks: DEFAULT_PERIOD_TICKS,
            lock_enabled: false,
        }
    }
}

impl ClockConfig {
    pub fn new(divisor: u8, multiplier: u8, period_ticks: u32) -> Self {
        Self {
            divisor,
            multiplier,
            period_ticks,
            lock_enabled: false,
        }
    }

    pub fn with_lock(mut self, lock_enabled: bool) -> Self {
        self.lock_enabled = lock_enabled;
        self
    }

    /// Copy with every field coerced into its valid range.
    pub fn sanitized(self) -> Self {
        let divisor = clamp_divisor(self.divisor);
        Self {
            divisor,
            multiplier: clamp_multiplier(self.multiplier),
            period_ticks: clamp_period(self.period_ticks, divisor),
            lock_enabled: self.lock_enabled,
        }
    }

    /// Length of one full output cycle in ticks.
    pub fn cycle_ticks(&self) -> u32 {
        self.period_ticks.saturating_mul(self.divisor.max(1) as u32)
    }
}

/// Divisor of 0 is coerced to 1.
pub fn clamp_divisor(divisor: u8) -> u8 {
    divisor.max(1)
}

/// Multiplier is coerced into `1..=MAX_MULT`.
pub fn clamp_multiplier(multiplier: u8) -> u8 {
    multiplier.clamp(1, MAX_MULT)
}

/// Period is at least one tick and small enough that `period * divisor` fits a `u32`.
pub fn clamp_period(period_ticks: u32, divisor: u8) -> u32 {
    let max = u32::MAX / clamp_divisor(divisor) as u32;
    period_ticks.clamp(1, max)
}
