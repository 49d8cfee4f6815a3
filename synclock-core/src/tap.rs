//! Tap tempo tracking.
//!
//! Keeps a small ring buffer of accepted inter-tap intervals and averages
//! them into a period estimate. Intervals outside a quarter-period band
//! around the running estimate are treated as a tempo change and flush the
//! history; gaps beyond the disconnect threshold reset tracking entirely.

use synclock_types::{clamp_divisor, AVERAGING_TAPS, DISCONNECT_TICKS};

/// Result of feeding one tap timestamp to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    /// First tap since construction: nothing to measure against yet.
    First,
    /// Same timestamp as the previous tap.
    Ignored,
    /// Gap too long; window and sub-index were reset, estimate untouched.
    Disconnected { elapsed: u64 },
    Accepted {
        interval: u32,
        period: u32,
        /// Earlier samples were discarded because the tempo changed.
        window_reset: bool,
    },
}

#[derive(Debug, Clone)]
pub struct TapTracker {
    samples: [u32; AVERAGING_TAPS],
    /// Number of samples averaged, 2..=AVERAGING_TAPS.
    window: usize,
    write_idx: usize,
    count: usize,
    period: u32,
    last_interval: u32,
    last_timestamp: Option<u64>,
    /// Which of the `divisor` input periods the last tap started.
    sub_index: u8,
    divisor: u8,
    disconnect_ticks: u64,
}

impl TapTracker {
    pub fn new(period: u32) -> Self {
        Self {
            samples: [0; AVERAGING_TAPS],
            window: AVERAGING_TAPS,
            write_idx: 0,
            count: 0,
            period: period.max(1),
            last_interval: 0,
            last_timestamp: None,
            sub_index: 0,
            divisor: 1,
            disconnect_ticks: DISCONNECT_TICKS,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.clamp(2, AVERAGING_TAPS);
        self
    }

    pub fn with_disconnect_ticks(mut self, ticks: u64) -> Self {
        self.disconnect_ticks = ticks.max(1);
        self
    }

    /// Feed one tap.
    pub fn ingest(&mut self, timestamp: u64) -> TapOutcome {
        let Some(previous) = self.last_timestamp.replace(timestamp) else {
            return TapOutcome::First;
        };

        let elapsed = timestamp.wrapping_sub(previous);
        if elapsed > self.disconnect_ticks {
            self.reset();
            self.sub_index = 0;
            return TapOutcome::Disconnected { elapsed };
        }
        if elapsed == 0 {
            return TapOutcome::Ignored;
        }

        let interval = elapsed.min(u32::MAX as u64) as u32;
        self.sub_index = (self.sub_index + 1) % self.divisor;

        let tolerance = self.tolerance();
        let low = self.period.saturating_sub(tolerance);
        let high = self.period.saturating_add(tolerance);
        let out_of_band = interval < low || interval > high;
        let window_reset = out_of_band && self.count > 0;
        if out_of_band {
            self.reset();
        }

        self.samples[self.write_idx] = interval;
        self.write_idx = (self.write_idx + 1) % self.window;
        if self.count < self.window {
            self.count += 1;
        }
        self.last_interval = interval;

        let total: u64 = self.samples[..self.count].iter().map(|&s| s as u64).sum();
        self.period = ((total / self.count as u64) as u32).max(1);

        TapOutcome::Accepted {
            interval,
            period: self.period,
            window_reset,
        }
    }

    /// Drop the averaging history. The estimate and sub-index are kept.
    pub fn reset(&mut self) {
        self.write_idx = 0;
        self.count = 0;
    }

    /// Replace the estimate with an explicitly loaded period.
    pub fn set_period(&mut self, period: u32) {
        self.period = period.max(1);
        self.reset();
    }

    /// Divisor bounding the sub-index cycle. A sub-index outside the new
    /// range restarts at 0.
    pub fn set_divisor(&mut self, divisor: u8) {
        self.divisor = clamp_divisor(divisor);
        if self.sub_index >= self.divisor {
            self.sub_index = 0;
        }
    }

    pub fn divisor(&self) -> u8 {
        self.divisor
    }

    /// Jitter band half-width: a quarter of the running estimate, at least one tick.
    pub fn tolerance(&self) -> u32 {
        (self.period >> 2).max(1)
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn sub_index(&self) -> u8 {
        self.sub_index
    }

    pub fn sample_count(&self) -> usize {
        self.count
    }

    pub fn last_interval(&self) -> u32 {
        self.last_interval
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp
    }

    /// Where a `total`-tick cycle anchored on the taps would be at `now`:
    /// the start of the last tap's sub-beat plus the time since it. `None`
    /// before any tap.
    pub fn aligned_position(&self, period: u32, total: u32, now: u64) -> Option<u32> {
        let last = self.last_timestamp?;
        if total == 0 {
            return None;
        }
        let since = now.saturating_sub(last);
        let start = period as u64 * self.sub_index as u64;
        Some(((start + since) % total as u64) as u32)
    }
}
