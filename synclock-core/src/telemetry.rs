//! Heartbeat telemetry for jitter monitoring.
//!
//! Fire-to-fire intervals go into a fixed-size ring buffer so recording from
//! the fire path never allocates.

/// Ring buffer size for fire interval samples.
const INTERVAL_BUFFER_SIZE: usize = 64;

pub struct ClockTelemetry {
    /// Ring buffer of observed fire-to-fire intervals in ticks
    intervals: [u32; INTERVAL_BUFFER_SIZE],
    idx: usize,
    /// Number of samples collected (saturates at INTERVAL_BUFFER_SIZE)
    sample_count: usize,
    /// Largest deviation from the programmed slot in the current window
    max_error: u32,
    fires: u64,
    suppressed: u64,
    reconfigures: u64,
    disconnects: u64,
}

/// Snapshot returned by [`ClockTelemetry::take_summary`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySummary {
    pub avg_interval: u32,
    pub max_interval: u32,
    pub max_error: u32,
    pub fires: u64,
    pub suppressed: u64,
    pub reconfigures: u64,
    pub coalesced: u64,
    pub disconnects: u64,
}

impl Default for ClockTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockTelemetry {
    pub fn new() -> Self {
        Self {
            intervals: [0; INTERVAL_BUFFER_SIZE],
            idx: 0,
            sample_count: 0,
            max_error: 0,
            fires: 0,
            suppressed: 0,
            reconfigures: 0,
            disconnects: 0,
        }
    }

    /// Count a delivered pulse. `observed` is the time since the previous
    /// pulse (if any), `expected` the slot length that was programmed.
    #[inline]
    pub fn record_fire(&mut self, observed: Option<u64>, expected: u32) {
        self.fires += 1;
        let Some(observed) = observed else {
            return;
        };
        let observed = observed.min(u32::MAX as u64) as u32;

        self.intervals[self.idx] = observed;
        self.idx = (self.idx + 1) % INTERVAL_BUFFER_SIZE;
        if self.sample_count < INTERVAL_BUFFER_SIZE {
            self.sample_count += 1;
        }

        let error = observed.abs_diff(expected);
        if error > self.max_error {
            self.max_error = error;
        }
    }

    pub fn record_suppressed(&mut self) {
        self.suppressed += 1;
    }

    pub fn record_reconfigure(&mut self) {
        self.reconfigures += 1;
    }

    pub fn record_disconnect(&mut self) {
        self.disconnects += 1;
    }

    /// Summarise and reset the max error for the next window. Counters stay cumulative.
    pub fn take_summary(&mut self) -> TelemetrySummary {
        let samples = &self.intervals[..self.sample_count];
        let (avg_interval, max_interval) = if samples.is_empty() {
            (0, 0)
        } else {
            let sum: u64 = samples.iter().map(|&x| x as u64).sum();
            (
                (sum / samples.len() as u64) as u32,
                samples.iter().copied().max().unwrap_or(0),
            )
        };

        let summary = TelemetrySummary {
            avg_interval,
            max_interval,
            max_error: self.max_error,
            fires: self.fires,
            suppressed: self.suppressed,
            reconfigures: self.reconfigures,
            coalesced: 0,
            disconnects: self.disconnects,
        };
        self.max_error = 0;
        summary
    }
}
