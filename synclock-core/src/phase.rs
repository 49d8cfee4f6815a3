//! Free-run phase continuity across multiplier changes.
//!
//! The offset is how far the running cycle sits ahead of the tap-aligned
//! cycle, as a fraction of one full cycle in units of `PHASE_DENOM`. Keeping
//! it as a fraction lets it follow the cycle length when the tempo changes.

use synclock_types::PHASE_DENOM;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseState {
    pub offset_fraction: u32,
    pub lock_enabled: bool,
}

impl PhaseState {
    pub fn new(lock_enabled: bool) -> Self {
        Self {
            offset_fraction: 0,
            lock_enabled,
        }
    }

    /// Record the drift between the live position and the tap-aligned one
    /// ahead of a multiplier change, both in ticks of a `total`-tick cycle.
    /// Cleared while phase-locked.
    pub fn carry(&mut self, live: u32, tap_aligned: u32, total: u32) {
        if self.lock_enabled {
            self.offset_fraction = 0;
            return;
        }
        if total == 0 {
            return;
        }
        let t = total as u64;
        let drift = (live as u64 % t + t - tap_aligned as u64 % t) % t;
        let fraction = (drift * PHASE_DENOM as u64 + t / 2) / t;
        self.offset_fraction = (fraction % PHASE_DENOM as u64) as u32;
    }

    pub fn set_lock(&mut self, enabled: bool) {
        self.lock_enabled = enabled;
        if enabled {
            self.offset_fraction = 0;
        }
    }

    /// Carried offset expressed in ticks of a `total`-tick cycle.
    pub fn skew(&self, total: u32) -> u32 {
        if self.lock_enabled {
            return 0;
        }
        let denom = PHASE_DENOM as u64;
        ((self.offset_fraction as u64 * total as u64 + denom / 2) / denom) as u32
    }

    /// Position a tap-driven update should land on: the tap-relative
    /// position, shifted by the carried offset while free-running.
    pub fn tap_position(&self, period: u32, sub_index: u8, total: u32) -> u32 {
        let base = period as u64 * sub_index as u64;
        let skewed = base + self.skew(total) as u64;
        match total {
            0 => 0,
            t => (skewed % t as u64) as u32,
        }
    }
}
