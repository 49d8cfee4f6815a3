use serde::{Deserialize, Serialize};

/// Snapshot of the heartbeat timer as seen by the engine at one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatState {
    /// Slot the timer is currently counting down.
    pub current_index: u8,
    /// Length the current countdown was measured against.
    pub ticks_in_interval: u32,
    /// Ticks left until the next fire.
    pub ticks_remaining: u32,
    /// Tick of the most recent delivered pulse.
    pub last_fire: u64,
}

impl HeartbeatState {
    /// Ticks already spent in the current slot.
    pub fn elapsed_in_interval(&self) -> u32 {
        self.ticks_in_interval.saturating_sub(self.ticks_remaining)
    }
}
