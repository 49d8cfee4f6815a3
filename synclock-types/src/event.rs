//! Observable clock events, emitted at fire, reconfigure and tap points.

use serde::{Deserialize, Serialize};

use crate::ClockConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClockEvent {
    Started { at: u64 },
    Stopped { at: u64 },
    /// A pulse was delivered for slot `index`.
    Fired { index: u8, at: u64 },
    /// A fire arrived inside the debounce window and was swallowed.
    Suppressed { index: u8, at: u64, since_last_fire: u64 },
    TapAccepted {
        at: u64,
        interval: u32,
        period: u32,
        window_reset: bool,
    },
    /// Tap gap exceeded the disconnect threshold; tracking was reset.
    Disconnected { at: u64, elapsed: u64 },
    /// A full update cycle finished.
    Reconfigured {
        config: ClockConfig,
        index: u8,
        remaining: u32,
        at: u64,
    },
    /// An update arrived while another was in flight and was folded into the pending slot.
    Coalesced,
    /// A div/mult change was staged for the next cycle wrap.
    Staged { divisor: u8, multiplier: u8 },
}

impl ClockEvent {
    pub fn is_fire(&self) -> bool {
        matches!(self, ClockEvent::Fired { .. })
    }
}
