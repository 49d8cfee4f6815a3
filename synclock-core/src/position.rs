//! Cycle position tracking and remapping.
//!
//! A position is the tick offset from the start of the current output cycle.
//! It is read against the table the heartbeat is running on and can be
//! re-expressed on a freshly recomputed table, so reconfiguration keeps the
//! clock where it was in real time.

use synclock_types::HeartbeatState;

use crate::intervals::IntervalTable;

/// A remap that leaves at most this many ticks in the slot is a sliver.
pub const SLIVER_TICKS: u32 = 1;

/// A remap landing this close past a slot start is treated as on the boundary.
pub const BOUNDARY_TICKS: u32 = 1;

/// Where the heartbeat should resume after a remap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub index: u8,
    /// Ticks until the next fire, never zero.
    pub remaining: u32,
    pub ticks_in_interval: u32,
}

/// Cycle position of `heartbeat` on `table`.
pub fn position(table: &IntervalTable, heartbeat: &HeartbeatState) -> u32 {
    table.offset_of(heartbeat.current_index) + heartbeat.elapsed_in_interval()
}

/// Slot containing `position` and the offset into it. Positions past the
/// end of the cycle wrap to the start of slot 0.
pub fn locate(table: &IntervalTable, position: u32) -> (u8, u32) {
    let multiplier = table.multiplier();
    let mut delta = position;
    let mut index = 0u8;
    while index < multiplier && delta >= table.slot(index) {
        delta -= table.slot(index);
        index += 1;
    }
    if index == multiplier {
        (0, 0)
    } else {
        (index, delta)
    }
}

/// Map `saved` onto `table`, resolving positions that land within a tick of
/// a slot edge against how long ago the last pulse went out.
pub fn adjust_position(table: &IntervalTable, saved: u32, since_last_fire: u64) -> Placement {
    let multiplier = table.multiplier();
    let (target, delta) = locate(table, saved);
    let remaining = table.slot(target).saturating_sub(delta).max(1);
    let debouncing = since_last_fire < table.quarter() as u64;

    if remaining <= SLIVER_TICKS {
        if debouncing {
            // fold the sliver into the next slot instead of firing twice in a row
            let next = (target + 1) % multiplier;
            Placement {
                index: next,
                remaining: table.slot(next).saturating_add(remaining),
                ticks_in_interval: table.slot(next),
            }
        } else {
            Placement {
                index: target,
                remaining: 1,
                ticks_in_interval: table.slot(target),
            }
        }
    } else if delta <= BOUNDARY_TICKS {
        if debouncing {
            Placement {
                index: target,
                remaining,
                ticks_in_interval: table.slot(target),
            }
        } else {
            // boundary already crossed in real time without a pulse: fire now
            let prev = (target + multiplier - 1) % multiplier;
            Placement {
                index: prev,
                remaining: 1,
                ticks_in_interval: table.slot(prev),
            }
        }
    } else {
        Placement {
            index: target,
            remaining,
            ticks_in_interval: table.slot(target),
        }
    }
}
