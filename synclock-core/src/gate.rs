//! Single-writer arbitration for configuration updates.
//!
//! Every mutation is expressed as a [`ConfigPatch`]. While one update cycle
//! runs, further patches are merged into a pending slot and picked up by the
//! running cycle when it finishes, so nothing recurses and nothing is lost.

use crate::critical::CriticalSection;

/// A partial configuration change. `None` fields are left as they are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    pub divisor: Option<u8>,
    pub multiplier: Option<u8>,
    pub period: Option<u32>,
    pub lock_enabled: Option<bool>,
    /// Land on the tap-relative position instead of the live one.
    pub align_to_tap: bool,
    /// Period was loaded explicitly; drop the tap averaging window.
    pub reset_taps: bool,
    /// Issued from the heartbeat callback; the live position is the start of the current slot.
    pub from_clock: bool,
}

impl ConfigPatch {
    pub fn divisor(divisor: u8) -> Self {
        Self {
            divisor: Some(divisor),
            ..Self::default()
        }
    }

    pub fn multiplier(multiplier: u8) -> Self {
        Self {
            multiplier: Some(multiplier),
            ..Self::default()
        }
    }

    pub fn div_mult(divisor: u8, multiplier: u8) -> Self {
        Self {
            divisor: Some(divisor),
            multiplier: Some(multiplier),
            ..Self::default()
        }
    }

    pub fn lock(enabled: bool) -> Self {
        Self {
            lock_enabled: Some(enabled),
            ..Self::default()
        }
    }

    /// Period update driven by an accepted tap.
    pub fn tap(period: u32) -> Self {
        Self {
            period: Some(period),
            align_to_tap: true,
            ..Self::default()
        }
    }

    /// Fold a later request into this one: later fields win, flags accumulate.
    pub fn merge(self, later: ConfigPatch) -> ConfigPatch {
        ConfigPatch {
            divisor: later.divisor.or(self.divisor),
            multiplier: later.multiplier.or(self.multiplier),
            period: later.period.or(self.period),
            lock_enabled: later.lock_enabled.or(self.lock_enabled),
            align_to_tap: self.align_to_tap || later.align_to_tap,
            reset_taps: self.reset_taps || later.reset_taps,
            from_clock: self.from_clock || later.from_clock,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum GateState {
    #[default]
    Idle,
    Updating,
    UpdatingWithPending(ConfigPatch),
}

/// What the caller of [`ConfigGate::admit`] should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Caller now owns the update and must run this patch, then call `complete`.
    Run(ConfigPatch),
    /// Another update is in flight; the patch was queued behind it.
    Coalesced,
}

#[derive(Default)]
pub struct ConfigGate {
    state: CriticalSection<GateState>,
}

impl ConfigGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&self, patch: ConfigPatch) -> Admission {
        self.state.with(|state| match *state {
            GateState::Idle => {
                *state = GateState::Updating;
                Admission::Run(patch)
            }
            GateState::Updating => {
                *state = GateState::UpdatingWithPending(patch);
                Admission::Coalesced
            }
            GateState::UpdatingWithPending(pending) => {
                *state = GateState::UpdatingWithPending(pending.merge(patch));
                Admission::Coalesced
            }
        })
    }

    /// Finish the running cycle. Returns the next patch to run if requests
    /// arrived meanwhile; the gate stays owned by the caller in that case.
    pub fn complete(&self) -> Option<ConfigPatch> {
        self.state.with(|state| match *state {
            GateState::UpdatingWithPending(pending) => {
                *state = GateState::Updating;
                Some(pending)
            }
            GateState::Updating | GateState::Idle => {
                *state = GateState::Idle;
                None
            }
        })
    }

    pub fn is_updating(&self) -> bool {
        self.state.with(|state| *state != GateState::Idle)
    }
}
