//! Timer and tick-counter seams.
//!
//! The engine never owns time. It reads a [`TickSource`] and programs a
//! single-shot [`HeartbeatScheduler`]; on hardware these wrap the tick
//! counter and the timer-interrupt dispatcher. [`SimTicks`] and [`SimTimer`]
//! step simulated time deterministically and record every programming call,
//! which is what the tests drive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::critical::CriticalSection;

/// Callback the scheduler invokes when the programmed delay expires.
pub type FireFn = Arc<dyn Fn() + Send + Sync>;

/// Monotonically increasing tick counter.
pub trait TickSource: Send + Sync {
    fn now(&self) -> u64;
}

/// Single-shot rescheduling timer.
///
/// `on_fire` runs once, at or after the programmed number of ticks, from the
/// timer's own context. Implementations must not call it synchronously from
/// inside `schedule` or `reschedule`.
pub trait HeartbeatScheduler: Send {
    /// Arm the timer and register the fire callback.
    fn schedule(&mut self, ticks_from_now: u32, on_fire: FireFn);

    /// Re-arm with the callback registered by `schedule`.
    fn reschedule(&mut self, ticks_from_now: u32);

    /// Disarm. A later `schedule` arms it again.
    fn cancel(&mut self);
}

/// Shared simulated tick counter.
#[derive(Clone, Default)]
pub struct SimTicks {
    now: Arc<AtomicU64>,
}

impl SimTicks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: u64) -> Self {
        let ticks = Self::new();
        ticks.set(now);
        ticks
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, ticks: u64) {
        self.now.fetch_add(ticks, Ordering::SeqCst);
    }
}

impl TickSource for SimTicks {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A timer programming call recorded by [`SimTimer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerOp {
    Schedule { at: u64, ticks: u32 },
    Reschedule { at: u64, ticks: u32 },
    Cancel { at: u64 },
}

#[derive(Default)]
struct SimTimerState {
    deadline: Option<u64>,
    on_fire: Option<FireFn>,
    ops: Vec<TimerOp>,
}

/// Simulated single-shot timer driven by [`SimTimer::run_until`].
#[derive(Clone)]
pub struct SimTimer {
    ticks: SimTicks,
    state: Arc<CriticalSection<SimTimerState>>,
}

impl SimTimer {
    pub fn new(ticks: SimTicks) -> Self {
        Self {
            ticks,
            state: Arc::new(CriticalSection::default()),
        }
    }

    /// Tick at which the timer will fire, if armed.
    pub fn deadline(&self) -> Option<u64> {
        self.state.with(|s| s.deadline)
    }

    /// Return all recorded programming calls.
    pub fn operations(&self) -> Vec<TimerOp> {
        self.state.with(|s| s.ops.clone())
    }

    /// Clear recorded programming calls.
    pub fn clear(&self) {
        self.state.with(|s| s.ops.clear());
    }

    /// Move simulated time forward to `target`, firing every deadline that
    /// falls on the way at its exact tick. Returns the number of fires.
    pub fn run_until(&self, target: u64) -> usize {
        let mut fired = 0;
        loop {
            let due = self.state.with(|s| match (s.deadline, &s.on_fire) {
                (Some(deadline), Some(on_fire)) if deadline <= target => {
                    s.deadline = None;
                    Some((deadline, Arc::clone(on_fire)))
                }
                _ => None,
            });
            let Some((deadline, on_fire)) = due else {
                break;
            };
            if deadline > self.ticks.now() {
                self.ticks.set(deadline);
            }
            on_fire();
            fired += 1;
        }
        if self.ticks.now() < target {
            self.ticks.set(target);
        }
        fired
    }

    /// Advance simulated time by `ticks`.
    pub fn advance(&self, ticks: u64) -> usize {
        self.run_until(self.ticks.now() + ticks)
    }
}

impl HeartbeatScheduler for SimTimer {
    fn schedule(&mut self, ticks_from_now: u32, on_fire: FireFn) {
        let at = self.ticks.now();
        self.state.with(|s| {
            s.deadline = Some(at + ticks_from_now as u64);
            s.on_fire = Some(on_fire);
            s.ops.push(TimerOp::Schedule {
                at,
                ticks: ticks_from_now,
            });
        });
    }

    fn reschedule(&mut self, ticks_from_now: u32) {
        let at = self.ticks.now();
        self.state.with(|s| {
            if s.on_fire.is_some() {
                s.deadline = Some(at + ticks_from_now as u64);
            }
            s.ops.push(TimerOp::Reschedule {
                at,
                ticks: ticks_from_now,
            });
        });
    }

    fn cancel(&mut self) {
        let at = self.ticks.now();
        self.state.with(|s| {
            s.deadline = None;
            s.ops.push(TimerOp::Cancel { at });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, FireFn) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_fires_once_at_deadline() {
        let ticks = SimTicks::new();
        let mut timer = SimTimer::new(ticks.clone());
        let (count, on_fire) = counter();

        timer.schedule(10, on_fire);
        assert_eq!(timer.run_until(9), 0);
        assert_eq!(timer.run_until(10), 1);
        assert_eq!(timer.run_until(100), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(ticks.now(), 100);
    }

    #[test]
    fn test_reschedule_from_callback_chains() {
        let ticks = SimTicks::new();
        let timer = SimTimer::new(ticks.clone());
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        let handle = timer.clone();
        let on_fire: FireFn = Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            handle.clone().reschedule(5);
        });
        timer.clone().schedule(5, on_fire);

        assert_eq!(timer.run_until(22), 4);
        assert_eq!(timer.deadline(), Some(25));
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_cancel_disarms() {
        let ticks = SimTicks::starting_at(50);
        let mut timer = SimTimer::new(ticks);
        let (count, on_fire) = counter();

        timer.schedule(5, on_fire);
        timer.cancel();
        assert_eq!(timer.advance(100), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(
            timer.operations(),
            vec![
                TimerOp::Schedule { at: 50, ticks: 5 },
                TimerOp::Cancel { at: 50 },
            ]
        );
    }

    #[test]
    fn test_reschedule_without_callback_stays_disarmed() {
        let mut timer = SimTimer::new(SimTicks::new());
        timer.reschedule(3);
        assert_eq!(timer.deadline(), None);
    }
}
