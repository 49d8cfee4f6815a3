#![allow(dead_code)]
//! Test harness utilities for synclock-core integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use synclock_core::critical::CriticalSection;
use synclock_core::{ClockConfig, ClockEvent, SimTicks, SimTimer, SyncedClock, TickSource};

/// A clock on simulated time that records the tick of every pulse.
pub struct Harness {
    pub clock: SyncedClock,
    pub timer: SimTimer,
    pub ticks: SimTicks,
    pulses: Arc<CriticalSection<Vec<u64>>>,
}

/// Build a stopped clock at tick 0.
pub fn harness(config: ClockConfig) -> Harness {
    let ticks = SimTicks::new();
    let timer = SimTimer::new(ticks.clone());
    let pulses = Arc::new(CriticalSection::new(Vec::new()));

    let p = Arc::clone(&pulses);
    let t = ticks.clone();
    let clock = SyncedClock::new(config, ticks.clone(), timer.clone(), move || {
        let now = t.now();
        p.with(|v| v.push(now));
    });

    Harness {
        clock,
        timer,
        ticks,
        pulses,
    }
}

/// Build a clock whose callback also runs `hook` once, on the pulse after
/// `armed` is set, with a handle to the clock itself.
pub fn harness_with_hook(
    config: ClockConfig,
    hook: impl Fn(&SyncedClock, &SimTicks) + Send + Sync + 'static,
) -> (Harness, Arc<AtomicBool>) {
    let ticks = SimTicks::new();
    let timer = SimTimer::new(ticks.clone());
    let pulses = Arc::new(CriticalSection::new(Vec::new()));
    let armed = Arc::new(AtomicBool::new(false));
    let slot: Arc<CriticalSection<Option<SyncedClock>>> = Arc::new(CriticalSection::new(None));

    let p = Arc::clone(&pulses);
    let t = ticks.clone();
    let a = Arc::clone(&armed);
    let s = Arc::clone(&slot);
    let clock = SyncedClock::new(config, ticks.clone(), timer.clone(), move || {
        p.with(|v| v.push(t.now()));
        if a.swap(false, Ordering::SeqCst) {
            if let Some(clock) = s.with(|c| c.clone()) {
                hook(&clock, &t);
            }
        }
    });
    slot.with(|c| *c = Some(clock.clone()));

    (
        Harness {
            clock,
            timer,
            ticks,
            pulses,
        },
        armed,
    )
}

impl Harness {
    pub fn start(&self) {
        self.clock.start();
    }

    /// Run simulated time to `tick`, firing every heartbeat on the way.
    pub fn run_until(&self, tick: u64) -> usize {
        self.timer.run_until(tick)
    }

    /// Run to `tick` and tap there.
    pub fn tap_at(&self, tick: u64) -> u32 {
        self.timer.run_until(tick);
        self.clock.process_tap(tick)
    }

    pub fn pulse_times(&self) -> Vec<u64> {
        self.pulses.with(|v| v.clone())
    }

    pub fn pulse_count(&self) -> usize {
        self.pulses.with(|v| v.len())
    }

    pub fn events(&self) -> Vec<ClockEvent> {
        self.clock.events().drain_events()
    }

    pub fn now(&self) -> u64 {
        self.ticks.now()
    }
}
