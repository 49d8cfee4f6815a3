mod common;

use common::{harness, Harness};
use synclock_core::{ClockConfig, ClockEvent, PHASE_DENOM};

#[test]
fn lock_mode_tap_realigns_to_cycle_start() {
    let h = harness(ClockConfig::new(1, 4, 100).with_lock(true));
    h.start();

    assert_eq!(h.tap_at(1_000), 100);
    assert_eq!(h.tap_at(1_090), 90);

    assert_eq!(h.clock.intervals(), vec![22, 23, 22, 23]);
    // 15 ticks past the last pulse: the boundary fires right away
    let hb = h.clock.heartbeat();
    assert_eq!(hb.current_index, 3);
    assert_eq!(hb.ticks_remaining, 1);

    h.run_until(1_091);
    assert_eq!(h.clock.heartbeat().current_index, 0);
    assert_eq!(h.pulse_times().last(), Some(&1_091));

    h.run_until(1_181);
    let tail: Vec<u64> = h.pulse_times().into_iter().filter(|&t| t > 1_091).collect();
    assert_eq!(tail, vec![1_113, 1_136, 1_158, 1_181]);
}

#[test]
fn tap_events_report_interval_and_estimate() {
    let h = harness(ClockConfig::new(1, 4, 100));
    h.start();
    h.tap_at(1_000);
    h.tap_at(1_090);

    let taps: Vec<ClockEvent> = h
        .events()
        .into_iter()
        .filter(|e| matches!(e, ClockEvent::TapAccepted { .. }))
        .collect();
    assert_eq!(
        taps,
        vec![ClockEvent::TapAccepted {
            at: 1_090,
            interval: 90,
            period: 90,
            window_reset: false,
        }]
    );
    assert_eq!(h.clock.save_config().period_ticks, 90);
}

#[test]
fn disconnect_keeps_last_period() {
    let h = harness(ClockConfig::new(1, 1, 100));
    h.start();
    h.tap_at(0);
    h.tap_at(90);
    h.tap_at(180);
    assert_eq!(h.clock.save_config().period_ticks, 90);

    assert_eq!(h.tap_at(70_000), 90);
    assert_eq!(h.clock.save_config().period_ticks, 90);
    assert_eq!(h.clock.telemetry_summary().disconnects, 1);
    assert!(h.events().contains(&ClockEvent::Disconnected {
        at: 70_000,
        elapsed: 69_820,
    }));

    // the next tap measures from the one that disconnected
    assert_eq!(h.tap_at(70_080), 80);
}

#[test]
fn tempo_jump_restarts_averaging() {
    let h = harness(ClockConfig::new(1, 4, 100));
    h.start();
    h.tap_at(0);
    h.tap_at(100);
    h.tap_at(200);
    assert_eq!(h.tap_at(260), 60);

    assert!(h.events().contains(&ClockEvent::TapAccepted {
        at: 260,
        interval: 60,
        period: 60,
        window_reset: true,
    }));
    assert_eq!(h.clock.intervals(), vec![15, 15, 15, 15]);
}

#[test]
fn steady_tap_after_multiplier_change_keeps_pulse_grid() {
    let h = harness(ClockConfig::new(1, 4, 100));
    h.start();
    h.tap_at(0);
    h.run_until(25);
    h.clock.update_multiplier(3);
    assert_eq!(h.clock.phase().offset_fraction, 0);

    h.tap_at(100);
    assert_eq!(h.clock.heartbeat().current_index, 0);
    assert_eq!(h.clock.position(), 0);

    h.run_until(200);
    let times = h.pulse_times();
    assert_eq!(times, vec![0, 25, 33, 66, 100, 133, 166, 200]);
}

/// Restart with taps still running: the heartbeat cycle now starts half a
/// cycle away from the tap grid.
fn restarted_off_grid(config: ClockConfig) -> Harness {
    let h = harness(config);
    h.start();
    h.tap_at(0);
    h.tap_at(100);
    h.run_until(130);
    h.clock.stop();
    h.ticks.set(150);
    h.start();
    h.run_until(175);
    h.clock.update_multiplier(2);
    h
}

#[test]
fn free_run_tap_keeps_drifted_phase() {
    let h = restarted_off_grid(ClockConfig::new(1, 4, 100));
    assert_eq!(h.clock.phase().offset_fraction, PHASE_DENOM / 2);

    h.tap_at(200);
    assert_eq!(h.clock.heartbeat().current_index, 1);
    assert_eq!(h.clock.position(), 50);
    assert_eq!(h.timer.deadline(), Some(250));
}

#[test]
fn locked_tap_snaps_to_tap_grid() {
    let h = restarted_off_grid(ClockConfig::new(1, 4, 100).with_lock(true));
    assert_eq!(h.clock.phase().offset_fraction, 0);

    h.tap_at(200);
    assert_eq!(h.clock.heartbeat().current_index, 0);
    assert_eq!(h.clock.position(), 0);
    assert_eq!(h.timer.deadline(), Some(250));
}

#[test]
fn enabling_lock_clears_offset() {
    let h = restarted_off_grid(ClockConfig::new(1, 4, 100));
    assert_ne!(h.clock.phase().offset_fraction, 0);

    h.clock.set_lock_mode(true);
    assert_eq!(h.clock.phase().offset_fraction, 0);
    assert!(h.clock.save_config().lock_enabled);
}

#[test]
fn divisor_spreads_taps_over_sub_beats() {
    let h = harness(ClockConfig::new(2, 2, 100));
    h.start();
    h.tap_at(0);
    h.tap_at(100);
    assert_eq!(h.clock.intervals(), vec![100, 100]);
    // second tap of a two-tap cycle lands half way through
    assert_eq!(h.clock.heartbeat().current_index, 1);
}
