//! Snapshot persistence across engine instances.

use chrono::Duration;
use focusflow_core::clock::Clock;
use focusflow_core::storage::keys;
use focusflow_core::testing::{FakeAudioBackend, Harness};
use focusflow_core::{FocusApp, PreferenceStore, SessionType, TimerEngine, TimerSnapshot, TimerState};

fn snapshot(h: &Harness, time_left: u64, running: bool, paused: bool) -> String {
    TimerSnapshot {
        duration: 1500,
        time_left,
        is_running: running,
        is_paused: paused,
        session_type: SessionType::Focus,
        session_count: 3,
        current_session_id: None,
        timestamp: h.clock.now().timestamp_millis(),
    }
    .encode()
    .unwrap()
}

#[test]
fn running_snapshot_restores_paused_minus_elapsed() {
    let h = Harness::new();
    h.snapshots
        .set(keys::TIMER_STATE, &snapshot(&h, 100, true, false))
        .unwrap();
    h.clock.advance(Duration::seconds(60));

    let engine = TimerEngine::new(h.ctx());
    assert_eq!(engine.state(), TimerState::Paused);
    assert_eq!(engine.time_left_secs(), 40);
    assert_eq!(engine.session_count(), 3);
}

#[test]
fn old_snapshot_is_ignored() {
    let h = Harness::new();
    h.snapshots
        .set(keys::TIMER_STATE, &snapshot(&h, 100, true, false))
        .unwrap();
    h.clock.advance(Duration::seconds(400));

    let engine = TimerEngine::new(h.ctx());
    assert_eq!(engine.state(), TimerState::Idle);
    assert_eq!(engine.time_left_secs(), 1500);
    assert_eq!(engine.session_count(), 1);
}

#[test]
fn snapshot_exactly_at_the_limit_is_ignored() {
    let h = Harness::new();
    h.snapshots
        .set(keys::TIMER_STATE, &snapshot(&h, 100, false, true))
        .unwrap();
    h.clock.advance(Duration::seconds(300));
    assert_eq!(TimerEngine::new(h.ctx()).state(), TimerState::Idle);
}

#[test]
fn paused_snapshot_keeps_its_countdown() {
    let h = Harness::new();
    h.snapshots
        .set(keys::TIMER_STATE, &snapshot(&h, 700, false, true))
        .unwrap();
    h.clock.advance(Duration::seconds(120));

    let engine = TimerEngine::new(h.ctx());
    assert_eq!(engine.state(), TimerState::Paused);
    assert_eq!(engine.time_left_secs(), 700);
}

#[test]
fn elapsed_time_never_goes_below_zero() {
    let h = Harness::new();
    h.snapshots
        .set(keys::TIMER_STATE, &snapshot(&h, 20, true, false))
        .unwrap();
    h.clock.advance(Duration::seconds(90));

    let engine = TimerEngine::new(h.ctx());
    assert_eq!(engine.state(), TimerState::Paused);
    assert_eq!(engine.time_left_secs(), 0);
}

#[test]
fn malformed_snapshot_is_discarded() {
    let h = Harness::new();
    h.snapshots.set(keys::TIMER_STATE, "{not json").unwrap();

    let engine = TimerEngine::new(h.ctx());
    assert_eq!(engine.state(), TimerState::Idle);
    assert!(h.snapshots.get(keys::TIMER_STATE).unwrap().is_none());
}

#[test]
fn restored_session_resumes_without_auto_start() {
    let h = Harness::new();
    {
        let mut app = FocusApp::new(h.ctx(), Box::new(FakeAudioBackend::new()));
        app.start();
        app.advance(std::time::Duration::from_secs(30));
        app.persist();
    }
    h.clock.advance(Duration::seconds(10));

    let mut app = FocusApp::new(h.ctx(), Box::new(FakeAudioBackend::new()));
    assert!(app.timer().is_paused());
    assert_eq!(app.timer().time_left_secs(), 1460);
    assert!(!app.has_tick_job());
    assert!(app.timer().remote_session_id().is_some());

    app.start();
    assert!(app.has_tick_job());
    assert_eq!(h.backend.started().len(), 1);
}
