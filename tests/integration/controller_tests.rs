//! Pump controller scenarios against mock hardware.

use std::sync::Arc;
use std::time::Duration;

use moundctl::app::controller::{ControllerSettings, PumpController};
use moundctl::app::ports::{ActuatorPort, BoxedDevice};
use moundctl::discovery::DeviceSets;
use moundctl::fsm::PumpState;

use crate::mock_hw::{ActuatorCall, MockDevice, MockPump, RecordingSink, ScriptedClock};

const FAST: Duration = Duration::from_millis(1);
const SETTLE: Duration = Duration::from_millis(2);
const WARMUP: Duration = Duration::from_millis(3);
const BASE: Duration = Duration::from_millis(5);
const STARTUP: Duration = Duration::from_millis(7);
const REHEAT: Duration = Duration::from_secs(5400);

fn settings() -> ControllerSettings {
    ControllerSettings {
        base_interval: BASE,
        fast_interval: FAST,
        settle_delay: SETTLE,
        warmup_delay: WARMUP,
        reheat: REHEAT,
        startup_delay: STARTUP,
        pump_threshold: 40.0,
        watched_sensor_id: "28.ff.90.86.92.16.05.31".into(),
    }
}

fn devices() -> DeviceSets {
    let watched: Vec<BoxedDevice> = vec![Box::new(MockDevice::with_lines(
        "watched",
        &["1 pipe 20.0"],
    ))];
    let monitored: Vec<BoxedDevice> = vec![
        Box::new(MockDevice::with_lines("pile", &["1 a 55.0", "1 b 56.5"])),
        Box::new(MockDevice::silent("empty")),
    ];
    DeviceSets { watched, monitored }
}

struct Harness {
    controller: PumpController<MockPump>,
    sink: Arc<RecordingSink>,
    clock: Arc<ScriptedClock>,
}

fn harness(values: &[f64], reheats: usize) -> Harness {
    let sink = Arc::new(RecordingSink::default());
    let clock = Arc::new(ScriptedClock::new(FAST, REHEAT, values, reheats));
    let controller = PumpController::new(
        settings(),
        MockPump::default(),
        devices(),
        sink.clone(),
        clock.clone(),
    );
    clock.attach(controller.watched_value(), controller.state_handle());
    Harness {
        controller,
        sink,
        clock,
    }
}

#[test]
fn pumps_until_value_drops_below_threshold() {
    let mut h = harness(&[45.0, 42.0, 40.0, 39.9], 1);
    h.controller.run().unwrap();

    assert_eq!(
        h.sink.events(),
        [
            "starting_controller",
            "increase_sensor_sampling_rate",
            "turned_on_pump",
            "last_watched_sample_39.9_C",
            "turning_off_pump",
            "base_sensor_sampling_rate",
            "waiting_5400_seconds",
            "stopping_controller",
        ]
    );
    // 45, 42 and 40 keep pumping; 39.9 ends the phase.
    assert_eq!(h.clock.fast_sleeps(), 4);
    assert_eq!(
        h.controller.actuator().calls,
        [
            ActuatorCall::Off,
            ActuatorCall::On,
            ActuatorCall::Off,
            ActuatorCall::Off,
        ]
    );
    assert!(!h.controller.actuator().is_pump_on());
}

#[test]
fn value_equal_to_threshold_keeps_pumping() {
    let mut h = harness(&[40.0, 40.0, 40.0], 1);
    h.controller.run().unwrap();

    let events = h.sink.events();
    assert!(!events.iter().any(|e| e.starts_with("last_watched_sample")));
    assert_eq!(events.last().map(String::as_str), Some("stopping_controller"));
    // Three samples at the threshold, then the fourth sleep hit shutdown.
    assert_eq!(h.clock.fast_sleeps(), 4);
    assert_eq!(h.controller.state(), PumpState::Pumping);
    assert!(!h.controller.actuator().is_pump_on());
}

#[test]
fn phases_wait_in_the_right_state() {
    let mut h = harness(&[39.0], 1);
    h.controller.run().unwrap();

    let sleeps = h.clock.sleeps();
    assert_eq!(
        sleeps,
        [
            (STARTUP, Some(PumpState::Idle)),
            (SETTLE, Some(PumpState::Circulating)),
            (WARMUP, Some(PumpState::Pumping)),
            (FAST, Some(PumpState::Pumping)),
            (SETTLE, Some(PumpState::Draining)),
            (REHEAT, Some(PumpState::Cooldown)),
        ]
    );
}

#[test]
fn cycle_repeats_after_reheat() {
    let mut h = harness(&[45.0, 39.0, 41.0, 30.5], 2);
    h.controller.run().unwrap();

    let events = h.sink.events();
    let pump_ons = events.iter().filter(|e| *e == "turned_on_pump").count();
    assert_eq!(pump_ons, 2);
    assert!(events.contains(&"last_watched_sample_39_C".to_string()));
    assert!(events.contains(&"last_watched_sample_30.5_C".to_string()));
    assert_eq!(h.controller.cycles(), 1);
    assert_eq!(h.controller.state(), PumpState::Cooldown);
}

#[test]
fn shutdown_during_first_sample_leaves_pump_off() {
    // No scripted values: the first fast-interval sleep reports shutdown.
    let mut h = harness(&[], 1);
    h.controller.run().unwrap();

    let events = h.sink.events();
    assert_eq!(events.first().map(String::as_str), Some("starting_controller"));
    assert_eq!(events.last().map(String::as_str), Some("stopping_controller"));
    assert!(events.contains(&"turned_on_pump".to_string()));
    assert!(!events.iter().any(|e| e == "turning_off_pump"));
    assert_eq!(h.controller.actuator().calls.last(), Some(&ActuatorCall::Off));
}

#[test]
fn every_watched_poll_reaches_the_sink() {
    let sink = Arc::new(RecordingSink::default());
    let clock = Arc::new(ScriptedClock::new(FAST, REHEAT, &[], 1));

    let watched = MockDevice::with_lines("watched", &["1 28.ff.90.86.92.16.05.31 47.25"]);
    let polls = watched.poll_counter();
    let watched: BoxedDevice = Box::new(watched);
    let sets = DeviceSets {
        watched: vec![watched],
        monitored: Vec::new(),
    };
    let mut controller =
        PumpController::new(settings(), MockPump::default(), sets, sink.clone(), clock.clone());
    clock.attach(controller.watched_value(), controller.state_handle());
    controller.run().unwrap();

    // Every watched-device poll produced exactly one reading.
    let readings = sink.readings();
    assert_eq!(readings.len(), polls.load(std::sync::atomic::Ordering::SeqCst));
    assert!(readings.iter().all(|r| r.sensor_id == "28.ff.90.86.92.16.05.31"));
}
