//! Polling cycle manager scenarios: mixed device sets, watched routing and
//! the path to the data log file.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use moundctl::adapters::log_sink::LogSink;
use moundctl::app::ports::{BoxedDevice, Clock, RecordSink};
use moundctl::polling::{PollContext, PollingCycleManager, Watch, run_round};
use moundctl::sensors::{Reading, WatchedValue};

use crate::mock_hw::{MockDevice, RecordingSink, ScriptedClock};

fn clock() -> Arc<dyn Clock> {
    Arc::new(ScriptedClock::new(
        Duration::from_millis(1),
        Duration::from_secs(1),
        &[],
        0,
    ))
}

#[test]
fn zero_line_and_dead_devices_do_not_disturb_others() {
    let sink = Arc::new(RecordingSink::default());
    let ctx = PollContext::new(sink.clone(), clock());

    let busy = MockDevice::with_lines("busy", &["1 a 20.0", "1 b 21.0"]);
    let busy_polls = busy.poll_counter();
    let devices: Vec<BoxedDevice> = vec![
        Box::new(busy),
        Box::new(MockDevice::silent("quiet")),
        Box::new(MockDevice::dead("dead")),
    ];

    let manager = PollingCycleManager::start("mixed", devices, Duration::from_millis(2), ctx)
        .expect("manager starts");
    while manager.rounds() < 3 {
        thread::sleep(Duration::from_millis(1));
    }
    let back = manager.stop();

    let names: Vec<_> = back.iter().map(|d| d.name().to_string()).collect();
    assert_eq!(names, ["busy", "quiet", "dead"]);
    assert_eq!(
        sink.readings().len(),
        2 * busy_polls.load(Ordering::SeqCst)
    );
}

#[test]
fn round_reports_one_entry_per_device() {
    let sink = Arc::new(RecordingSink::default());
    let ctx = PollContext::new(sink.clone(), clock());
    let mut devices: Vec<BoxedDevice> = vec![
        Box::new(MockDevice::with_lines("a", &["1 s1 1.0", "junk"])),
        Box::new(MockDevice::silent("b")),
        Box::new(MockDevice::dead("c")),
    ];

    let reports = run_round(&mut devices, &ctx);

    assert_eq!(reports.len(), 3);
    assert_eq!((reports[0].readings, reports[0].malformed), (1, 1));
    assert_eq!((reports[1].readings, reports[1].failed), (0, false));
    assert!(reports[2].failed);
    assert_eq!(sink.readings().len(), 1);
}

#[test]
fn watched_sensor_updates_store_from_any_device() {
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(WatchedValue::new(40.0));
    let ctx = PollContext::new(sink.clone(), clock()).watching(Watch::new("w", store.clone()));

    let mut devices: Vec<BoxedDevice> = vec![
        Box::new(MockDevice::with_lines("a", &["1 other 99.0"])),
        Box::new(MockDevice::with_lines("b", &["1 w 38.5"])),
    ];
    run_round(&mut devices, &ctx);

    assert!((store.get() - 38.5).abs() < f64::EPSILON);
    assert_eq!(sink.readings().len(), 2);
}

#[test]
fn restarting_with_returned_devices_continues_polling() {
    let sink = Arc::new(RecordingSink::default());
    let dev = MockDevice::with_lines("only", &["1 s 1.5"]);
    let polls = dev.poll_counter();

    let fast = PollingCycleManager::start(
        "fast",
        vec![Box::new(dev) as BoxedDevice],
        Duration::from_millis(1),
        PollContext::new(sink.clone(), clock()),
    )
    .unwrap();
    while fast.rounds() < 2 {
        thread::sleep(Duration::from_millis(1));
    }
    let devices = fast.stop();
    let after_fast = polls.load(Ordering::SeqCst);

    let slow = PollingCycleManager::start(
        "slow",
        devices,
        Duration::from_millis(3),
        PollContext::new(sink.clone(), clock()),
    )
    .unwrap();
    while slow.rounds() < 1 {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(slow.stop().len(), 1);
    assert!(polls.load(Ordering::SeqCst) > after_fast);
}

#[test]
fn readings_reach_the_data_log_in_record_form() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mound_controller.log");
    let sink = Arc::new(LogSink::open(&path).unwrap());
    let record_sink: Arc<dyn RecordSink> = sink.clone();

    let mut devices: Vec<BoxedDevice> = vec![Box::new(MockDevice::with_lines(
        "a",
        &["17 28.ff.90.86.92.16.05.31 41.625", "18 s2 -3.5"],
    ))];
    run_round(&mut devices, &PollContext::new(record_sink, clock()));
    sink.close();

    let text = std::fs::read_to_string(&path).unwrap();
    let parsed: Vec<Reading> = text.lines().map(|l| l.parse().unwrap()).collect();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].sensor_id, "28.ff.90.86.92.16.05.31");
    assert!((parsed[1].value + 3.5).abs() < f64::EPSILON);
    assert_eq!(
        text.lines().next().unwrap(),
        "2019.06.02_14:00:00 28.ff.90.86.92.16.05.31 41.625"
    );
}
