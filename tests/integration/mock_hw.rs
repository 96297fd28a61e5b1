//! Mock hardware for integration tests.
//!
//! Records every actuator call and every log record, and replaces wall-clock
//! sleeps with a script so the whole pump cycle runs in milliseconds.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use moundctl::app::events::LogRecord;
use moundctl::app::ports::{ActuatorPort, Clock, DeviceSession, RecordSink};
use moundctl::error::DeviceError;
use moundctl::fsm::{PumpState, StateCell};
use moundctl::sensors::{Reading, Timestamp, WatchedValue};

// ── Actuator ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    On,
    Off,
}

#[derive(Debug, Default)]
pub struct MockPump {
    pub calls: Vec<ActuatorCall>,
}

impl ActuatorPort for MockPump {
    fn pump_on(&mut self) {
        self.calls.push(ActuatorCall::On);
    }

    fn pump_off(&mut self) {
        self.calls.push(ActuatorCall::Off);
    }

    fn is_pump_on(&self) -> bool {
        self.calls.last() == Some(&ActuatorCall::On)
    }
}

// ── Sink ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<LogRecord>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Event tags with details, in order (`turned_on_pump`, …).
    pub fn events(&self) -> Vec<String> {
        self.records()
            .iter()
            .filter_map(|r| r.as_event().map(|e| e.kind.to_string()))
            .collect()
    }

    pub fn readings(&self) -> Vec<Reading> {
        self.records()
            .iter()
            .filter_map(|r| r.as_reading().cloned())
            .collect()
    }
}

impl RecordSink for RecordingSink {
    fn submit(&self, record: LogRecord) {
        self.records.lock().unwrap().push(record);
    }
}

// ── Clock ─────────────────────────────────────────────────────

/// Clock whose sleeps return immediately.
///
/// - every sleep of exactly `fast` feeds the next scripted value into the
///   watched store; when the script runs dry the sleep reports shutdown
/// - the `reheats`-th sleep of exactly `reheat` reports shutdown
pub struct ScriptedClock {
    fast: Duration,
    reheat: Duration,
    values: Mutex<VecDeque<f64>>,
    reheats_left: AtomicUsize,
    store: OnceLock<Arc<WatchedValue>>,
    state: OnceLock<Arc<StateCell>>,
    sleeps: Mutex<Vec<(Duration, Option<PumpState>)>>,
}

#[allow(dead_code)]
impl ScriptedClock {
    pub fn new(fast: Duration, reheat: Duration, values: &[f64], reheats: usize) -> Self {
        Self {
            fast,
            reheat,
            values: Mutex::new(values.iter().copied().collect()),
            reheats_left: AtomicUsize::new(reheats),
            store: OnceLock::new(),
            state: OnceLock::new(),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn attach(&self, store: Arc<WatchedValue>, state: Arc<StateCell>) {
        let _ = self.store.set(store);
        let _ = self.state.set(state);
    }

    /// Every sleep requested so far with the phase it was requested in.
    pub fn sleeps(&self) -> Vec<(Duration, Option<PumpState>)> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn fast_sleeps(&self) -> usize {
        self.sleeps().iter().filter(|(d, _)| *d == self.fast).count()
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> Timestamp {
        "2019.06.02_14:00:00".parse().unwrap()
    }

    fn sleep(&self, duration: Duration) -> bool {
        let phase = self.state.get().map(|s| s.load());
        self.sleeps.lock().unwrap().push((duration, phase));

        if duration == self.fast {
            let Some(value) = self.values.lock().unwrap().pop_front() else {
                return false;
            };
            if let Some(store) = self.store.get() {
                store.set(value);
            }
        }
        if duration == self.reheat {
            return self
                .reheats_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok_and(|before| before > 1);
        }
        true
    }
}

// ── Devices ───────────────────────────────────────────────────

/// What a mock device answers on every poll.
#[derive(Debug, Clone)]
pub enum Answer {
    Lines(Vec<String>),
    Timeout,
}

pub struct MockDevice {
    name: String,
    answer: Answer,
    polls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl MockDevice {
    pub fn new(name: &str, answer: Answer) -> Self {
        Self {
            name: name.to_string(),
            answer,
            polls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_lines(name: &str, lines: &[&str]) -> Self {
        Self::new(name, Answer::Lines(lines.iter().map(|l| l.to_string()).collect()))
    }

    /// Answers every poll with an immediate end-of-round.
    pub fn silent(name: &str) -> Self {
        Self::new(name, Answer::Lines(Vec::new()))
    }

    pub fn dead(name: &str) -> Self {
        Self::new(name, Answer::Timeout)
    }

    pub fn poll_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.polls)
    }
}

impl DeviceSession for MockDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll_once(&mut self) -> Result<Vec<String>, DeviceError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            Answer::Lines(lines) => Ok(lines.clone()),
            Answer::Timeout => Err(DeviceError::Timeout),
        }
    }
}
