//! Outbound records.
//!
//! The pollers and the [`PumpController`](super::controller::PumpController)
//! emit these through the [`RecordSink`](super::ports::RecordSink) port.
//! Every record renders as exactly one line of the data log:
//!
//! ```text
//! 2019.06.02_14:03:11 28.ff.90.86.92.16.05.31 41.625
//! 2019.06.02_14:03:12 EVENT turned_on_pump
//! 2019.06.02_14:09:40 EVENT last_watched_sample_39.9_C
//! ```

use core::fmt;

use crate::sensors::{Reading, Timestamp};

/// Marker field that separates events from readings in the log.
pub const EVENT_MARKER: &str = "EVENT";

/// Control events written to the data log.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// The controller process started.
    StartingController,
    /// Watched devices switched to the fast cadence.
    IncreaseSensorSamplingRate,
    /// The pump was switched on.
    TurnedOnPump,
    /// The watched value that ended a pumping phase.
    LastWatchedSample(f64),
    /// The pump is being switched off.
    TurningOffPump,
    /// Watched devices switched back to the base cadence.
    BaseSensorSamplingRate,
    /// The controller is waiting for the pile to re-heat.
    Waiting { secs: u64 },
    /// The controller is shutting down.
    StoppingController,
}

impl EventKind {
    /// Fixed tag written after the event marker.
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::StartingController => "starting_controller",
            Self::IncreaseSensorSamplingRate => "increase_sensor_sampling_rate",
            Self::TurnedOnPump => "turned_on_pump",
            Self::LastWatchedSample(_) => "last_watched_sample",
            Self::TurningOffPump => "turning_off_pump",
            Self::BaseSensorSamplingRate => "base_sensor_sampling_rate",
            Self::Waiting { .. } => "waiting",
            Self::StoppingController => "stopping_controller",
        }
    }
}

/// `<tag>[_<detail>]`
impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastWatchedSample(value) => write!(f, "{}_{value}_C", self.tag()),
            Self::Waiting { secs } => write!(f, "{}_{secs}_seconds", self.tag()),
            other => f.write_str(other.tag()),
        }
    }
}

/// A timestamped control event.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlEvent {
    pub timestamp: Timestamp,
    pub kind: EventKind,
}

impl ControlEvent {
    pub fn new(timestamp: Timestamp, kind: EventKind) -> Self {
        Self { timestamp, kind }
    }
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {EVENT_MARKER} {}", self.timestamp, self.kind)
    }
}

/// One line of the data log.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    Reading(Reading),
    Event(ControlEvent),
}

impl LogRecord {
    pub fn as_reading(&self) -> Option<&Reading> {
        match self {
            Self::Reading(r) => Some(r),
            Self::Event(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&ControlEvent> {
        match self {
            Self::Event(e) => Some(e),
            Self::Reading(_) => None,
        }
    }
}

impl From<Reading> for LogRecord {
    fn from(r: Reading) -> Self {
        Self::Reading(r)
    }
}

impl From<ControlEvent> for LogRecord {
    fn from(e: ControlEvent) -> Self {
        Self::Event(e)
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reading(r) => fmt::Display::fmt(r, f),
            Self::Event(e) => fmt::Display::fmt(e, f),
        }
    }
}
