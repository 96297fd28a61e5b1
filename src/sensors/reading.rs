//! Sensor readings and the line parser.
//!
//! Device output arrives one line per sensor:
//!
//! ```text
//! <device stamp> <sensor id> <value>
//! 1523 28.ff.90.86.92.16.05.31 41.6250
//! ```
//!
//! The device stamp is only checked for presence; every [`Reading`] is
//! stamped with the host wall clock when the line is received.  The log
//! record form replaces the device stamp with that timestamp, and
//! [`Reading::from_str`] parses it back.

use core::fmt;
use core::str::FromStr;

use chrono::{Local, NaiveDateTime, Timelike};
use heapless::Vec;

use crate::error::ParseError;

/// Timestamp layout used in every log record.
pub const TIMESTAMP_FORMAT: &str = "%Y.%m.%d_%H:%M:%S";

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// Wall-clock time with second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Current local time, truncated to whole seconds.
    pub fn now() -> Self {
        Self::from_naive(Local::now().naive_local())
    }

    /// Wrap a naive date-time, dropping sub-second precision.
    pub fn from_naive(at: NaiveDateTime) -> Self {
        Self(at.with_nanosecond(0).unwrap_or(at))
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
            .map(Self)
            .map_err(|_| ParseError::Timestamp(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// One sensor value.  Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: Timestamp,
    pub sensor_id: String,
    pub value: f64,
}

impl Reading {
    pub fn new(timestamp: Timestamp, sensor_id: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp,
            sensor_id: sensor_id.into(),
            value,
        }
    }
}

/// Log record form: `<timestamp> <sensor_id> <value>`.
impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.timestamp, self.sensor_id, self.value)
    }
}

impl FromStr for Reading {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let cleaned = strip_nul(line);
        let [stamp, id, value] = split_fields(&cleaned)?;
        Ok(Self {
            timestamp: stamp.parse()?,
            sensor_id: id.to_string(),
            value: parse_value(value)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse one raw device line, stamping the reading with `received_at`.
pub fn parse_device_line(raw: &str, received_at: Timestamp) -> Result<Reading, ParseError> {
    let cleaned = strip_nul(raw);
    let [_device_stamp, id, value] = split_fields(&cleaned)?;
    Ok(Reading {
        timestamp: received_at,
        sensor_id: id.to_string(),
        value: parse_value(value)?,
    })
}

/// `true` when the line carries nothing but whitespace and NUL bytes.
pub fn is_blank(raw: &str) -> bool {
    raw.chars().all(|c| c == '\0' || c.is_whitespace())
}

fn strip_nul(raw: &str) -> String {
    raw.chars().filter(|&c| c != '\0').collect()
}

/// Split into exactly three whitespace-separated tokens.
fn split_fields(line: &str) -> Result<[&str; 3], ParseError> {
    let mut tokens: Vec<&str, 3> = Vec::new();
    let mut count = 0;
    for tok in line.split_whitespace() {
        count += 1;
        // Keep counting past capacity so the error reports the real number.
        let _ = tokens.push(tok);
    }
    match tokens.as_slice() {
        [a, b, c] if count == 3 => Ok([*a, *b, *c]),
        _ => Err(ParseError::TokenCount(count)),
    }
}

fn parse_value(token: &str) -> Result<f64, ParseError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::Value(token.to_string()))
}
