//! Unified error types for the mound controller.
//!
//! `Error` covers resources the library itself acquires: the data log file
//! and its worker threads.  Config, discovery, device, line and actuator
//! failures have their own small enums; the binary adds context to them
//! with `anyhow`.

use core::fmt;
use std::io;

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

/// Failures that end startup or the control loop.
#[derive(Debug)]
pub enum Error {
    /// A resource needed at startup could not be acquired.
    Init(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Device errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// No end-of-round sentinel arrived within the bound.
    Timeout,
    /// The serial link failed or was closed.
    Io(io::ErrorKind),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out waiting for end of round"),
            Self::Io(kind) => write!(f, "link error ({kind})"),
        }
    }
}

impl std::error::Error for DeviceError {}

impl From<io::Error> for DeviceError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout,
            kind => Self::Io(kind),
        }
    }
}

// ---------------------------------------------------------------------------
// Malformed readings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line did not split into exactly three tokens.
    TokenCount(usize),
    /// The value token is not a floating-point number.
    Value(String),
    /// The timestamp token is not in `YYYY.MM.DD_HH:MM:SS` form.
    Timestamp(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenCount(n) => write!(f, "expected 3 tokens, found {n}"),
            Self::Value(tok) => write!(f, "value {tok:?} is not a number"),
            Self::Timestamp(tok) => write!(f, "timestamp {tok:?} is not YYYY.MM.DD_HH:MM:SS"),
        }
    }
}

impl std::error::Error for ParseError {}

// ---------------------------------------------------------------------------
// Log sink errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// The sink has been closed; no further records are accepted.
    Closed,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl std::error::Error for SinkError {}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Writing the GPIO level failed.
    Gpio(io::ErrorKind),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpio(kind) => write!(f, "GPIO write failed ({kind})"),
        }
    }
}

impl std::error::Error for ActuatorError {}

impl From<io::Error> for ActuatorError {
    fn from(e: io::Error) -> Self {
        Self::Gpio(e.kind())
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Io(io::Error),
    /// The config file is not valid JSON for [`ControllerConfig`](crate::config::ControllerConfig).
    Corrupted(serde_json::Error),
    /// A config field failed range validation.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "read failed: {e}"),
            Self::Corrupted(e) => write!(f, "invalid config: {e}"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Discovery errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// No serial device matched the configured patterns.
    NoDevices,
    /// No device reported the watched sensor during the probe round.
    NoWatchedDevice { sensor_id: String },
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevices => write!(f, "no serial devices found"),
            Self::NoWatchedDevice { sensor_id } => {
                write!(f, "no device reported watched sensor {sensor_id}")
            }
        }
    }
}

impl std::error::Error for DiscoveryError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
