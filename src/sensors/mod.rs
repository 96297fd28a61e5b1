//! Sensor data: readings, the line parser, the watched-value store and
//! the static name table.
//!
//! The physical sensors (DS18B20 probes) hang off microcontrollers reached
//! over serial links; see [`crate::adapters::serial`] for the link itself.

pub mod names;
pub mod reading;
pub mod watched;

pub use reading::{Reading, Timestamp, parse_device_line};
pub use watched::WatchedValue;
