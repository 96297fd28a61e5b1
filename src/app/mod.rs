//! Application core: control logic behind port traits.
//!
//! This module contains the pump controller and the records it emits.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer testable without serial devices or GPIO.

pub mod controller;
pub mod events;
pub mod ports;
