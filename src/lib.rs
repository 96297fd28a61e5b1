//! Mound controller library.
//!
//! Exposes the control logic, the adapters and the offline tools for the
//! `moundctl` binary and for integration testing.  Hardware is only
//! reached through the adapters; everything under [`app`] runs against
//! the port traits.

#![deny(unused_must_use)]

pub mod adapters;
pub mod aggregate;
pub mod app;
pub mod config;
pub mod discovery;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod logging;
pub mod polling;
pub mod sensors;
pub mod shutdown;

pub use error::{Error, Result};
