//! Latest value of the watched sensor.
//!
//! Written by whichever poller parses a line from the watched sensor, read
//! by the pump controller.  Access goes through a closure-scoped critical
//! section, so the lock is released before `get`/`set` return and can never
//! be held across a sleep or I/O.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Mutex-guarded scalar shared between the pollers and the controller.
pub struct WatchedValue {
    value: Mutex<CriticalSectionRawMutex, Cell<f64>>,
}

impl WatchedValue {
    /// Seed the store so the controller never sees an undefined value.
    /// The controller seeds it with the pump threshold.
    pub const fn new(initial: f64) -> Self {
        Self {
            value: Mutex::new(Cell::new(initial)),
        }
    }

    pub fn set(&self, value: f64) {
        self.value.lock(|v| v.set(value));
    }

    pub fn get(&self) -> f64 {
        self.value.lock(Cell::get)
    }
}

impl core::fmt::Debug for WatchedValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("WatchedValue").field(&self.get()).finish()
    }
}
