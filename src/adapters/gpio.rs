//! GPIO output pins.
//!
//! | Pin          | Backing                         | Used by            |
//! |--------------|---------------------------------|--------------------|
//! | `SysfsPin`   | `/sys/class/gpio/gpioN/value`   | `run`, `pump-test` |
//! | `MemoryPin`  | shared atomic level             | `--dry-run`, tests |
//!
//! Both implement `embedded_hal::digital::OutputPin`, so the pump driver
//! never knows which one it is switching.

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use log::debug;

use crate::error::ActuatorError;

/// Default sysfs GPIO root.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// The kernel creates `gpioN/` asynchronously after export.
const EXPORT_RETRIES: u32 = 20;
const EXPORT_RETRY_DELAY: Duration = Duration::from_millis(50);

impl embedded_hal::digital::Error for ActuatorError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

// ---------------------------------------------------------------------------
// sysfs pin
// ---------------------------------------------------------------------------

/// Output pin driven through the legacy sysfs GPIO interface (BCM numbering
/// on a Raspberry Pi).
#[derive(Debug)]
pub struct SysfsPin {
    gpio: u32,
    value: File,
}

impl SysfsPin {
    /// Export `gpio` under [`SYSFS_GPIO_ROOT`] and configure it as an output.
    pub fn export(gpio: u32) -> Result<Self, ActuatorError> {
        Self::export_at(Path::new(SYSFS_GPIO_ROOT), gpio)
    }

    /// Export `gpio` under `root` and configure it as an output.
    pub fn export_at(root: &Path, gpio: u32) -> Result<Self, ActuatorError> {
        let pin_dir = root.join(format!("gpio{gpio}"));
        if !pin_dir.exists() {
            write_attr(&root.join("export"), &gpio.to_string())?;
        }

        let direction = pin_dir.join("direction");
        let mut attempt = 0;
        // "high" selects output with the line driven high, so an active-low
        // pump never glitches on during setup.
        while let Err(e) = write_attr(&direction, "high") {
            attempt += 1;
            if attempt >= EXPORT_RETRIES {
                return Err(e.into());
            }
            thread::sleep(EXPORT_RETRY_DELAY);
        }

        let value = OpenOptions::new().write(true).open(pin_dir.join("value"))?;
        debug!("gpio{gpio}: exported as output");
        Ok(Self { gpio, value })
    }

    pub fn gpio(&self) -> u32 {
        self.gpio
    }

    fn write_level(&mut self, high: bool) -> Result<(), ActuatorError> {
        self.value.rewind()?;
        self.value.write_all(if high { b"1" } else { b"0" })?;
        self.value.flush()?;
        Ok(())
    }
}

fn write_attr(path: &Path, value: &str) -> io::Result<()> {
    fs::write(path, value)
}

impl ErrorType for SysfsPin {
    type Error = ActuatorError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write_level(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write_level(true)
    }
}

// ---------------------------------------------------------------------------
// In-memory pin
// ---------------------------------------------------------------------------

/// Pin that only records its level.  Clones share the same level, so a
/// test or the dry-run logger can watch what the driver does.
#[derive(Debug, Clone)]
pub struct MemoryPin {
    high: Arc<AtomicBool>,
    writes: Arc<AtomicU32>,
}

impl MemoryPin {
    pub fn new(initial_high: bool) -> Self {
        Self {
            high: Arc::new(AtomicBool::new(initial_high)),
            writes: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn is_high(&self) -> bool {
        self.high.load(Ordering::Acquire)
    }

    /// Number of level writes so far.
    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::Acquire)
    }

    fn set(&self, high: bool) {
        self.high.store(high, Ordering::Release);
        self.writes.fetch_add(1, Ordering::AcqRel);
    }
}

impl ErrorType for MemoryPin {
    type Error = Infallible;
}

impl OutputPin for MemoryPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}
