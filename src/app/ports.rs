//! Port traits: the hexagonal boundary between the control logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PumpController / pollers (domain)
//! ```
//!
//! Driven adapters (serial devices, the pump pin, the log file, the clock)
//! implement these traits.  The domain consumes them through generics or
//! trait objects, so the control loop never touches hardware directly and
//! every scenario can be replayed against mocks.

use core::time::Duration;

use crate::config::ControllerConfig;
use crate::error::{ConfigError, DeviceError};
use crate::sensors::Timestamp;

use super::events::LogRecord;

// ───────────────────────────────────────────────────────────────
// Device session (driven adapter: serial link → domain)
// ───────────────────────────────────────────────────────────────

/// One open link to a sensor controller.
///
/// A session is owned by exactly one poller at a time; it moves into a
/// [`PollingCycleManager`](crate::polling::PollingCycleManager) and comes
/// back out of `stop()`.
pub trait DeviceSession: Send {
    /// Human-readable name for diagnostics (usually the device path).
    fn name(&self) -> &str;

    /// Request one sampling round and return the raw lines that arrived
    /// before the end-of-round sentinel.
    fn poll_once(&mut self) -> Result<Vec<String>, DeviceError>;
}

/// Owned, type-erased device session.
pub type BoxedDevice = Box<dyn DeviceSession>;

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the controller calls this to switch the pump.
/// Switching is assumed to always succeed once the actuator was acquired.
pub trait ActuatorPort {
    fn pump_on(&mut self);

    fn pump_off(&mut self);

    fn is_pump_on(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Record sink port (driven adapter: domain → data log)
// ───────────────────────────────────────────────────────────────

/// Many producers, one ordered log.  `submit` may block while the
/// underlying queue is full.
pub trait RecordSink: Send + Sync {
    fn submit(&self, record: LogRecord);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall clock plus the controller's pacing sleeps.
pub trait Clock: Send + Sync {
    /// Current wall-clock time for log records.
    fn now(&self) -> Timestamp;

    /// Sleep for `duration`.  Returns `false` when the sleep was cut short
    /// by a shutdown request.
    fn sleep(&self, duration: Duration) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads the controller configuration.
///
/// Implementations MUST validate before returning; the controller never
/// re-checks ranges.
pub trait ConfigPort {
    fn load(&self) -> Result<ControllerConfig, ConfigError>;
}
