//! Host clock adapter.
//!
//! Implements [`Clock`] with the local wall clock for record timestamps and
//! shutdown-aware sleeps for pacing.

use core::time::Duration;
use std::sync::Arc;

use crate::app::ports::Clock;
use crate::sensors::Timestamp;
use crate::shutdown::ShutdownSignal;

/// Wall clock whose sleeps end early on shutdown.
#[derive(Debug, Clone)]
pub struct SystemClock {
    shutdown: Arc<ShutdownSignal>,
}

impl SystemClock {
    pub fn new(shutdown: Arc<ShutdownSignal>) -> Self {
        Self { shutdown }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    fn sleep(&self, duration: Duration) -> bool {
        !self.shutdown.wait_timeout(duration)
    }
}
