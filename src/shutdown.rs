//! Process shutdown coordination.
//!
//! A [`ShutdownSignal`] is raised once (by an OS signal or by the caller)
//! and observed by every blocking wait in the controller.  Waiters sleep on
//! a condition variable, so a request wakes them immediately instead of at
//! the end of a multi-hour reheat sleep.

use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// An OS signal (SIGINT, SIGTERM, SIGHUP, SIGQUIT).
    Signal(i32),
    /// Requested from inside the process.
    UserRequest,
}

#[derive(Debug, Default)]
pub struct ShutdownSignal {
    reason: Mutex<Option<ShutdownReason>>,
    wake: Condvar,
    signal_handle: Mutex<Option<Handle>>,
    listener: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal.  The first reason wins; later requests are no-ops.
    pub fn request(&self, reason: ShutdownReason) {
        let mut current = lock_or_recover(&self.reason);
        if current.is_none() {
            info!("shutdown requested: {reason:?}");
            *current = Some(reason);
            self.wake.notify_all();
        }
    }

    pub fn is_requested(&self) -> bool {
        lock_or_recover(&self.reason).is_some()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *lock_or_recover(&self.reason)
    }

    /// Block for up to `timeout`.  Returns `true` as soon as shutdown is
    /// requested (including before the call), `false` if the time ran out.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut reason = lock_or_recover(&self.reason);
        while reason.is_none() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            reason = match self.wake.wait_timeout(reason, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    /// Start a listener thread that turns SIGINT/SIGTERM/SIGHUP/SIGQUIT into
    /// a shutdown request.  Calling it again is a no-op.
    pub fn register_signals(self: &Arc<Self>) -> io::Result<()> {
        let mut handle_slot = lock_or_recover(&self.signal_handle);
        if handle_slot.is_some() {
            return Ok(());
        }

        let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGQUIT])?;
        let handle = signals.handle();

        let shutdown = Arc::clone(self);
        let listener = thread::Builder::new()
            .name("signal-listener".to_owned())
            .spawn(move || {
                for signal in signals.forever() {
                    shutdown.request(ShutdownReason::Signal(signal));
                }
            })?;

        *handle_slot = Some(handle);
        *lock_or_recover(&self.listener) = Some(listener);
        debug!("signal listener started");
        Ok(())
    }

    /// Stop the listener thread, if any.
    pub fn stop_signal_listener(&self) {
        if let Some(handle) = lock_or_recover(&self.signal_handle).take() {
            handle.close();
        }
        if let Some(listener) = lock_or_recover(&self.listener).take() {
            if listener.join().is_err() {
                warn!("signal listener thread panicked while stopping");
            }
        }
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
