//! Port pollers and the polling cycle manager.
//!
//! ```text
//!   PollingCycleManager thread
//!     loop {
//!       ┌ round ───────────────────────────────────────┐
//!       │ scope { poll_device(dev0) | poll_device(dev1) | … }  (one thread each)
//!       └──────────────────────────────────────────────┘
//!       wait until previous start + interval (no wait if overrun)
//!     }
//! ```
//!
//! A manager owns its device sessions for its whole life and hands them back
//! from [`PollingCycleManager::stop`].  Cadence changes are made by stopping
//! one manager and starting another with the returned sessions.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use core::time::Duration;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::app::ports::{BoxedDevice, Clock, DeviceSession, RecordSink};
use crate::error::{Error, Result};
use crate::sensors::{WatchedValue, parse_device_line};

// ---------------------------------------------------------------------------
// Poll context
// ---------------------------------------------------------------------------

/// Watched sensor id plus the store its readings are copied into.
#[derive(Clone)]
pub struct Watch {
    pub sensor_id: Arc<str>,
    pub store: Arc<WatchedValue>,
}

impl Watch {
    pub fn new(sensor_id: &str, store: Arc<WatchedValue>) -> Self {
        Self {
            sensor_id: Arc::from(sensor_id),
            store,
        }
    }
}

/// Everything a poller needs besides the device itself.
#[derive(Clone)]
pub struct PollContext {
    pub sink: Arc<dyn RecordSink>,
    pub clock: Arc<dyn Clock>,
    pub watch: Option<Watch>,
}

impl PollContext {
    pub fn new(sink: Arc<dyn RecordSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sink,
            clock,
            watch: None,
        }
    }

    pub fn watching(mut self, watch: Watch) -> Self {
        self.watch = Some(watch);
        self
    }
}

// ---------------------------------------------------------------------------
// Port poller
// ---------------------------------------------------------------------------

/// Outcome of polling one device for one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub readings: usize,
    pub malformed: usize,
    /// The device produced no data this round (timeout or link error).
    pub failed: bool,
}

impl RoundReport {
    fn gap() -> Self {
        Self {
            failed: true,
            ..Self::default()
        }
    }
}

/// Poll one device once and route its lines.  A failing device counts as a
/// gap, never as an error.
pub fn poll_device(device: &mut dyn DeviceSession, ctx: &PollContext) -> RoundReport {
    match device.poll_once() {
        Ok(lines) => route_lines(device.name(), &lines, ctx),
        Err(e) => {
            warn!("{}: no data this round: {e}", device.name());
            RoundReport::gap()
        }
    }
}

/// Parse each raw line; submit readings to the sink and copy the watched
/// sensor's value into the store.  Malformed lines are reported and dropped.
pub fn route_lines(device: &str, lines: &[String], ctx: &PollContext) -> RoundReport {
    let mut report = RoundReport::default();
    for (idx, line) in lines.iter().enumerate() {
        match parse_device_line(line, ctx.clock.now()) {
            Ok(reading) => {
                if let Some(watch) = &ctx.watch {
                    if reading.sensor_id == *watch.sensor_id {
                        watch.store.set(reading.value);
                    }
                }
                ctx.sink.submit(reading.into());
                report.readings += 1;
            }
            Err(e) => {
                warn!("{device}: line {}: {e}: {line:?}", idx + 1);
                report.malformed += 1;
            }
        }
    }
    report
}

/// Poll every device concurrently, one scoped thread each.  Returns when
/// every device task has finished.
pub fn run_round(devices: &mut [BoxedDevice], ctx: &PollContext) -> Vec<RoundReport> {
    thread::scope(|s| {
        let tasks: Vec<_> = devices
            .iter_mut()
            .map(|device| s.spawn(move || poll_device(device.as_mut(), ctx)))
            .collect();
        tasks
            .into_iter()
            .map(|task| {
                task.join().unwrap_or_else(|_| {
                    error!("device poller panicked");
                    RoundReport::gap()
                })
            })
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Cadence
// ---------------------------------------------------------------------------

/// Fixed-cadence schedule: each round is due one interval after the
/// previous round was *due*, not after it finished.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    interval: Duration,
    next: Instant,
}

impl Cadence {
    pub fn new(interval: Duration, first: Instant) -> Self {
        Self {
            interval,
            next: first,
        }
    }

    /// When the upcoming round is due.
    pub fn due(&self) -> Instant {
        self.next
    }

    /// Schedule the next round and return how long to wait from `now`.
    /// Zero when the last round overran; rounds are never skipped.
    pub fn advance(&mut self, now: Instant) -> Duration {
        self.next += self.interval;
        self.next.saturating_duration_since(now)
    }
}

// ---------------------------------------------------------------------------
// Polling cycle manager
// ---------------------------------------------------------------------------

/// Runs rounds over a fixed set of devices at a fixed interval on its own
/// thread until stopped.
pub struct PollingCycleManager {
    label: String,
    stop: Arc<AtomicBool>,
    rounds: Arc<AtomicU64>,
    worker: Option<JoinHandle<Vec<BoxedDevice>>>,
}

impl PollingCycleManager {
    /// Take ownership of `devices` and start polling them immediately.
    pub fn start(
        label: &str,
        devices: Vec<BoxedDevice>,
        interval: Duration,
        ctx: PollContext,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let rounds = Arc::new(AtomicU64::new(0));

        info!(
            "polling[{label}]: {} device(s) every {:?}",
            devices.len(),
            interval
        );

        let worker = {
            let label = label.to_string();
            let stop = Arc::clone(&stop);
            let rounds = Arc::clone(&rounds);
            thread::Builder::new()
                .name(format!("poll-{label}"))
                .spawn(move || cycle_loop(&label, devices, interval, &ctx, &stop, &rounds))
                .map_err(|e| Error::Init(format!("polling thread: {e}")))?
        };

        Ok(Self {
            label: label.to_string(),
            stop,
            rounds,
            worker: Some(worker),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Rounds completed so far.
    pub fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::Acquire)
    }

    /// Request stop, wait for the in-flight round to finish, and return the
    /// device sessions.  No round starts after this returns.
    pub fn stop(mut self) -> Vec<BoxedDevice> {
        self.halt()
    }

    fn halt(&mut self) -> Vec<BoxedDevice> {
        let Some(worker) = self.worker.take() else {
            return Vec::new();
        };
        self.stop.store(true, Ordering::Release);
        worker.thread().unpark();
        match worker.join() {
            Ok(devices) => {
                debug!(
                    "polling[{}]: stopped after {} round(s)",
                    self.label,
                    self.rounds()
                );
                devices
            }
            Err(_) => {
                error!("polling[{}]: worker panicked, devices lost", self.label);
                Vec::new()
            }
        }
    }
}

impl Drop for PollingCycleManager {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.halt();
        }
    }
}

fn cycle_loop(
    label: &str,
    mut devices: Vec<BoxedDevice>,
    interval: Duration,
    ctx: &PollContext,
    stop: &AtomicBool,
    rounds: &AtomicU64,
) -> Vec<BoxedDevice> {
    let mut cadence = Cadence::new(interval, Instant::now());

    while !stop.load(Ordering::Acquire) {
        let reports = run_round(&mut devices, ctx);
        let done = rounds.fetch_add(1, Ordering::AcqRel) + 1;
        let readings: usize = reports.iter().map(|r| r.readings).sum();
        let malformed: usize = reports.iter().map(|r| r.malformed).sum();
        let gaps = reports.iter().filter(|r| r.failed).count();
        debug!(
            "polling[{label}]: round {done}: {readings} reading(s), {malformed} malformed, {gaps} gap(s)"
        );

        let wait = cadence.advance(Instant::now());
        if wait.is_zero() {
            debug!("polling[{label}]: round overran the interval");
        }
        let due = cadence.due();
        // park_timeout may wake spuriously; stop() unparks us.
        while !stop.load(Ordering::Acquire) {
            let now = Instant::now();
            if now >= due {
                break;
            }
            thread::park_timeout(due - now);
        }
    }

    devices
}
