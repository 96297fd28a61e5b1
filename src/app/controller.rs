//! Pump controller: the top-level control loop.
//!
//! Owns the actuator, the watched-value store and every polling manager.
//! Pure domain logic: all I/O goes through port traits, so the whole cycle
//! runs against mocks in tests.
//!
//! ```text
//! starting_controller
//! monitored devices ── base cadence ─────────────────────────────────▶ (whole run)
//! wait startup delay
//! loop {
//!   CIRCULATING  watched ── fast cadence     increase_sensor_sampling_rate, settle
//!   PUMPING      pump on                     turned_on_pump, warm-up,
//!                every fast interval: value >= threshold → keep pumping
//!                                     value <  threshold → last_watched_sample_<v>_C
//!   DRAINING     pump off                    turning_off_pump, settle, stop fast
//!   COOLDOWN     watched ── base cadence     base_sensor_sampling_rate,
//!                                            waiting_<s>_seconds, reheat, stop
//! }
//! ```
//!
//! Every wait goes through [`Clock::sleep`].  When a sleep reports shutdown
//! the controller switches the pump off, stops its managers, emits
//! `stopping_controller` and returns.

use core::time::Duration;
use std::sync::Arc;

use log::{info, warn};

use super::events::{ControlEvent, EventKind};
use super::ports::{ActuatorPort, BoxedDevice, Clock, RecordSink};
use crate::config::ControllerConfig;
use crate::discovery::DeviceSets;
use crate::error::{Error, Result};
use crate::fsm::{PumpFsm, PumpState, StateCell};
use crate::polling::{PollContext, PollingCycleManager, Watch};
use crate::sensors::WatchedValue;

/// Why a cycle did not complete.
enum Halt {
    /// A sleep was cut short by a shutdown request.
    Shutdown,
    /// A manager could not be started.
    Fault(Error),
}

impl From<Error> for Halt {
    fn from(e: Error) -> Self {
        Self::Fault(e)
    }
}

type Step = core::result::Result<(), Halt>;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// The controller's share of [`ControllerConfig`].
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub base_interval: Duration,
    pub fast_interval: Duration,
    pub settle_delay: Duration,
    pub warmup_delay: Duration,
    pub reheat: Duration,
    pub startup_delay: Duration,
    pub pump_threshold: f64,
    pub watched_sensor_id: String,
}

impl From<&ControllerConfig> for ControllerSettings {
    fn from(cfg: &ControllerConfig) -> Self {
        Self {
            base_interval: cfg.base_interval(),
            fast_interval: cfg.fast_interval(),
            settle_delay: cfg.settle_delay(),
            warmup_delay: cfg.warmup_delay(),
            reheat: cfg.reheat(),
            startup_delay: cfg.startup_delay(),
            pump_threshold: cfg.pump_threshold,
            watched_sensor_id: cfg.watched_sensor_id.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct PumpController<A: ActuatorPort> {
    settings: ControllerSettings,
    actuator: A,
    sink: Arc<dyn RecordSink>,
    clock: Arc<dyn Clock>,
    store: Arc<WatchedValue>,
    fsm: PumpFsm,
    /// Watched devices while no manager owns them.
    watched: Vec<BoxedDevice>,
    /// Monitored devices until the background manager takes them.
    monitored: Vec<BoxedDevice>,
    /// Manager over the watched devices (fast or reheat cadence).
    active: Option<PollingCycleManager>,
    /// Manager over the monitored devices, base cadence, whole run.
    background: Option<PollingCycleManager>,
}

impl<A: ActuatorPort> PumpController<A> {
    pub fn new(
        settings: ControllerSettings,
        actuator: A,
        devices: DeviceSets,
        sink: Arc<dyn RecordSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(WatchedValue::new(settings.pump_threshold));
        Self {
            settings,
            actuator,
            sink,
            clock,
            store,
            fsm: PumpFsm::new(),
            watched: devices.watched,
            monitored: devices.monitored,
            active: None,
            background: None,
        }
    }

    /// Shared handle to the watched-value store.
    pub fn watched_value(&self) -> Arc<WatchedValue> {
        Arc::clone(&self.store)
    }

    /// Observer handle for the current pump phase.
    pub fn state_handle(&self) -> Arc<StateCell> {
        self.fsm.handle()
    }

    pub fn state(&self) -> PumpState {
        self.fsm.current()
    }

    /// Completed pump cycles.
    pub fn cycles(&self) -> u64 {
        self.fsm.cycles()
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Run until shutdown.  Returns `Ok` after a requested shutdown and
    /// `Err` only if a polling manager could not be started; the pump is
    /// off and every manager joined either way.
    pub fn run(&mut self) -> Result<()> {
        let outcome = self.run_until_halt();
        self.finish();
        match outcome {
            Halt::Shutdown => Ok(()),
            Halt::Fault(e) => Err(e),
        }
    }

    fn run_until_halt(&mut self) -> Halt {
        self.actuator.pump_off();
        self.emit(EventKind::StartingController);

        if let Err(halt) = self.start_background() {
            return halt;
        }
        info!(
            "waiting {}s for monitors before the first pump cycle",
            self.settings.startup_delay.as_secs()
        );
        if let Err(halt) = self.pause(self.settings.startup_delay) {
            return halt;
        }

        loop {
            if let Err(halt) = self.run_cycle() {
                return halt;
            }
        }
    }

    /// One Circulating → Pumping → Draining → Cooldown pass.
    fn run_cycle(&mut self) -> Step {
        let s = self.settings.clone();

        // ── Circulating ──
        self.fsm.advance();
        self.start_watched("fast", s.fast_interval)?;
        self.emit(EventKind::IncreaseSensorSamplingRate);
        self.pause(s.settle_delay)?;

        // ── Pumping ──
        self.fsm.advance();
        self.actuator.pump_on();
        self.emit(EventKind::TurnedOnPump);
        self.pause(s.warmup_delay)?;
        loop {
            self.pause(s.fast_interval)?;
            let value = self.store.get();
            if value < s.pump_threshold {
                info!("watched value {value} below {}", s.pump_threshold);
                self.emit(EventKind::LastWatchedSample(value));
                break;
            }
        }

        // ── Draining ──
        self.fsm.advance();
        self.actuator.pump_off();
        self.emit(EventKind::TurningOffPump);
        self.pause(s.settle_delay)?;
        self.stop_watched();

        // ── Cooldown ──
        self.fsm.advance();
        self.emit(EventKind::BaseSensorSamplingRate);
        self.start_watched("reheat", s.base_interval)?;
        self.emit(EventKind::Waiting {
            secs: s.reheat.as_secs(),
        });
        self.pause(s.reheat)?;
        self.stop_watched();

        Ok(())
    }

    /// Shutdown path: pump off, every manager joined, final event.
    fn finish(&mut self) {
        self.actuator.pump_off();
        self.stop_watched();
        if let Some(background) = self.background.take() {
            self.monitored = background.stop();
        }
        self.emit(EventKind::StoppingController);
        info!(
            "controller stopped in {} after {} cycle(s)",
            self.fsm.current(),
            self.fsm.cycles()
        );
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn pause(&self, duration: Duration) -> Step {
        if self.clock.sleep(duration) {
            Ok(())
        } else {
            Err(Halt::Shutdown)
        }
    }

    fn emit(&self, kind: EventKind) {
        self.sink
            .submit(ControlEvent::new(self.clock.now(), kind).into());
    }

    fn poll_context(&self) -> PollContext {
        PollContext::new(Arc::clone(&self.sink), Arc::clone(&self.clock)).watching(Watch::new(
            &self.settings.watched_sensor_id,
            Arc::clone(&self.store),
        ))
    }

    fn start_background(&mut self) -> Step {
        let devices = core::mem::take(&mut self.monitored);
        let manager = PollingCycleManager::start(
            "monitored",
            devices,
            self.settings.base_interval,
            self.poll_context(),
        )?;
        self.background = Some(manager);
        Ok(())
    }

    fn start_watched(&mut self, label: &str, interval: Duration) -> Step {
        if self.active.is_some() {
            warn!("watched devices already polled; restarting at {interval:?}");
            self.stop_watched();
        }
        let devices = core::mem::take(&mut self.watched);
        let manager = PollingCycleManager::start(label, devices, interval, self.poll_context())?;
        self.active = Some(manager);
        Ok(())
    }

    fn stop_watched(&mut self) {
        if let Some(manager) = self.active.take() {
            self.watched = manager.stop();
        }
    }
}
