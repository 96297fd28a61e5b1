//! Circulation pump driver (relay on a single GPIO line).
//!
//! On/off control only.  The relay boards used for the mound pump are
//! active-low: driving the line low closes the relay.
//!
//! ## Safety contract
//!
//! The pump must be off whenever the controller is not running.  The driver
//! switches it off on construction and again when dropped, so every exit
//! path (normal shutdown, error return, panic unwind) leaves it off.

use embedded_hal::digital::OutputPin;
use log::{debug, error};

use crate::app::ports::ActuatorPort;

/// What the driver last commanded the motor to do.  Not to be confused
/// with the controller phase in [`crate::fsm::PumpState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorState {
    Stopped,
    Running,
}

pub struct PumpDriver<P: OutputPin> {
    pin: P,
    active_low: bool,
    state: MotorState,
    /// Number of off → on switches since construction.
    starts: u32,
}

impl<P: OutputPin> PumpDriver<P> {
    /// Take the pin and force the pump off.
    pub fn new(pin: P, active_low: bool) -> Result<Self, P::Error> {
        let mut driver = Self {
            pin,
            active_low,
            state: MotorState::Stopped,
            starts: 0,
        };
        driver.drive(false)?;
        Ok(driver)
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == MotorState::Running
    }

    pub fn starts(&self) -> u32 {
        self.starts
    }

    pub fn start(&mut self) -> Result<(), P::Error> {
        self.drive(true)?;
        if self.state == MotorState::Stopped {
            self.starts += 1;
        }
        self.state = MotorState::Running;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), P::Error> {
        self.drive(false)?;
        self.state = MotorState::Stopped;
        Ok(())
    }

    fn drive(&mut self, on: bool) -> Result<(), P::Error> {
        // Line level = on XOR active_low.
        if on != self.active_low {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }
}

impl<P: OutputPin> ActuatorPort for PumpDriver<P> {
    fn pump_on(&mut self) {
        match self.start() {
            Ok(()) => debug!("pump on"),
            Err(e) => error!("pump on failed: {e:?}"),
        }
    }

    fn pump_off(&mut self) {
        match self.stop() {
            Ok(()) => debug!("pump off"),
            Err(e) => error!("pump off failed: {e:?}"),
        }
    }

    fn is_pump_on(&self) -> bool {
        self.is_running()
    }
}

impl<P: OutputPin> Drop for PumpDriver<P> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("pump off on release failed: {e:?}");
        }
    }
}
