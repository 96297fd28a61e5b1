//! Pump cycle state machine.
//!
//! ```text
//!        ┌──────┐
//!        │ Idle │  (startup, background monitoring only)
//!        └──┬───┘
//!           ▼
//!   ┌──▶ Circulating ──▶ Pumping ──▶ Draining ──▶ Cooldown ──┐
//!   └────────────────────────────────────────────────────────┘
//! ```
//!
//! The controller is a blocking, sequential loop, so the machine has no
//! table of handlers: every phase has exactly one successor and
//! [`PumpFsm::advance`] is the only way to move.  The current state lives in
//! a shared [`StateCell`] so other threads (the CLI, tests) can observe it
//! without touching the controller.

use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Phases of the pump cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PumpState {
    /// Only the monitored devices are being polled.
    Idle = 0,
    /// Watched devices sampled fast, pump still off.
    Circulating = 1,
    /// Pump on until the watched value drops below the threshold.
    Pumping = 2,
    /// Pump off, fast sampling continues for the settle delay.
    Draining = 3,
    /// Watched devices back at the base cadence while the pile re-heats.
    Cooldown = 4,
}

impl PumpState {
    /// Total number of states.
    pub const COUNT: usize = 5;

    /// Convert a `u8` index back to `PumpState`.  Out-of-range indices
    /// assert in debug builds and map to `Idle` in release.
    pub fn from_index(idx: u8) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Circulating,
            2 => Self::Pumping,
            3 => Self::Draining,
            4 => Self::Cooldown,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Circulating => "CIRCULATING",
            Self::Pumping => "PUMPING",
            Self::Draining => "DRAINING",
            Self::Cooldown => "COOLDOWN",
        }
    }

    /// The single successor of this phase.  Cooldown loops back to
    /// Circulating; nothing returns to Idle.
    pub const fn next(self) -> Self {
        match self {
            Self::Idle | Self::Cooldown => Self::Circulating,
            Self::Circulating => Self::Pumping,
            Self::Pumping => Self::Draining,
            Self::Draining => Self::Cooldown,
        }
    }

    /// `true` while the actuator is expected to be on.
    pub const fn pump_running(self) -> bool {
        matches!(self, Self::Pumping)
    }
}

impl core::fmt::Display for PumpState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Shared state cell
// ---------------------------------------------------------------------------

/// Lock-free, read-mostly mirror of the controller's current phase.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub const fn new(initial: PumpState) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn load(&self) -> PumpState {
        PumpState::from_index(self.0.load(Ordering::Acquire))
    }

    fn store(&self, state: PumpState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(PumpState::Idle)
    }
}

// ---------------------------------------------------------------------------
// FSM
// ---------------------------------------------------------------------------

/// Single-owner state machine driven by the pump controller.
#[derive(Debug)]
pub struct PumpFsm {
    cell: Arc<StateCell>,
    /// Completed Circulating → … → Cooldown cycles.
    cycles: u64,
}

impl PumpFsm {
    pub fn new() -> Self {
        Self {
            cell: Arc::new(StateCell::default()),
            cycles: 0,
        }
    }

    pub fn current(&self) -> PumpState {
        self.cell.load()
    }

    /// Read-only handle for observers on other threads.
    pub fn handle(&self) -> Arc<StateCell> {
        Arc::clone(&self.cell)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Move to the successor of the current state and return it.
    pub fn advance(&mut self) -> PumpState {
        let from = self.cell.load();
        let to = from.next();
        info!("FSM transition: {} -> {}", from, to);
        if from == PumpState::Cooldown {
            self.cycles += 1;
        }
        self.cell.store(to);
        to
    }
}

impl Default for PumpFsm {
    fn default() -> Self {
        Self::new()
    }
}
