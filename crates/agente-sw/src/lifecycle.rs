//! Worker lifecycle state machine.
//!
//! Install always completes (or is abandoned) before activate begins for a
//! given worker instance; the transitions here enforce that ordering. The
//! cache-population and stale-generation sweeps themselves live on the
//! router, which drives this machine.

use agente_common::{AgenteError, Result};

/// Service worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// Initial state, script loaded but no event handled yet.
    #[default]
    Parsed,
    /// Install in progress (precache population).
    Installing,
    /// Installed, waiting for activation.
    Installed,
    /// Activate in progress (stale-generation sweep).
    Activating,
    /// Active and controlling pages.
    Active,
    /// Replaced, or install failed.
    Redundant,
}

/// Tracks lifecycle transitions for one worker instance.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: WorkerState,
    skip_waiting_requested: bool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Check if the worker is serving requests.
    pub fn is_active(&self) -> bool {
        self.state == WorkerState::Active
    }

    /// Whether an explicit skip-waiting request is pending.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting_requested
    }

    /// Request immediate activation of a waiting worker.
    pub fn request_skip_waiting(&mut self) {
        self.skip_waiting_requested = true;
    }

    /// Enter the install phase.
    pub fn begin_install(&mut self) -> Result<()> {
        match self.state {
            WorkerState::Parsed => {
                self.state = WorkerState::Installing;
                Ok(())
            }
            state => Err(AgenteError::lifecycle(format!(
                "cannot install from {state:?}"
            ))),
        }
    }

    /// Mark install complete; the worker now waits for activation.
    pub fn finish_install(&mut self) {
        self.state = WorkerState::Installed;
    }

    /// Enter the activate phase. Only an installed worker may activate.
    pub fn begin_activate(&mut self) -> Result<()> {
        match self.state {
            WorkerState::Installed => {
                self.state = WorkerState::Activating;
                Ok(())
            }
            state => Err(AgenteError::lifecycle(format!(
                "cannot activate from {state:?}"
            ))),
        }
    }

    /// Mark activation complete; the worker now controls pages.
    pub fn finish_activate(&mut self) {
        self.state = WorkerState::Active;
        self.skip_waiting_requested = false;
    }

    /// Abandon this worker instance.
    pub fn make_redundant(&mut self) {
        self.state = WorkerState::Redundant;
    }
}
