//! Private/global mode table
//!
//! Modes are recorded per process. A process that never set a mode follows
//! global mode while some process holds the global designation, private mode
//! otherwise. The most recent process to switch to global is the global owner.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::process::ProcessId;

/// Ownership mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Each process owns its own registrations
    #[default]
    Private,
    /// Every process resolves against the global owner
    Global,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Private => write!(f, "private"),
            Mode::Global => write!(f, "global"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ModeTable {
    explicit: HashMap<ProcessId, Mode>,
    global_owner: Option<ProcessId>,
}

impl ModeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `mode` for `process`. Switching to global designates `process`
    /// as the global owner; switching the current owner back to private
    /// clears the designation.
    pub fn set(&mut self, process: ProcessId, mode: Mode) {
        self.explicit.insert(process, mode);
        match mode {
            Mode::Global => self.global_owner = Some(process),
            Mode::Private => {
                if self.global_owner == Some(process) {
                    self.global_owner = None;
                }
            }
        }
    }

    /// Mode that applies to `process`. Global mode without a designated
    /// global owner degrades to private.
    pub fn effective(&self, process: ProcessId) -> Mode {
        match self.explicit.get(&process) {
            Some(Mode::Global) if self.global_owner.is_none() => Mode::Private,
            Some(mode) => *mode,
            None if self.global_owner.is_some() => Mode::Global,
            None => Mode::Private,
        }
    }

    pub fn global_owner(&self) -> Option<ProcessId> {
        self.global_owner
    }

    /// Forget a terminated process; returns true if it was the global owner
    pub fn forget(&mut self, process: ProcessId) -> bool {
        self.explicit.remove(&process);
        if self.global_owner == Some(process) {
            self.global_owner = None;
            return true;
        }
        false
    }
}
