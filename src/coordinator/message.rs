//! Coordinator mailbox messages
//!
//! Every request carries its own reply sender. Termination notices carry
//! none; they are ordered with the rest of the mailbox, so a cleanup is
//! visible to every request sent after it.

use std::sync::mpsc::Sender;

use serde_json::Value;

use crate::capability::{CapabilityKey, MockName};
use crate::errors::Result;
use crate::ledger::{RecordedCall, Registration, Response};
use crate::ownership::Mode;
use crate::process::ProcessId;

/// Why a resolution produced no response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    /// No owner in the chain holds an entry for the key
    NoOwner,
    /// The owner's entry has nothing left to hand out
    Exhausted { owner: ProcessId, expected: usize },
}

pub(crate) enum Request {
    Register {
        caller: ProcessId,
        key: CapabilityKey,
        registration: Registration,
        reply: Sender<Result<()>>,
    },
    Resolve {
        chain: Vec<ProcessId>,
        key: CapabilityKey,
        args: Vec<Value>,
        reply: Sender<std::result::Result<Response, Unresolved>>,
    },
    RecordedCalls {
        chain: Vec<ProcessId>,
        key: CapabilityKey,
        reply: Sender<Vec<RecordedCall>>,
    },
    ClearCalls {
        chain: Vec<ProcessId>,
        key: CapabilityKey,
        reply: Sender<usize>,
    },
    Allow {
        mock: MockName,
        owner: ProcessId,
        allowed: ProcessId,
        reply: Sender<Result<()>>,
    },
    SetMode {
        process: ProcessId,
        mode: Mode,
        reply: Sender<()>,
    },
    Verify {
        owner: ProcessId,
        mock: Option<MockName>,
        reply: Sender<Result<()>>,
    },
    Down {
        process: ProcessId,
    },
    Shutdown,
    #[cfg(test)]
    Crash {
        reply: Sender<()>,
    },
    #[cfg(test)]
    Stall {
        delay: std::time::Duration,
        reply: Sender<()>,
    },
}

impl Request {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Request::Register { .. } => "register",
            Request::Resolve { .. } => "resolve",
            Request::RecordedCalls { .. } => "recorded_calls",
            Request::ClearCalls { .. } => "clear_calls",
            Request::Allow { .. } => "allow",
            Request::SetMode { .. } => "set_mode",
            Request::Verify { .. } => "verify",
            Request::Down { .. } => "down",
            Request::Shutdown => "shutdown",
            #[cfg(test)]
            Request::Crash { .. } => "crash",
            #[cfg(test)]
            Request::Stall { .. } => "stall",
        }
    }
}
