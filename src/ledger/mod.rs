//! Call Ledger
//!
//! Response queues and call history keyed by (owner, capability key). Pure
//! data; the coordinator owns the only instance and serializes access to it.

mod entry;

pub use entry::{Next, RecordedCall, Registration, Response, ResponseEntry, ResponseFn};

use std::collections::HashMap;

use serde_json::Value;

use crate::capability::{CapabilityKey, MockName};
use crate::errors::times;
use crate::process::ProcessId;

/// An expectation whose temporary responses were not all consumed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingExpectation {
    pub key: CapabilityKey,
    pub expected: usize,
    pub invoked: usize,
}

impl std::fmt::Display for PendingExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "expected {} to be invoked {} but it was invoked {}",
            self.key,
            times(self.expected),
            times(self.invoked)
        )
    }
}

/// All response queues, grouped by owner
#[derive(Debug, Default)]
pub struct CallLedger {
    owners: HashMap<ProcessId, HashMap<CapabilityKey, ResponseEntry>>,
}

impl CallLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append or replace responses for (owner, key), creating the entry on first use
    pub fn register(&mut self, owner: ProcessId, key: CapabilityKey, registration: Registration) {
        self.owners
            .entry(owner)
            .or_default()
            .entry(key)
            .or_default()
            .register(registration);
    }

    pub fn entry(&self, owner: ProcessId, key: &CapabilityKey) -> Option<&ResponseEntry> {
        self.owners.get(&owner).and_then(|keys| keys.get(key))
    }

    pub fn entry_mut(&mut self, owner: ProcessId, key: &CapabilityKey) -> Option<&mut ResponseEntry> {
        self.owners.get_mut(&owner).and_then(|keys| keys.get_mut(key))
    }

    /// Whether `owner` holds live registrations for any operation of `mock`
    pub fn owns(&self, owner: ProcessId, mock: &MockName) -> bool {
        self.owners
            .get(&owner)
            .map(|keys| keys.keys().any(|k| &k.mock == mock))
            .unwrap_or(false)
    }

    /// Argument lists recorded for (owner, key), oldest first
    pub fn recorded_args(&self, owner: ProcessId, key: &CapabilityKey) -> Vec<Vec<Value>> {
        self.entry(owner, key)
            .map(|e| e.calls().iter().map(|c| c.args.clone()).collect())
            .unwrap_or_default()
    }

    pub fn recorded_calls(&self, owner: ProcessId, key: &CapabilityKey) -> Vec<RecordedCall> {
        self.entry(owner, key)
            .map(|e| e.calls().to_vec())
            .unwrap_or_default()
    }

    /// Drop recorded calls for (owner, key); returns how many were dropped
    pub fn clear_calls(&mut self, owner: ProcessId, key: &CapabilityKey) -> usize {
        match self.entry_mut(owner, key) {
            Some(entry) => {
                let n = entry.calls().len();
                entry.clear_calls();
                n
            }
            None => 0,
        }
    }

    /// Unconsumed expectations of `owner`, optionally limited to one mock
    pub fn pending(&self, owner: ProcessId, mock: Option<&MockName>) -> Vec<PendingExpectation> {
        let mut pending: Vec<PendingExpectation> = self
            .owners
            .get(&owner)
            .into_iter()
            .flat_map(|keys| keys.iter())
            .filter(|(key, _)| mock.map_or(true, |m| &key.mock == m))
            .filter(|(_, entry)| entry.remaining() > 0)
            .map(|(key, entry)| PendingExpectation {
                key: key.clone(),
                expected: entry.expected(),
                invoked: entry.invoked(),
            })
            .collect();
        pending.sort_by(|a, b| a.key.cmp(&b.key));
        pending
    }

    /// Discard every entry of `owner`; returns how many entries were dropped
    pub fn discard_owner(&mut self, owner: ProcessId) -> usize {
        self.owners.remove(&owner).map(|keys| keys.len()).unwrap_or(0)
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }
}
