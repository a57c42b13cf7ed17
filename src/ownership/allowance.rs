//! Allowance graph
//!
//! Directed edges `owner -> allowed`, scoped per mock. Each allowed process
//! has at most one allower for a given mock, so the graph is a forest and an
//! allowed process resolves by walking up to the root.

use std::collections::{HashMap, HashSet};

use crate::capability::MockName;
use crate::process::ProcessId;

#[derive(Debug, Default)]
pub struct AllowanceGraph {
    /// (mock, allowed) -> allower
    edges: HashMap<(MockName, ProcessId), ProcessId>,
}

impl AllowanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite the edge `owner -> allowed` for `mock`
    pub fn allow(&mut self, mock: &MockName, owner: ProcessId, allowed: ProcessId) {
        self.edges.insert((mock.clone(), allowed), owner);
    }

    /// Direct allower of `process` for `mock`
    pub fn allower_of(&self, mock: &MockName, process: ProcessId) -> Option<ProcessId> {
        self.edges.get(&(mock.clone(), process)).copied()
    }

    /// Follow edges from `process` to the process at the top of its chain.
    ///
    /// Returns `None` if `process` is not allowed by anyone for `mock`.
    pub fn root_owner(&self, mock: &MockName, process: ProcessId) -> Option<ProcessId> {
        let mut current = self.allower_of(mock, process)?;
        let mut seen = HashSet::from([process]);
        while let Some(next) = self.allower_of(mock, current) {
            if !seen.insert(current) {
                break;
            }
            current = next;
        }
        Some(current)
    }

    /// Whether walking up from `from` passes through `target`
    pub fn reaches(&self, mock: &MockName, from: ProcessId, target: ProcessId) -> bool {
        let mut current = from;
        let mut seen = HashSet::new();
        while let Some(next) = self.allower_of(mock, current) {
            if next == target {
                return true;
            }
            if !seen.insert(next) {
                return false;
            }
            current = next;
        }
        false
    }

    /// Drop every edge with `process` at either end; returns how many were removed
    pub fn remove_process(&mut self, process: ProcessId) -> usize {
        let before = self.edges.len();
        self.edges
            .retain(|(_, allowed), owner| *allowed != process && *owner != process);
        before - self.edges.len()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
