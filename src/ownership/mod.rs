//! Ownership Resolver
//!
//! Maps a caller's identity chain to the owner whose ledger answers the call.
//!
//! - Global mode: always the designated global owner.
//! - Private mode: the first process in the chain that either holds its own
//!   registrations for the mock or is allowed (possibly transitively) by a
//!   process that does.

mod allowance;
mod mode;

pub use allowance::AllowanceGraph;
pub use mode::{Mode, ModeTable};

use crate::capability::MockName;
use crate::process::ProcessId;

/// Read-only view of the state a resolution needs
pub struct Resolver<'a> {
    pub modes: &'a ModeTable,
    pub allowances: &'a AllowanceGraph,
}

impl<'a> Resolver<'a> {
    pub fn new(modes: &'a ModeTable, allowances: &'a AllowanceGraph) -> Self {
        Self { modes, allowances }
    }

    /// Resolve the effective owner for `chain` (caller first, then its logical
    /// callers, most recent first). `owns` reports whether a process holds
    /// live registrations for `mock`.
    pub fn resolve<F>(&self, chain: &[ProcessId], mock: &MockName, owns: F) -> Option<ProcessId>
    where
        F: Fn(ProcessId) -> bool,
    {
        let caller = *chain.first()?;
        match self.modes.effective(caller) {
            Mode::Global => self.modes.global_owner(),
            Mode::Private => chain.iter().find_map(|&process| {
                if owns(process) {
                    Some(process)
                } else {
                    self.allowances.root_owner(mock, process)
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn calc() -> MockName {
        MockName::new("Calc")
    }

    #[test]
    fn test_private_self_owner() {
        let modes = ModeTable::new();
        let allowances = AllowanceGraph::new();
        let me = ProcessId::new();
        let owners = HashSet::from([me]);

        let resolver = Resolver::new(&modes, &allowances);
        assert_eq!(resolver.resolve(&[me], &calc(), |p| owners.contains(&p)), Some(me));
    }

    #[test]
    fn test_private_unrelated_owner_invisible() {
        let modes = ModeTable::new();
        let allowances = AllowanceGraph::new();
        let (me, other) = (ProcessId::new(), ProcessId::new());
        let owners = HashSet::from([other]);

        let resolver = Resolver::new(&modes, &allowances);
        assert_eq!(resolver.resolve(&[me], &calc(), |p| owners.contains(&p)), None);
    }

    #[test]
    fn test_private_chain_inherits_parent() {
        let modes = ModeTable::new();
        let allowances = AllowanceGraph::new();
        let (parent, child, grandchild) = (ProcessId::new(), ProcessId::new(), ProcessId::new());
        let owners = HashSet::from([parent]);

        let resolver = Resolver::new(&modes, &allowances);
        let chain = [grandchild, child, parent];
        assert_eq!(resolver.resolve(&chain, &calc(), |p| owners.contains(&p)), Some(parent));
    }

    #[test]
    fn test_private_allowance_is_transitive() {
        let modes = ModeTable::new();
        let mut allowances = AllowanceGraph::new();
        let (a, b, c) = (ProcessId::new(), ProcessId::new(), ProcessId::new());
        allowances.allow(&calc(), a, b);
        allowances.allow(&calc(), b, c);
        let owners = HashSet::from([a]);

        let resolver = Resolver::new(&modes, &allowances);
        assert_eq!(resolver.resolve(&[c], &calc(), |p| owners.contains(&p)), Some(a));
    }

    #[test]
    fn test_global_ignores_chain() {
        let mut modes = ModeTable::new();
        let allowances = AllowanceGraph::new();
        let (owner, anyone) = (ProcessId::new(), ProcessId::new());
        modes.set(owner, Mode::Global);

        let resolver = Resolver::new(&modes, &allowances);
        assert_eq!(resolver.resolve(&[anyone], &calc(), |_| false), Some(owner));
    }

    #[test]
    fn test_empty_chain() {
        let modes = ModeTable::new();
        let allowances = AllowanceGraph::new();
        let resolver = Resolver::new(&modes, &allowances);
        assert_eq!(resolver.resolve(&[], &calc(), |_| true), None);
    }
}
