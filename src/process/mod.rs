//! Process identities and handles
//!
//! A `Process` is the identity a test, helper or worker thread uses when it
//! talks to the coordinator. It carries its caller chain explicitly: a child
//! spawned through [`Process::spawn`] starts with `[child, parent, ...]`, so it
//! resolves against its parent's registrations without an allowance.
//!
//! Dropping a `Process` reports its termination to the coordinator, which
//! discards its registrations and allowances.

use std::fmt;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tracing::error;
use ulid::Ulid;

use crate::coordinator::Coordinator;
use crate::errors::Result;
use crate::ownership::Mode;

/// Unique identity of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(Ulid);

impl ProcessId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid-{}", self.0.to_string().to_lowercase())
    }
}

/// A live process registered with a coordinator
#[derive(Debug)]
pub struct Process {
    id: ProcessId,
    /// Logical callers, most recent first (excludes `id`)
    callers: Vec<ProcessId>,
    coordinator: Coordinator,
    verify_on_exit: bool,
}

impl Process {
    /// A top-level process with no logical callers
    pub fn new(coordinator: &Coordinator) -> Self {
        Self::with_callers(coordinator, Vec::new())
    }

    fn with_callers(coordinator: &Coordinator, callers: Vec<ProcessId>) -> Self {
        Self {
            id: ProcessId::new(),
            callers,
            coordinator: coordinator.clone(),
            verify_on_exit: false,
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn callers(&self) -> &[ProcessId] {
        &self.callers
    }

    /// Identity chain used for resolution: this process, then its callers
    pub fn chain(&self) -> Vec<ProcessId> {
        std::iter::once(self.id)
            .chain(self.callers.iter().copied())
            .collect()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// A new process whose caller chain starts with this one
    pub fn child(&self) -> Process {
        Self::with_callers(&self.coordinator, self.chain())
    }

    /// A new process with no link to this one; it needs an explicit allowance
    pub fn detached(&self) -> Process {
        Self::new(&self.coordinator)
    }

    /// Run `f` on a new thread as a child of this process
    pub fn spawn<F, T>(&self, f: F) -> JoinHandle<T>
    where
        F: FnOnce(Process) -> T + Send + 'static,
        T: Send + 'static,
    {
        let child = self.child();
        thread::spawn(move || f(child))
    }

    /// Run `f` on a new thread as an unrelated process
    pub fn spawn_detached<F, T>(&self, f: F) -> JoinHandle<T>
    where
        F: FnOnce(Process) -> T + Send + 'static,
        T: Send + 'static,
    {
        let detached = self.detached();
        thread::spawn(move || f(detached))
    }

    /// Make every process without an explicit mode resolve against this one
    pub fn set_global(&self) -> Result<()> {
        self.coordinator.set_mode(self.id, Mode::Global)
    }

    pub fn set_private(&self) -> Result<()> {
        self.coordinator.set_mode(self.id, Mode::Private)
    }

    /// Check that all expectations registered by this process were consumed
    pub fn verify(&self) -> Result<()> {
        self.coordinator.verify(self.id, None)
    }

    /// Verify expectations when this process is dropped; failures are logged
    pub fn verify_on_exit(&mut self) {
        self.verify_on_exit = true;
    }

    /// Verify, then terminate, returning the verification result
    pub fn finish(mut self) -> Result<()> {
        self.verify_on_exit = false;
        self.verify()
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if self.verify_on_exit {
            if let Err(e) = self.verify() {
                error!(process = %self.id, error = %e, "unmet expectations at exit");
            }
        }
        self.coordinator.notify_down(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_ids_unique() {
        let a = ProcessId::new();
        let b = ProcessId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("pid-"));
    }

    #[test]
    fn test_child_chain() {
        let coordinator = Coordinator::start().unwrap();
        let parent = Process::new(&coordinator);
        let child = parent.child();
        let grandchild = child.child();

        assert_eq!(grandchild.chain(), vec![grandchild.id(), child.id(), parent.id()]);
        assert!(parent.detached().callers().is_empty());
        drop((grandchild, child, parent));
        coordinator.shutdown();
    }

    #[test]
    fn test_spawn_passes_child() {
        let coordinator = Coordinator::start().unwrap();
        let parent = Process::new(&coordinator);
        let parent_id = parent.id();

        let callers = parent.spawn(|child| child.callers().to_vec()).join().unwrap();
        assert_eq!(callers, vec![parent_id]);

        let callers = parent
            .spawn_detached(|p| p.callers().to_vec())
            .join()
            .unwrap();
        assert!(callers.is_empty());
        drop(parent);
        coordinator.shutdown();
    }
}
