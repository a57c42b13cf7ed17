//! Coordinator state and mailbox loop
//!
//! The state is owned by a single thread and touched only from `handle`, one
//! message at a time, so checking and consuming a response queue can never
//! interleave with another request.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Receiver;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::message::{Request, Unresolved};
use crate::capability::{CapabilityKey, MockName};
use crate::errors::{MockError, Result};
use crate::ledger::{CallLedger, Next, RecordedCall, Registration, Response};
use crate::ownership::{AllowanceGraph, Mode, ModeTable, Resolver};
use crate::process::ProcessId;

/// Everything the coordinator owns
#[derive(Debug)]
pub(crate) struct CoordinatorState {
    ledger: CallLedger,
    allowances: AllowanceGraph,
    modes: ModeTable,
    record_calls: bool,
}

impl CoordinatorState {
    pub(crate) fn new(record_calls: bool) -> Self {
        Self {
            ledger: CallLedger::new(),
            allowances: AllowanceGraph::new(),
            modes: ModeTable::new(),
            record_calls,
        }
    }

    /// Drop all mock state; used after a handler panicked
    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.record_calls);
    }

    fn owner_for(&self, chain: &[ProcessId], mock: &MockName) -> Option<ProcessId> {
        Resolver::new(&self.modes, &self.allowances)
            .resolve(chain, mock, |p| self.ledger.owns(p, mock))
    }

    pub(crate) fn register(
        &mut self,
        caller: ProcessId,
        key: CapabilityKey,
        registration: Registration,
    ) -> Result<()> {
        match self.modes.effective(caller) {
            Mode::Global => {
                if let Some(global_owner) = self.modes.global_owner() {
                    if global_owner != caller {
                        return Err(MockError::GlobalOwnerConflict {
                            mock: key.mock,
                            caller,
                            global_owner,
                        });
                    }
                }
            }
            Mode::Private => {
                if let Some(owner) = self.allowances.root_owner(&key.mock, caller) {
                    return Err(MockError::OwnershipConflict {
                        mock: key.mock,
                        caller,
                        owner,
                    });
                }
            }
        }

        debug!(
            key = %key,
            owner = %caller,
            permanent = registration.is_permanent(),
            "registered response"
        );
        self.ledger.register(caller, key, registration);
        Ok(())
    }

    /// Select the response `chain` would get for `key`, without consuming it
    fn lookup(
        &self,
        chain: &[ProcessId],
        key: &CapabilityKey,
    ) -> std::result::Result<(ProcessId, Response), Unresolved> {
        let owner = self.owner_for(chain, &key.mock).ok_or(Unresolved::NoOwner)?;
        let entry = self.ledger.entry(owner, key).ok_or(Unresolved::NoOwner)?;

        match entry.peek() {
            Next::Temporary(response) | Next::Permanent(response) => Ok((owner, response)),
            Next::Exhausted { expected } => {
                warn!(key = %key, owner = %owner, expected, "registrations exhausted");
                Err(Unresolved::Exhausted { owner, expected })
            }
        }
    }

    /// Consume the response handed out by `lookup` and record the call
    fn commit(&mut self, owner: ProcessId, key: &CapabilityKey, args: Vec<Value>) {
        let record_calls = self.record_calls;
        if let Some(entry) = self.ledger.entry_mut(owner, key) {
            entry.consume();
            if record_calls {
                entry.record(args);
            }
            debug!(key = %key, owner = %owner, remaining = entry.remaining(), "resolved call");
        }
    }

    pub(crate) fn resolve(
        &mut self,
        chain: &[ProcessId],
        key: &CapabilityKey,
        args: Vec<Value>,
    ) -> std::result::Result<Response, Unresolved> {
        let (owner, response) = self.lookup(chain, key)?;
        self.commit(owner, key, args);
        Ok(response)
    }

    pub(crate) fn recorded_calls(&self, chain: &[ProcessId], key: &CapabilityKey) -> Vec<RecordedCall> {
        self.owner_for(chain, &key.mock)
            .map(|owner| self.ledger.recorded_calls(owner, key))
            .unwrap_or_default()
    }

    pub(crate) fn clear_calls(&mut self, chain: &[ProcessId], key: &CapabilityKey) -> usize {
        match self.owner_for(chain, &key.mock) {
            Some(owner) => self.ledger.clear_calls(owner, key),
            None => 0,
        }
    }

    pub(crate) fn allow(&mut self, mock: MockName, owner: ProcessId, allowed: ProcessId) -> Result<()> {
        if owner == allowed {
            return Err(MockError::SelfAllowance { mock, process: owner });
        }
        if self.modes.effective(owner) == Mode::Global {
            debug!(mock = %mock, owner = %owner, allowed = %allowed, "allowance ignored in global mode");
            return Ok(());
        }
        if self.ledger.owns(allowed, &mock) {
            return Err(MockError::AllowedIsOwner { mock, allowed });
        }

        let effective_owner = self.allowances.root_owner(&mock, owner).unwrap_or(owner);
        if let Some(existing) = self.allowances.root_owner(&mock, allowed) {
            if existing != effective_owner {
                return Err(MockError::AlreadyAllowed {
                    mock,
                    owner,
                    allowed,
                    existing,
                });
            }
        }
        if self.allowances.reaches(&mock, owner, allowed) {
            return Err(MockError::AllowanceCycle { mock, owner, allowed });
        }

        info!(mock = %mock, owner = %owner, allowed = %allowed, "allowed process");
        self.allowances.allow(&mock, owner, allowed);
        Ok(())
    }

    pub(crate) fn set_mode(&mut self, process: ProcessId, mode: Mode) {
        info!(process = %process, mode = %mode, "mode set");
        self.modes.set(process, mode);
    }

    pub(crate) fn verify(&self, owner: ProcessId, mock: Option<&MockName>) -> Result<()> {
        let pending = self.ledger.pending(owner, mock);
        if pending.is_empty() {
            return Ok(());
        }
        Err(MockError::UnmetExpectations {
            owner,
            pending: pending.iter().map(|p| p.to_string()).collect(),
        })
    }

    /// Discard everything tied to a terminated process
    pub(crate) fn cleanup(&mut self, process: ProcessId) {
        let entries = self.ledger.discard_owner(process);
        let edges = self.allowances.remove_process(process);
        let was_global = self.modes.forget(process);
        if entries > 0 || edges > 0 || was_global {
            debug!(
                process = %process,
                entries,
                edges,
                was_global,
                owners_left = self.ledger.owner_count(),
                edges_left = self.allowances.len(),
                "cleaned up terminated process"
            );
        }
    }

    fn handle(&mut self, request: Request) {
        // Send errors mean the caller stopped waiting; nothing to do.
        match request {
            Request::Register { caller, key, registration, reply } => {
                let _ = reply.send(rejected(self.register(caller, key, registration)));
            }
            Request::Resolve { chain, key, args, reply } => match self.lookup(&chain, &key) {
                // Only a delivered response counts as a served call.
                Ok((owner, response)) => {
                    if reply.send(Ok(response)).is_ok() {
                        self.commit(owner, &key, args);
                    } else {
                        debug!(key = %key, owner = %owner, "caller gone before reply; call not served");
                    }
                }
                Err(unresolved) => {
                    let _ = reply.send(Err(unresolved));
                }
            },
            Request::RecordedCalls { chain, key, reply } => {
                let _ = reply.send(self.recorded_calls(&chain, &key));
            }
            Request::ClearCalls { chain, key, reply } => {
                let _ = reply.send(self.clear_calls(&chain, &key));
            }
            Request::Allow { mock, owner, allowed, reply } => {
                let _ = reply.send(rejected(self.allow(mock, owner, allowed)));
            }
            Request::SetMode { process, mode, reply } => {
                self.set_mode(process, mode);
                let _ = reply.send(());
            }
            Request::Verify { owner, mock, reply } => {
                let _ = reply.send(self.verify(owner, mock.as_ref()));
            }
            Request::Down { process } => self.cleanup(process),
            Request::Shutdown => {}
            #[cfg(test)]
            Request::Crash { reply } => {
                drop(reply);
                panic!("injected coordinator crash");
            }
            #[cfg(test)]
            Request::Stall { delay, reply } => {
                std::thread::sleep(delay);
                let _ = reply.send(());
            }
        }
    }
}

/// Log misuse the coordinator refused, then pass the result through
fn rejected(result: Result<()>) -> Result<()> {
    if let Err(e) = &result {
        if e.code().is_misuse() {
            warn!(code = %e.code(), error = %e, "rejected misuse");
        }
    }
    result
}

/// Serve the mailbox until shutdown or until every sender is gone
pub(crate) fn run(mailbox: Receiver<Request>, mut state: CoordinatorState) {
    info!("mock coordinator started");
    while let Ok(request) = mailbox.recv() {
        if matches!(request, Request::Shutdown) {
            break;
        }
        let kind = request.kind();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| state.handle(request)));
        if outcome.is_err() {
            error!(
                request = kind,
                owners = state.ledger.owner_count(),
                "coordinator handler panicked; discarding all mock state"
            );
            state.reset();
        }
    }
    info!("mock coordinator stopped");
}
