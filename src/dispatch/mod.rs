//! Dispatch Facade
//!
//! What generated substitute functions call. [`dispatch`] resolves the next
//! response through the coordinator, applies it to the arguments on the
//! caller's thread, and turns an unresolved call into `NoRegistration` or
//! `ExhaustedRegistrations`.
//!
//! [`Mock`] bundles a [`MockDefinition`] with the registration helpers test
//! code uses (`expect`, `stub`, `stub_with`, `allow`, ...), validating every
//! operation against the definition first.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::capability::{CapabilityKey, MockDefinition, MockName};
use crate::coordinator::Unresolved;
use crate::errors::{MockError, Result};
use crate::ledger::{RecordedCall, Registration, Response};
use crate::process::{Process, ProcessId};

/// Call `key` with `args` on behalf of `process`
pub fn dispatch(process: &Process, key: &CapabilityKey, args: Vec<Value>) -> Result<Value> {
    let resolved = process
        .coordinator()
        .resolve(process.chain(), key.clone(), args.clone())?;

    match resolved {
        Ok(response) => Ok(response.apply(&args)),
        Err(Unresolved::NoOwner) => Err(MockError::NoRegistration {
            key: key.clone(),
            caller: process.id(),
            args,
        }),
        Err(Unresolved::Exhausted { expected, .. }) => Err(MockError::ExhaustedRegistrations {
            key: key.clone(),
            caller: process.id(),
            expected,
            // the failing call counts
            actual: expected.saturating_add(1),
        }),
    }
}

/// Permanent responses for several operations at once, keyed by `(op, arity)`
#[derive(Debug, Clone, Default)]
pub struct Implementation {
    operations: BTreeMap<(String, usize), Response>,
}

impl Implementation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation(mut self, op: impl Into<String>, arity: usize, response: Response) -> Self {
        self.operations.insert((op.into(), arity), response);
        self
    }
}

/// A declared mock
#[derive(Debug, Clone)]
pub struct Mock {
    definition: Arc<MockDefinition>,
}

impl Mock {
    pub fn new(definition: MockDefinition) -> Self {
        Self {
            definition: Arc::new(definition),
        }
    }

    pub fn name(&self) -> &MockName {
        self.definition.name()
    }

    pub fn definition(&self) -> &MockDefinition {
        &self.definition
    }

    /// Schedule `response` for the next `times` calls of `op/arity`, after
    /// any temporaries already queued
    pub fn expect(
        &self,
        process: &Process,
        op: &str,
        arity: usize,
        times: usize,
        response: Response,
    ) -> Result<&Self> {
        let key = self.definition.key(op, arity)?;
        process
            .coordinator()
            .register(process.id(), key, Registration::Temporary { response, times })?;
        Ok(self)
    }

    /// Use `response` for `op/arity` once temporaries run out, replacing any
    /// earlier stub
    pub fn stub(&self, process: &Process, op: &str, arity: usize, response: Response) -> Result<&Self> {
        let key = self.definition.key(op, arity)?;
        process
            .coordinator()
            .register(process.id(), key, Registration::Permanent(response))?;
        Ok(self)
    }

    /// Stub every operation `implementation` provides. Operations the mock
    /// does not declare are rejected before anything is registered.
    pub fn stub_with(&self, process: &Process, implementation: Implementation) -> Result<&Self> {
        let keys = implementation
            .operations
            .keys()
            .map(|(op, arity)| self.definition.key(op, *arity))
            .collect::<Result<Vec<_>>>()?;

        for (key, response) in keys.into_iter().zip(implementation.operations.into_values()) {
            process
                .coordinator()
                .register(process.id(), key, Registration::Permanent(response))?;
        }
        Ok(self)
    }

    /// Invoke `op` with `args` as `process`
    pub fn call(&self, process: &Process, op: &str, args: Vec<Value>) -> Result<Value> {
        let key = self.definition.key(op, args.len())?;
        dispatch(process, &key, args)
    }

    /// Argument lists of calls served for `op/arity`, oldest first
    pub fn calls(&self, process: &Process, op: &str, arity: usize) -> Result<Vec<Vec<Value>>> {
        Ok(self
            .call_history(process, op, arity)?
            .into_iter()
            .map(|call| call.args)
            .collect())
    }

    /// Calls served for `op/arity` with their timestamps
    pub fn call_history(&self, process: &Process, op: &str, arity: usize) -> Result<Vec<RecordedCall>> {
        let key = self.definition.key(op, arity)?;
        process.coordinator().recorded_calls(process.chain(), key)
    }

    /// Forget recorded calls for `op/arity`; scheduled responses stay
    pub fn clear_calls(&self, process: &Process, op: &str, arity: usize) -> Result<usize> {
        let key = self.definition.key(op, arity)?;
        process.coordinator().clear_calls(process.chain(), key)
    }

    /// Let `allowed` use `owner`'s registrations for this mock
    pub fn allow(&self, owner: &Process, allowed: ProcessId) -> Result<&Self> {
        owner
            .coordinator()
            .allow(self.name().clone(), owner.id(), allowed)?;
        Ok(self)
    }

    /// Check that `process` consumed every expectation it set on this mock
    pub fn verify(&self, process: &Process) -> Result<()> {
        process
            .coordinator()
            .verify(process.id(), Some(self.name().clone()))
    }
}
