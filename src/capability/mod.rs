//! Capability Keys and Mock Definitions
//!
//! A capability key names one substitutable operation: `(mock, operation, arity)`.
//! A `MockDefinition` is the registration surface: it lists the keys a mock
//! supports so callers can be rejected with `UNKNOWN_CAPABILITY` before the
//! coordinator is ever contacted.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{MockError, Result};

/// Identity of a mock, used as the namespace for registrations
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MockName(Arc<str>);

impl MockName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MockName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One substitutable operation of a mock
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CapabilityKey {
    /// Mock the operation belongs to
    pub mock: MockName,
    /// Operation name
    pub op: String,
    /// Number of arguments the operation takes
    pub arity: usize,
}

impl CapabilityKey {
    pub fn new(mock: impl Into<MockName>, op: impl Into<String>, arity: usize) -> Self {
        Self {
            mock: mock.into(),
            op: op.into(),
            arity,
        }
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}/{}", self.mock, self.op, self.arity)
    }
}

/// The set of operations a mock supports.
///
/// Built once when the mock is declared and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDefinition {
    name: MockName,
    operations: BTreeSet<(String, usize)>,
}

impl MockDefinition {
    /// Start a definition with no operations
    pub fn new(name: impl Into<MockName>) -> Self {
        Self {
            name: name.into(),
            operations: BTreeSet::new(),
        }
    }

    /// Declare an operation (builder style)
    pub fn operation(mut self, op: impl Into<String>, arity: usize) -> Self {
        self.operations.insert((op.into(), arity));
        self
    }

    pub fn name(&self) -> &MockName {
        &self.name
    }

    /// Check whether the mock supports `op/arity`
    pub fn supports(&self, op: &str, arity: usize) -> bool {
        self.operations
            .iter()
            .any(|(name, n)| name == op && *n == arity)
    }

    /// Build the capability key for `op/arity`, or fail with `UnknownCapability`
    pub fn key(&self, op: &str, arity: usize) -> Result<CapabilityKey> {
        if !self.supports(op, arity) {
            return Err(MockError::UnknownCapability {
                mock: self.name.clone(),
                op: op.to_string(),
                arity,
            });
        }
        Ok(CapabilityKey::new(self.name.clone(), op, arity))
    }

    /// All capability keys of this mock, in `(op, arity)` order
    pub fn keys(&self) -> impl Iterator<Item = CapabilityKey> + '_ {
        self.operations
            .iter()
            .map(|(op, arity)| CapabilityKey::new(self.name.clone(), op.as_str(), *arity))
    }
}
