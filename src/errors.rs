//! Error Code Registry
//!
//! Every failure the coordinator or the dispatch facade can raise, with a
//! stable code per kind. All errors are raised synchronously at the call site
//! that triggered them; nothing is retried.

use std::time::Duration;

use serde_json::Value;

use crate::capability::{CapabilityKey, MockName};
use crate::process::ProcessId;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, MockError>;

/// Stable error codes for mock failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// No owner with a registration for the capability key
    NoRegistration,
    /// All temporary and permanent responses consumed
    ExhaustedRegistrations,
    /// Caller is an allowed process and may not register
    OwnershipConflict,
    /// Global mode is active and the caller is not the global owner
    GlobalOwnerConflict,
    /// Allowed process already resolves to a different owner
    AlreadyAllowed,
    /// Owner and allowed process are the same
    SelfAllowance,
    /// Allowed process holds its own registrations
    AllowedIsOwner,
    /// Allowance would close a loop
    AllowanceCycle,
    /// Operation not declared by the mock
    UnknownCapability,
    /// Expectations left unconsumed at verification
    UnmetExpectations,
    /// Coordinator is gone or crashed while handling the request
    CoordinatorUnavailable,
    /// Coordinator did not reply in time
    CoordinatorTimeout,
}

impl ErrorCode {
    /// Returns the string representation of the error code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoRegistration => "NO_REGISTRATION",
            ErrorCode::ExhaustedRegistrations => "EXHAUSTED_REGISTRATIONS",
            ErrorCode::OwnershipConflict => "OWNERSHIP_CONFLICT",
            ErrorCode::GlobalOwnerConflict => "GLOBAL_OWNER_CONFLICT",
            ErrorCode::AlreadyAllowed => "ALREADY_ALLOWED",
            ErrorCode::SelfAllowance => "SELF_ALLOWANCE",
            ErrorCode::AllowedIsOwner => "ALLOWED_IS_OWNER",
            ErrorCode::AllowanceCycle => "ALLOWANCE_CYCLE",
            ErrorCode::UnknownCapability => "UNKNOWN_CAPABILITY",
            ErrorCode::UnmetExpectations => "UNMET_EXPECTATIONS",
            ErrorCode::CoordinatorUnavailable => "COORDINATOR_UNAVAILABLE",
            ErrorCode::CoordinatorTimeout => "COORDINATOR_TIMEOUT",
        }
    }

    /// Configuration-time misuse, as opposed to a failed call
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            ErrorCode::OwnershipConflict
                | ErrorCode::GlobalOwnerConflict
                | ErrorCode::AlreadyAllowed
                | ErrorCode::SelfAllowance
                | ErrorCode::AllowedIsOwner
                | ErrorCode::AllowanceCycle
                | ErrorCode::UnknownCapability
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mock failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum MockError {
    #[error("no expectation defined for {key} in process {caller} with args {}", render_args(.args))]
    NoRegistration {
        key: CapabilityKey,
        caller: ProcessId,
        args: Vec<Value>,
    },

    #[error("expected {key} to be called {} but it has been called {} in process {caller}", times_of(.expected), times_of(.actual))]
    ExhaustedRegistrations {
        key: CapabilityKey,
        caller: ProcessId,
        expected: usize,
        actual: usize,
    },

    #[error("cannot add expectations/stubs to {mock} in process {caller} because the process has been allowed by {owner}")]
    OwnershipConflict {
        mock: MockName,
        caller: ProcessId,
        owner: ProcessId,
    },

    #[error("only the global owner {global_owner} can add expectations/stubs to {mock} in global mode, not {caller}")]
    GlobalOwnerConflict {
        mock: MockName,
        caller: ProcessId,
        global_owner: ProcessId,
    },

    #[error("cannot allow {allowed} to use {mock} from {owner} because it is already allowed by {existing}")]
    AlreadyAllowed {
        mock: MockName,
        owner: ProcessId,
        allowed: ProcessId,
        existing: ProcessId,
    },

    #[error("owner and allowed process must be different for {mock}, got {process} for both")]
    SelfAllowance { mock: MockName, process: ProcessId },

    #[error("cannot allow {allowed} to use {mock} because it already holds its own expectations/stubs")]
    AllowedIsOwner { mock: MockName, allowed: ProcessId },

    #[error("cannot allow {allowed} to use {mock} from {owner} because {owner} already resolves through {allowed}")]
    AllowanceCycle {
        mock: MockName,
        owner: ProcessId,
        allowed: ProcessId,
    },

    #[error("unknown function {mock}.{op}/{arity}")]
    UnknownCapability {
        mock: MockName,
        op: String,
        arity: usize,
    },

    #[error("error while verifying mocks for {owner}:\n\n  * {}", .pending.join("\n  * "))]
    UnmetExpectations {
        owner: ProcessId,
        pending: Vec<String>,
    },

    #[error("mock coordinator unavailable: {0}")]
    CoordinatorUnavailable(String),

    #[error("mock coordinator did not reply within {0:?}")]
    CoordinatorTimeout(Duration),
}

impl MockError {
    /// Returns the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            MockError::NoRegistration { .. } => ErrorCode::NoRegistration,
            MockError::ExhaustedRegistrations { .. } => ErrorCode::ExhaustedRegistrations,
            MockError::OwnershipConflict { .. } => ErrorCode::OwnershipConflict,
            MockError::GlobalOwnerConflict { .. } => ErrorCode::GlobalOwnerConflict,
            MockError::AlreadyAllowed { .. } => ErrorCode::AlreadyAllowed,
            MockError::SelfAllowance { .. } => ErrorCode::SelfAllowance,
            MockError::AllowedIsOwner { .. } => ErrorCode::AllowedIsOwner,
            MockError::AllowanceCycle { .. } => ErrorCode::AllowanceCycle,
            MockError::UnknownCapability { .. } => ErrorCode::UnknownCapability,
            MockError::UnmetExpectations { .. } => ErrorCode::UnmetExpectations,
            MockError::CoordinatorUnavailable(_) => ErrorCode::CoordinatorUnavailable,
            MockError::CoordinatorTimeout(_) => ErrorCode::CoordinatorTimeout,
        }
    }
}

/// "once" / "N times" wording for call counts
pub fn times(n: usize) -> String {
    match n {
        1 => "once".to_string(),
        n => format!("{} times", n),
    }
}

fn times_of(n: &usize) -> String {
    times(*n)
}

fn render_args(args: &[Value]) -> String {
    serde_json::to_string(args).unwrap_or_else(|_| format!("{:?}", args))
}
