//! Coordination Server
//!
//! The single serialization point for mock state. A dedicated thread owns the
//! call ledger, the allowance graph and the mode table; everything else talks
//! to it through [`Coordinator`], one request/reply round trip per operation.
//!
//! # Operations
//!
//! - `register`: schedule temporary or permanent responses
//! - `resolve`: pick the owner, hand out the next response, record the call
//! - `recorded_calls` / `clear_calls`: call history of the resolved owner
//! - `allow`: let another process resolve against an owner
//! - `set_mode`: switch a process between private and global mode
//! - `verify`: check that every expectation was consumed
//! - `notify_down`: clean up after a terminated process

mod handle;
mod message;
mod server;

pub use handle::Coordinator;
pub use message::Unresolved;
