//! Standin - coordination server for test doubles
//!
//! Tracks which substitute behaviors are armed per test process, dispatches
//! calls to the right one, enforces usage counts, records call history, and
//! lets processes share mocks through explicit allowances, caller chains, or
//! a single global owner.
//!
//! ```ignore
//! let coordinator = Coordinator::start()?;
//! let test = Process::new(&coordinator);
//! let calc = Mock::new(MockDefinition::new("Calc").operation("add", 2));
//!
//! calc.expect(&test, "add", 2, 1, Response::value(3))?;
//! assert_eq!(calc.call(&test, "add", vec![json!(1), json!(2)])?, json!(3));
//! test.finish()?;
//! ```

pub mod capability;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod errors;
pub mod ledger;
pub mod ownership;
pub mod process;

pub use capability::{CapabilityKey, MockDefinition, MockName};
pub use config::{ConfigError, CoordinatorConfig};
pub use coordinator::{Coordinator, Unresolved};
pub use dispatch::{dispatch, Implementation, Mock};
pub use errors::{ErrorCode, MockError, Result};
pub use ledger::{RecordedCall, Registration, Response};
pub use ownership::Mode;
pub use process::{Process, ProcessId};
