//! Coordinator handle
//!
//! Cheap to clone; every clone talks to the same server thread. Each call is
//! one round trip bounded by the configured reply timeout, so a dead or
//! wedged coordinator fails the caller instead of hanging it.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::message::{Request, Unresolved};
use super::server::{self, CoordinatorState};
use crate::capability::{CapabilityKey, MockName};
use crate::config::CoordinatorConfig;
use crate::errors::{MockError, Result};
use crate::ledger::{RecordedCall, Registration, Response};
use crate::ownership::Mode;
use crate::process::ProcessId;

static GLOBAL: OnceLock<Coordinator> = OnceLock::new();

/// Handle to a running coordination server
#[derive(Clone)]
pub struct Coordinator {
    mailbox: Sender<Request>,
    reply_timeout: Duration,
    thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("reply_timeout", &self.reply_timeout)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Start a coordinator with default configuration
    pub fn start() -> Result<Self> {
        Self::with_config(CoordinatorConfig::default())
    }

    /// Start a coordinator on its own thread
    pub fn with_config(config: CoordinatorConfig) -> Result<Self> {
        let (mailbox, inbox) = mpsc::channel();
        let state = CoordinatorState::new(config.record_calls);
        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || server::run(inbox, state))
            .map_err(|e| MockError::CoordinatorUnavailable(format!("failed to spawn coordinator: {}", e)))?;

        Ok(Self {
            mailbox,
            reply_timeout: config.reply_timeout(),
            thread: Arc::new(Mutex::new(Some(thread))),
        })
    }

    /// The process-wide coordinator, started on first use from `STANDIN_CONFIG`
    /// or defaults
    pub fn global() -> Result<Self> {
        if let Some(existing) = GLOBAL.get() {
            return Ok(existing.clone());
        }
        let config = CoordinatorConfig::from_env()
            .map_err(|e| MockError::CoordinatorUnavailable(format!("invalid configuration: {}", e)))?;
        let started = Self::with_config(config)?;
        if let Err(lost_race) = GLOBAL.set(started) {
            lost_race.shutdown();
        }
        GLOBAL
            .get()
            .cloned()
            .ok_or_else(|| MockError::CoordinatorUnavailable("global coordinator missing".to_string()))
    }

    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    /// Send a request and wait for its reply.
    ///
    /// On timeout the request stays queued and still runs later. A resolve
    /// whose caller has gone by then is neither consumed nor recorded; other
    /// requests (registrations, allowances, mode changes) still take effect.
    fn call<T>(&self, build: impl FnOnce(Sender<T>) -> Request) -> Result<T> {
        let (reply, response) = mpsc::channel();
        let request = build(reply);
        let kind = request.kind();
        self.mailbox
            .send(request)
            .map_err(|_| MockError::CoordinatorUnavailable("coordinator has stopped".to_string()))?;

        match response.recv_timeout(self.reply_timeout) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => {
                warn!(request = kind, timeout = ?self.reply_timeout, "coordinator reply timed out");
                Err(MockError::CoordinatorTimeout(self.reply_timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(MockError::CoordinatorUnavailable(format!(
                "coordinator dropped the {} request",
                kind
            ))),
        }
    }

    /// Schedule a response for (caller, key)
    pub fn register(&self, caller: ProcessId, key: CapabilityKey, registration: Registration) -> Result<()> {
        self.call(|reply| Request::Register { caller, key, registration, reply })?
    }

    /// Resolve the next response for `key` on behalf of `chain`, recording the call
    pub fn resolve(
        &self,
        chain: Vec<ProcessId>,
        key: CapabilityKey,
        args: Vec<Value>,
    ) -> Result<std::result::Result<Response, Unresolved>> {
        self.call(|reply| Request::Resolve { chain, key, args, reply })
    }

    /// Calls recorded for the owner `chain` resolves to, oldest first
    pub fn recorded_calls(&self, chain: Vec<ProcessId>, key: CapabilityKey) -> Result<Vec<RecordedCall>> {
        self.call(|reply| Request::RecordedCalls { chain, key, reply })
    }

    /// Forget recorded calls; scheduled responses are untouched
    pub fn clear_calls(&self, chain: Vec<ProcessId>, key: CapabilityKey) -> Result<usize> {
        self.call(|reply| Request::ClearCalls { chain, key, reply })
    }

    /// Let `allowed` resolve `mock` against `owner`'s ledger
    pub fn allow(&self, mock: MockName, owner: ProcessId, allowed: ProcessId) -> Result<()> {
        self.call(|reply| Request::Allow { mock, owner, allowed, reply })?
    }

    pub fn set_mode(&self, process: ProcessId, mode: Mode) -> Result<()> {
        self.call(|reply| Request::SetMode { process, mode, reply })
    }

    /// Fail if `owner` has unconsumed expectations (optionally for one mock)
    pub fn verify(&self, owner: ProcessId, mock: Option<MockName>) -> Result<()> {
        self.call(|reply| Request::Verify { owner, mock, reply })?
    }

    /// Report that `process` terminated. Fire-and-forget, but ordered before
    /// any request sent afterwards.
    pub fn notify_down(&self, process: ProcessId) {
        if self.mailbox.send(Request::Down { process }).is_err() {
            debug!(process = %process, "termination notice after coordinator stopped");
        }
    }

    /// Stop the server thread and wait for it. Later requests fail with
    /// `CoordinatorUnavailable`.
    pub fn shutdown(&self) {
        let _ = self.mailbox.send(Request::Shutdown);
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn crash(&self) -> Result<()> {
        self.call(|reply| Request::Crash { reply })
    }

    /// Keep the server busy for `delay` before it replies
    #[cfg(test)]
    pub(crate) fn stall(&self, delay: Duration) -> Result<()> {
        self.call(|reply| Request::Stall { delay, reply })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Instant;

    fn key() -> CapabilityKey {
        CapabilityKey::new("Calc", "add", 2)
    }

    #[test]
    fn test_round_trip() {
        let coordinator = Coordinator::start().unwrap();
        let owner = ProcessId::new();
        coordinator
            .register(owner, key(), Registration::Permanent(Response::value(7)))
            .unwrap();

        let response = coordinator.resolve(vec![owner], key(), vec![]).unwrap().unwrap();
        assert_eq!(response.apply(&[]), json!(7));
        coordinator.shutdown();
    }

    #[test]
    fn test_shutdown_fails_fast() {
        let coordinator = Coordinator::start().unwrap();
        coordinator.shutdown();

        let err = coordinator.set_mode(ProcessId::new(), Mode::Global).unwrap_err();
        assert!(matches!(err, MockError::CoordinatorUnavailable(_)));
        // idempotent
        coordinator.shutdown();
    }

    #[test]
    fn test_crash_resets_state_and_keeps_serving() {
        let coordinator = Coordinator::start().unwrap();
        let owner = ProcessId::new();
        coordinator
            .register(owner, key(), Registration::Permanent(Response::value(1)))
            .unwrap();

        let err = coordinator.crash().unwrap_err();
        assert!(matches!(err, MockError::CoordinatorUnavailable(_)));

        // state is gone, but the coordinator still answers
        let resolved = coordinator.resolve(vec![owner], key(), vec![]).unwrap();
        assert!(matches!(resolved, Err(Unresolved::NoOwner)));
        coordinator.shutdown();
    }

    #[test]
    fn test_busy_coordinator_times_out() {
        let config = CoordinatorConfig::default().with_reply_timeout(Duration::from_millis(50));
        let coordinator = Coordinator::with_config(config).unwrap();

        let started = Instant::now();
        let err = coordinator.stall(Duration::from_millis(1_000)).unwrap_err();
        assert!(matches!(err, MockError::CoordinatorTimeout(t) if t == Duration::from_millis(50)));
        assert!(started.elapsed() < Duration::from_millis(900));

        // once the stall is over the same coordinator answers again
        thread::sleep(Duration::from_millis(1_100));
        let resolved = coordinator.resolve(vec![ProcessId::new()], key(), vec![]).unwrap();
        assert!(matches!(resolved, Err(Unresolved::NoOwner)));
        coordinator.shutdown();
    }

    #[test]
    fn test_timed_out_resolve_is_not_served() {
        let config = CoordinatorConfig::default().with_reply_timeout(Duration::from_millis(50));
        let coordinator = Coordinator::with_config(config).unwrap();
        let owner = ProcessId::new();
        coordinator
            .register(
                owner,
                key(),
                Registration::Temporary { response: Response::value(1), times: 1 },
            )
            .unwrap();

        // queue a resolve behind a stall; its caller gives up first
        let staller = coordinator.clone();
        let stalled = thread::spawn(move || staller.stall(Duration::from_millis(300)));
        thread::sleep(Duration::from_millis(20));
        let err = coordinator.resolve(vec![owner], key(), vec![json!(1)]).unwrap_err();
        assert!(matches!(err, MockError::CoordinatorTimeout(_)));
        let _ = stalled.join();
        thread::sleep(Duration::from_millis(400));

        assert!(coordinator.recorded_calls(vec![owner], key()).unwrap().is_empty());
        let response = coordinator.resolve(vec![owner], key(), vec![]).unwrap().unwrap();
        assert_eq!(response.apply(&[]), json!(1));
        coordinator.shutdown();
    }

    #[test]
    fn test_down_is_ordered_before_later_requests() {
        let coordinator = Coordinator::start().unwrap();
        let owner = ProcessId::new();
        coordinator
            .register(owner, key(), Registration::Permanent(Response::value(1)))
            .unwrap();

        coordinator.notify_down(owner);
        let resolved = coordinator.resolve(vec![owner], key(), vec![]).unwrap();
        assert!(matches!(resolved, Err(Unresolved::NoOwner)));
        coordinator.shutdown();
    }

    #[test]
    fn test_global_is_shared() {
        let a = Coordinator::global().unwrap();
        let b = Coordinator::global().unwrap();
        let owner = ProcessId::new();
        a.register(owner, key(), Registration::Permanent(Response::value(2)))
            .unwrap();

        let resolved = b.resolve(vec![owner], key(), vec![]).unwrap().unwrap();
        assert_eq!(resolved.apply(&[]), json!(2));
        a.notify_down(owner);
    }
}
