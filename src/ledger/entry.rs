//! Response Queue Entries
//!
//! One entry per (owner, capability key): a FIFO of temporary responses, an
//! optional permanent response, and the history of calls it served.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Function response signature
pub type ResponseFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// A scheduled response: a function applied to the call arguments, or a
/// fixed value returned unconditionally
#[derive(Clone)]
pub enum Response {
    Function(ResponseFn),
    Value(Value),
}

impl Response {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Response::Function(Arc::new(f))
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Response::Value(value.into())
    }

    /// Produce the call result for `args`
    pub fn apply(&self, args: &[Value]) -> Value {
        match self {
            Response::Function(f) => f(args),
            Response::Value(v) => v.clone(),
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Function(_) => f.write_str("Response::Function(..)"),
            Response::Value(v) => write!(f, "Response::Value({})", v),
        }
    }
}

/// How a response is scheduled
#[derive(Debug, Clone)]
pub enum Registration {
    /// Consumed `times` times in FIFO order
    Temporary { response: Response, times: usize },
    /// Used after every temporary response is gone; replaces any earlier one
    Permanent(Response),
}

impl Registration {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Registration::Permanent(_))
    }
}

/// One served call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedCall {
    pub args: Vec<Value>,
    pub at: DateTime<Utc>,
}

/// Outcome of asking an entry for its next response
#[derive(Debug, Clone)]
pub enum Next {
    Temporary(Response),
    Permanent(Response),
    /// Nothing left; carries the total temporary count ever registered
    Exhausted { expected: usize },
}

/// Scheduled responses and call history for one (owner, capability key)
///
/// Temporaries are kept as runs of `(response, remaining uses)`, so a
/// registration costs the same whatever its count. Counters saturate at
/// `usize::MAX`.
#[derive(Debug, Clone, Default)]
pub struct ResponseEntry {
    /// Total temporary responses ever registered
    expected: usize,
    /// Temporary responses not yet consumed
    remaining: usize,
    temporary: VecDeque<(Response, usize)>,
    permanent: Option<Response>,
    calls: Vec<RecordedCall>,
}

impl ResponseEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a registration to this entry
    pub fn register(&mut self, registration: Registration) {
        match registration {
            Registration::Temporary { response, times } => {
                self.expected = self.expected.saturating_add(times);
                if times > 0 {
                    self.remaining = self.remaining.saturating_add(times);
                    self.temporary.push_back((response, times));
                }
            }
            Registration::Permanent(response) => {
                self.permanent = Some(response);
            }
        }
    }

    /// The response the next call would get, without consuming it
    pub fn peek(&self) -> Next {
        if let Some((response, _)) = self.temporary.front() {
            return Next::Temporary(response.clone());
        }
        match &self.permanent {
            Some(response) => Next::Permanent(response.clone()),
            None => Next::Exhausted {
                expected: self.expected,
            },
        }
    }

    /// Use up the head temporary response, if any. Permanent responses are
    /// never used up.
    pub fn consume(&mut self) {
        if let Some((_, uses)) = self.temporary.front_mut() {
            *uses -= 1;
            if *uses == 0 {
                self.temporary.pop_front();
            }
            self.remaining = self.remaining.saturating_sub(1);
        }
    }

    pub fn record(&mut self, args: Vec<Value>) {
        self.calls.push(RecordedCall {
            args,
            at: Utc::now(),
        });
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Temporary responses not yet consumed
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Temporary responses already consumed
    pub fn invoked(&self) -> usize {
        self.expected.saturating_sub(self.remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add() -> Response {
        Response::function(|args| {
            json!(args[0].as_i64().unwrap_or(0) + args[1].as_i64().unwrap_or(0))
        })
    }

    fn take(entry: &mut ResponseEntry, args: &[Value]) -> Option<Value> {
        let value = match entry.peek() {
            Next::Temporary(r) | Next::Permanent(r) => r.apply(args),
            Next::Exhausted { .. } => return None,
        };
        entry.consume();
        Some(value)
    }

    #[test]
    fn test_temporary_then_exhausted() {
        let mut entry = ResponseEntry::new();
        entry.register(Registration::Temporary {
            response: Response::value(3),
            times: 1,
        });

        assert_eq!(take(&mut entry, &[json!(1), json!(1)]), Some(json!(3)));
        match entry.peek() {
            Next::Exhausted { expected } => assert_eq!(expected, 1),
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn test_temporaries_before_permanent() {
        let mut entry = ResponseEntry::new();
        entry.register(Registration::Temporary { response: add(), times: 2 });
        entry.register(Registration::Permanent(Response::value(0)));

        assert_eq!(take(&mut entry, &[json!(2), json!(3)]), Some(json!(5)));
        assert_eq!(take(&mut entry, &[json!(3), json!(2)]), Some(json!(5)));
        assert_eq!(take(&mut entry, &[json!(9), json!(9)]), Some(json!(0)));
        assert_eq!(take(&mut entry, &[json!(1), json!(1)]), Some(json!(0)));
        assert_eq!(entry.remaining(), 0);
        assert_eq!(entry.invoked(), 2);
    }

    #[test]
    fn test_permanent_replaced_not_merged() {
        let mut entry = ResponseEntry::new();
        entry.register(Registration::Permanent(Response::value("first")));
        entry.register(Registration::Permanent(Response::value("second")));

        assert_eq!(take(&mut entry, &[]), Some(json!("second")));
        assert_eq!(take(&mut entry, &[]), Some(json!("second")));
    }

    #[test]
    fn test_temporary_fifo_across_registrations() {
        let mut entry = ResponseEntry::new();
        entry.register(Registration::Temporary { response: Response::value(1), times: 1 });
        entry.register(Registration::Temporary { response: Response::value(2), times: 2 });

        assert_eq!(entry.expected(), 3);
        assert_eq!(take(&mut entry, &[]), Some(json!(1)));
        assert_eq!(take(&mut entry, &[]), Some(json!(2)));
        assert_eq!(take(&mut entry, &[]), Some(json!(2)));
        assert_eq!(take(&mut entry, &[]), None);
    }

    #[test]
    fn test_clear_calls_keeps_queue() {
        let mut entry = ResponseEntry::new();
        entry.register(Registration::Temporary { response: Response::value(1), times: 2 });
        entry.record(vec![json!("a")]);
        entry.clear_calls();

        assert!(entry.calls().is_empty());
        assert_eq!(entry.remaining(), 2);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut entry = ResponseEntry::new();
        entry.register(Registration::Temporary { response: Response::value(1), times: 1 });

        assert!(matches!(entry.peek(), Next::Temporary(_)));
        assert!(matches!(entry.peek(), Next::Temporary(_)));
        assert_eq!(entry.remaining(), 1);

        entry.consume();
        assert!(matches!(entry.peek(), Next::Exhausted { expected: 1 }));
    }

    #[test]
    fn test_huge_count_is_one_run() {
        let mut entry = ResponseEntry::new();
        entry.register(Registration::Temporary { response: Response::value(1), times: usize::MAX });
        entry.register(Registration::Temporary { response: Response::value(2), times: 5 });

        assert_eq!(entry.expected(), usize::MAX);
        assert_eq!(entry.remaining(), usize::MAX);
        assert_eq!(entry.temporary.len(), 2);

        assert_eq!(take(&mut entry, &[]), Some(json!(1)));
        assert_eq!(take(&mut entry, &[]), Some(json!(1)));
        assert_eq!(entry.invoked(), 2);
    }

    #[test]
    fn test_zero_times_counts_nothing() {
        let mut entry = ResponseEntry::new();
        entry.register(Registration::Temporary { response: Response::value(1), times: 0 });

        assert_eq!(entry.remaining(), 0);
        assert!(matches!(entry.peek(), Next::Exhausted { expected: 0 }));
    }
}
