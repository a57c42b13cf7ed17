//! Built-in coordinator defaults (base layer)

use serde_json::{json, Value};

/// Default time a caller waits for a coordinator reply
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 5_000;

/// Default name of the coordinator thread
pub const DEFAULT_THREAD_NAME: &str = "standin-coordinator";

/// Upper bound accepted for `reply_timeout_ms` (10 minutes)
pub const MAX_REPLY_TIMEOUT_MS: u64 = 600_000;

/// Base layer every other layer is merged onto
pub fn builtin_layer() -> Value {
    json!({
        "reply_timeout_ms": DEFAULT_REPLY_TIMEOUT_MS,
        "thread_name": DEFAULT_THREAD_NAME,
        "record_calls": true,
    })
}
