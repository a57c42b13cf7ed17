//! Shared fixtures for integration tests
//!
//! - `calc()`: a two-operation mock used across suites
//! - `add()`: a function response summing two integer arguments
//! - `start()`: a fresh coordinator with tracing output routed to the test harness

#![allow(dead_code)]

use serde_json::{json, Value};
use standin::{Coordinator, CoordinatorConfig, Mock, MockDefinition, Response};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A coordinator private to one test
pub fn start() -> Coordinator {
    init_tracing();
    Coordinator::with_config(CoordinatorConfig::default()).expect("coordinator should start")
}

pub fn calc() -> Mock {
    Mock::new(
        MockDefinition::new("Calc")
            .operation("add", 2)
            .operation("mult", 2),
    )
}

pub fn int(v: &Value) -> i64 {
    v.as_i64().unwrap_or_default()
}

pub fn add() -> Response {
    Response::function(|args| json!(int(&args[0]) + int(&args[1])))
}

pub fn args(a: i64, b: i64) -> Vec<Value> {
    vec![json!(a), json!(b)]
}
