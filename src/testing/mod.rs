//! Test doubles for exercising the builder without a live engine
//!
//! [`MockConnection`] records every request it receives and replays canned
//! responses, keyed by engine method. Push a response per expected call;
//! methods with no queued response fall back to an empty-result default.
//!
//! ```rust,ignore
//! let connection = MockConnection::new();
//! connection.push_response("search", json!({"hits": {"hits": [...]}}));
//!
//! let rows = Builder::table(&connection, "logs").get()?;
//! assert_eq!(connection.calls_for("search").len(), 1);
//! ```

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::{EsQueryError, Result};

/// One request recorded by [`MockConnection`]
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub method: String,
    pub body: Value,
    pub log_enabled: bool,
}

/// In-memory connection recording calls and replaying canned responses
#[derive(Default)]
pub struct MockConnection {
    config: ConnectionConfig,
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<HashMap<String, VecDeque<Value>>>,
    failures: Mutex<HashMap<String, String>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::with_config(ConnectionConfig::default())
    }

    pub fn with_config(config: ConnectionConfig) -> Self {
        Self {
            config,
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Queue a response for the next call of the given method
    pub fn push_response(&self, method: &str, response: Value) {
        self.responses
            .lock()
            .entry(method.to_string())
            .or_default()
            .push_back(response);
    }

    /// Make the next call of the given method fail
    pub fn fail_next(&self, method: &str, message: &str) {
        self.failures
            .lock()
            .insert(method.to_string(), message.to_string());
    }

    /// All recorded calls, in execution order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Recorded calls for one method
    pub fn calls_for(&self, method: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    fn respond(&self, method: &str, body: Value, log_enabled: bool) -> Result<Value> {
        self.calls.lock().push(RecordedCall {
            method: method.to_string(),
            body,
            log_enabled,
        });
        if let Some(message) = self.failures.lock().remove(method) {
            return Err(EsQueryError::Connection(message));
        }
        let queued = self
            .responses
            .lock()
            .get_mut(method)
            .and_then(VecDeque::pop_front);
        Ok(queued.unwrap_or_else(|| default_response(method)))
    }
}

impl Connection for MockConnection {
    fn select(&self, body: Value) -> Result<Value> {
        self.respond("search", body, true)
    }

    fn count(&self, body: Value) -> Result<Value> {
        self.respond("count", body, true)
    }

    fn bulk(&self, body: Value, log_enabled: bool) -> Result<Value> {
        self.respond("bulk", body, log_enabled)
    }

    fn insert(&self, body: Value, log_enabled: bool) -> Result<Value> {
        self.respond("index", body, log_enabled)
    }

    fn update(&self, body: Value, by_query: bool, log_enabled: bool) -> Result<Value> {
        let method = if by_query { "update_by_query" } else { "update" };
        self.respond(method, body, log_enabled)
    }

    fn delete(&self, body: Value, log_enabled: bool) -> Result<Value> {
        self.respond("delete_by_query", body, log_enabled)
    }

    fn clear_scroll(&self, body: Value) -> Result<Value> {
        self.respond("clear_scroll", body, true)
    }

    fn get_config(&self, key: &str) -> Option<Value> {
        self.config.get(key)
    }
}

fn default_response(method: &str) -> Value {
    match method {
        "search" => json!({
            "took": 1,
            "hits": {"total": {"value": 0}, "hits": []}
        }),
        "count" => json!({"count": 0}),
        "update" | "update_by_query" => json!({"total": 0, "updated": 0}),
        _ => json!({}),
    }
}
