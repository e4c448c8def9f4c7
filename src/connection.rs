//! Transport seam between the query builder and the search engine
//!
//! The builder compiles requests and hands them to a [`Connection`]; how
//! the request reaches the engine (HTTP client, pooling, retries,
//! reconnects) is entirely the implementor's concern. Responses come back
//! as raw JSON and are post-processed by the builder.

use serde_json::Value;

use crate::error::Result;

/// Engine operations the query builder depends on.
///
/// All methods are synchronous and take the fully compiled request body.
/// The `log_enabled` flag mirrors the builder's per-query logging switch so
/// implementations can honour it in their own query logs.
pub trait Connection {
    /// Run a search (or scroll continuation) request
    fn select(&self, body: Value) -> Result<Value>;

    /// Run a count request; the response carries a top-level `count`
    fn count(&self, body: Value) -> Result<Value>;

    /// Run a bulk request of action/document line pairs
    fn bulk(&self, body: Value, log_enabled: bool) -> Result<Value>;

    /// Index a single document
    fn insert(&self, body: Value, log_enabled: bool) -> Result<Value>;

    /// Update documents; `by_query` selects the update-by-query endpoint
    fn update(&self, body: Value, by_query: bool, log_enabled: bool) -> Result<Value>;

    /// Delete documents matching the compiled query
    fn delete(&self, body: Value, log_enabled: bool) -> Result<Value>;

    /// Release a server-held scroll cursor
    fn clear_scroll(&self, body: Value) -> Result<Value>;

    /// Read a cross-cutting setting (`prefix`, `highlight`, `update_retry`)
    fn get_config(&self, key: &str) -> Option<Value>;
}
