//! Result models and raw-response accessors
//!
//! Responses stay raw JSON; these helpers extract the pieces the builder
//! post-processes — the hit list, the total, the scroll id, and the
//! aggregation results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One page of a scroll loop
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScrollPage {
    pub total: u64,
    pub rows: Vec<Value>,
    pub scroll_id: Option<String>,
}

/// One page of a paginated query
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total: u64,
    pub per_page: i64,
    pub current_page: i64,
}

impl Page {
    /// Whether a later page exists
    pub fn has_more(&self) -> bool {
        (self.current_page.max(0) as u64) * (self.per_page.max(0) as u64) < self.total
    }
}

/// Update outcome summary
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub total: u64,
    pub updated: u64,
}

/// The raw hit rows of a search response
pub fn hits(response: &Value) -> Vec<Value> {
    response
        .get("hits")
        .and_then(|hits| hits.get("hits"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// The total hit count of a search response
pub fn total_hits(response: &Value) -> u64 {
    response
        .get("hits")
        .and_then(|hits| hits.get("total"))
        .and_then(|total| total.get("value"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// The scroll id of a search response, when scrolling
pub fn scroll_id(response: &Value) -> Option<&str> {
    response.get("_scroll_id").and_then(Value::as_str)
}

/// Unwrap the aggregation results of a search response.
///
/// Named entries carrying a `doc_count` (filtered aggregations) unwrap
/// recursively into their inner aggregations; entries carrying `buckets`
/// yield the bucket list. Anything else is skipped.
pub fn unwrap_aggregations(response: &Value) -> Map<String, Value> {
    match response.get("aggregations").and_then(Value::as_object) {
        Some(container) => unwrap_container(container),
        None => Map::new(),
    }
}

fn unwrap_container(container: &Map<String, Value>) -> Map<String, Value> {
    let mut results = Map::new();
    for (name, agg) in container {
        let Some(agg) = agg.as_object() else { continue };
        if agg.contains_key("doc_count") {
            results.insert(name.clone(), Value::Object(unwrap_container(agg)));
        } else if let Some(buckets) = agg.get("buckets") {
            results.insert(name.clone(), buckets.clone());
        }
    }
    results
}
