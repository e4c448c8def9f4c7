//! Request body compilation
//!
//! [`Grammar`] is the pure compiler from an accumulated
//! [`QueryState`](crate::query::state::QueryState) to the engine's JSON
//! request bodies. Each populated select component compiles independently;
//! the segments are then merged recursively, with `query`, `aggs`, `sort`,
//! `collapse` and `highlight` wrapped under `body` and everything else
//! (`index`, `type`, `_source`, `size`, `from`, `refresh`,
//! `track_total_hits`, `scroll`) kept at the top level.
//!
//! Compiling the same state twice yields byte-identical output: predicates
//! and aggregations are emitted in registration order and key order is
//! preserved end to end.

mod aggregation;
mod boolean;
mod wrap;

use serde_json::{Map, Value};

use crate::query::state::QueryState;

/// The components that make up a select request, in emission order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Component {
    Aggregate,
    Columns,
    Distinct,
    Index,
    Type,
    Refresh,
    TrackTotal,
    Highlight,
    Wheres,
    Orders,
    Limit,
    Offset,
    Scroll,
}

impl Component {
    /// Whether this component's output nests under the request `body`
    fn in_body(self) -> bool {
        matches!(
            self,
            Component::Aggregate
                | Component::Distinct
                | Component::Highlight
                | Component::Wheres
                | Component::Orders
        )
    }
}

const SELECT_COMPONENTS: &[Component] = &[
    Component::Aggregate,
    Component::Columns,
    Component::Distinct,
    Component::Index,
    Component::Type,
    Component::Refresh,
    Component::TrackTotal,
    Component::Highlight,
    Component::Wheres,
    Component::Orders,
    Component::Limit,
    Component::Offset,
    Component::Scroll,
];

const COUNT_COMPONENTS: &[Component] = &[Component::Index, Component::Type, Component::Wheres];

/// Compiler from query state to engine request bodies
#[derive(Clone, Debug, Default)]
pub struct Grammar {
    table_prefix: String,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prefix applied to index and type names
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    /// Compile a full select request; unset columns default to `*`
    pub fn compile_select(&self, state: &QueryState) -> Value {
        if state.columns.is_none() {
            let mut state = state.clone();
            state.columns = Some(vec!["*".to_string()]);
            return self.compile_components(&state, SELECT_COMPONENTS);
        }
        self.compile_components(state, SELECT_COMPONENTS)
    }

    /// Compile a count request: target and predicates only
    pub fn compile_count(&self, state: &QueryState) -> Value {
        self.compile_components(state, COUNT_COMPONENTS)
    }

    /// Compile a single-document insert. An empty document compiles to an
    /// empty body, which callers treat as "nothing to send".
    pub fn compile_insert(&self, state: &QueryState, doc: &Value) -> Value {
        let Some(doc) = doc.as_object().filter(|d| !d.is_empty()) else {
            return Value::Object(Map::new());
        };
        let mut out = self.compile_components(state, SELECT_COMPONENTS);
        let (id, body) = wrap::columnize_insert(doc);
        merge_value(&mut out, keyed_pair("id", id, "body", body));
        filter_falsy(&mut out);
        out
    }

    /// Compile a bulk insert: one `{index: {_index, _id}}` action line
    /// followed by one document line per input record, in input order
    pub fn compile_batch_insert(&self, state: &QueryState, docs: &[Value]) -> Value {
        let attr = self.compile_components(state, SELECT_COMPONENTS);
        let mut lines = Vec::with_capacity(docs.len() * 2);
        for doc in docs {
            let Some(doc) = doc.as_object() else { continue };
            let (id, body) = wrap::columnize_insert(doc);
            let mut data = attr.clone();
            merge_value(&mut data, keyed_pair("id", id, "body", body));
            lines.push(action_line("index", &data));
            lines.push(data.get("body").cloned().unwrap_or(Value::Null));
        }
        let mut out = attr;
        merge_value(&mut out, keyed("body", Value::Array(lines)));
        out
    }

    /// Compile an update. Without predicates the values become a partial
    /// update script (`ctx._source.<field> = params.<field>`); with
    /// predicates the plain values are sent and the connection routes the
    /// request through the update-by-query endpoint.
    pub fn compile_update(&self, state: &QueryState, values: &Value) -> Value {
        let Some(values) = values.as_object().filter(|v| !v.is_empty()) else {
            return Value::Object(Map::new());
        };
        let mut out = self.compile_components(state, SELECT_COMPONENTS);
        let (id, body) = wrap::columnize_update(values, state.wheres.is_empty());
        merge_value(&mut out, keyed_pair("id", id, "body", body));
        filter_falsy(&mut out);
        out
    }

    /// Compile a bulk update: `{update: {_index, _id}}` action lines paired
    /// with `{doc: body}` document lines
    pub fn compile_batch_update(&self, state: &QueryState, values: &[Value]) -> Value {
        let attr = self.compile_components(state, SELECT_COMPONENTS);
        let mut lines = Vec::with_capacity(values.len() * 2);
        for item in values {
            let Some(item) = item.as_object() else { continue };
            let (id, body) = wrap::columnize_update(item, false);
            let mut data = attr.clone();
            merge_value(&mut data, keyed_pair("id", id, "body", body));
            lines.push(action_line("update", &data));
            lines.push(keyed("doc", data.get("body").cloned().unwrap_or(Value::Null)));
        }
        let mut out = attr;
        merge_value(&mut out, keyed("body", Value::Array(lines)));
        out
    }

    /// Compile an upsert: target components plus the raw values, with the
    /// `id` field surfaced beside the body
    pub fn compile_upsert(&self, state: &QueryState, values: &Value) -> Value {
        let Some(values) = values.as_object().filter(|v| !v.is_empty()) else {
            return Value::Object(Map::new());
        };
        let mut out = self.compile_components(state, SELECT_COMPONENTS);
        let id = values.get("id").cloned().unwrap_or_else(|| Value::String(String::new()));
        merge_value(
            &mut out,
            keyed_pair("id", id, "body", Value::Object(values.clone())),
        );
        filter_falsy(&mut out);
        out
    }

    /// Compile a delete-by-query request: the select pipeline selects the
    /// target set
    pub fn compile_delete(&self, state: &QueryState) -> Value {
        self.compile_components(state, SELECT_COMPONENTS)
    }

    /// Compile a partial-update script from field values
    pub fn compile_script(params: &Map<String, Value>) -> Value {
        let mut inline = String::new();
        for key in params.keys() {
            inline.push_str(&format!("ctx._source.{key}=params.{key};"));
        }
        let mut script = Map::new();
        script.insert("inline".to_string(), Value::String(inline));
        script.insert("params".to_string(), Value::Object(params.clone()));
        Value::Object(script)
    }

    /// Compile each populated component and merge the surviving segments
    fn compile_components(&self, state: &QueryState, components: &[Component]) -> Value {
        let mut out = Value::Object(Map::new());
        for &component in components {
            let Some(Value::Object(segment)) = self.compile_component(state, component) else {
                continue;
            };
            let segment: Map<String, Value> =
                segment.into_iter().filter(|(_, v)| keep(v)).collect();
            if segment.is_empty() {
                continue;
            }
            if component.in_body() {
                merge_value(&mut out, keyed("body", Value::Object(segment)));
            } else {
                merge_value(&mut out, Value::Object(segment));
            }
        }
        out
    }

    fn compile_component(&self, state: &QueryState, component: Component) -> Option<Value> {
        match component {
            Component::Aggregate => {
                if state.aggregations.is_empty() {
                    return None;
                }
                let aggs = self.compile_aggregate(&state.aggregations);
                Some(keyed("aggs", Value::Object(aggs)))
            }
            Component::Columns => state
                .columns
                .as_ref()
                .map(|columns| keyed("_source", serde_json::json!(columns))),
            Component::Distinct => state.distinct.as_ref().map(|field| {
                let mut collapse = Map::new();
                if !field.is_empty() {
                    collapse.insert("field".to_string(), Value::String(field.clone()));
                }
                keyed("collapse", Value::Object(collapse))
            }),
            Component::Index => state
                .index
                .as_ref()
                .map(|index| keyed("index", Value::String(self.wrap_table(index)))),
            Component::Type => state
                .doc_type
                .as_ref()
                .map(|doc_type| keyed("type", Value::String(self.wrap_type(doc_type)))),
            Component::Refresh => state.refresh.map(|refresh| keyed("refresh", Value::Bool(refresh))),
            Component::TrackTotal => state
                .track_total
                .map(|track| keyed("track_total_hits", Value::Bool(track))),
            Component::Highlight => state
                .highlight
                .as_ref()
                .map(|spec| keyed("highlight", compile_highlight(spec))),
            Component::Wheres => {
                if state.wheres.is_empty() {
                    return None;
                }
                let compiled = self.compile_wheres(state);
                Some(keyed("query", self.compile_bool(&compiled)))
            }
            Component::Orders => {
                if state.orders.is_empty() {
                    return None;
                }
                let sort: Vec<Value> = state
                    .orders
                    .iter()
                    .map(|(column, direction)| {
                        keyed(column, Value::String(direction.as_str().to_string()))
                    })
                    .collect();
                Some(keyed("sort", Value::Array(sort)))
            }
            Component::Limit => state.limit.map(|limit| keyed("size", limit.into())),
            Component::Offset => state.offset.map(|offset| keyed("from", offset.into())),
            Component::Scroll => state.scroll.as_ref().map(|scroll| {
                let mut segment = Map::new();
                segment.insert(
                    "scroll".to_string(),
                    Value::String(scroll.duration.clone()),
                );
                segment.insert(
                    "scroll_id".to_string(),
                    Value::String(scroll.scroll_id.clone()),
                );
                Value::Object(segment)
            }),
        }
    }
}

/// Normalize a highlight spec: a field list becomes a map of field name to
/// empty per-field settings, a field map passes through
fn compile_highlight(spec: &Value) -> Value {
    let mut spec = spec.clone();
    if let Some(fields) = spec.get("fields").cloned() {
        if let Value::Array(names) = fields {
            let mut map = Map::new();
            for name in names {
                if let Value::String(name) = name {
                    map.insert(name, Value::Object(Map::new()));
                }
            }
            spec["fields"] = Value::Object(map);
        }
    }
    spec
}

/// Component survival rule: booleans and numbers always survive, other
/// values survive when non-empty
fn keep(value: &Value) -> bool {
    match value {
        Value::Bool(_) | Value::Number(_) => true,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    }
}

/// Shallow falsy filter applied to mutation bodies: empty strings, zeros,
/// `false` and empty containers are dropped from the top level
fn filter_falsy(value: &mut Value) {
    if let Value::Object(map) = value {
        map.retain(|_, v| match v {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64() != Some(0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        });
    }
}

/// Recursive segment merge: objects merge key-wise, arrays concatenate,
/// anything else is replaced by the incoming value
fn merge_value(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (Value::Object(base), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match base.entry(key) {
                    serde_json::map::Entry::Occupied(mut slot) => {
                        merge_value(slot.get_mut(), value);
                    }
                    serde_json::map::Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        (Value::Array(base), Value::Array(incoming)) => base.extend(incoming),
        (base, incoming) => *base = incoming,
    }
}

/// One-entry object
fn keyed(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// Two-entry object
fn keyed_pair(key_a: &str, value_a: Value, key_b: &str, value_b: Value) -> Value {
    let mut map = Map::new();
    map.insert(key_a.to_string(), value_a);
    map.insert(key_b.to_string(), value_b);
    Value::Object(map)
}

/// Bulk action line referencing the compiled target and document id
fn action_line(action: &str, data: &Value) -> Value {
    let mut target = Map::new();
    target.insert(
        "_index".to_string(),
        data.get("index").cloned().unwrap_or(Value::Null),
    );
    target.insert(
        "_id".to_string(),
        data.get("id").cloned().unwrap_or_else(|| Value::String(String::new())),
    );
    keyed(action, Value::Object(target))
}
