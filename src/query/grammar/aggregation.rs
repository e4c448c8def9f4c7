//! Aggregation compiler
//!
//! Compiles registered aggregation specs into the engine's `aggs` request
//! shape. Simple functions emit one leaf aggregation per target column;
//! `queries` mode attaches a filtered sub-aggregation per column with a
//! registered child query; `bulk` mode always emits `filter` + `aggs`
//! pairs keyed by the raw column name. The compiler is reentrant: filtered
//! sub-aggregations call back into the boolean compiler and into the
//! aggregation compiler for the child's own specs.

use serde_json::{Map, Value};

use crate::query::grammar::Grammar;
use crate::query::state::{AggColumn, AggregateFunction, AggregationSpec, QueryState};

use std::collections::HashMap;

impl Grammar {
    /// Compile all registered aggregations, in registration order.
    /// Colliding aliases resolve last-write-wins.
    pub(crate) fn compile_aggregate(&self, specs: &[AggregationSpec]) -> Map<String, Value> {
        let mut aggs = Map::new();
        for spec in specs {
            let compiled = match spec.function {
                AggregateFunction::Queries => {
                    self.compile_queries_agg(&spec.columns, &spec.children)
                }
                AggregateFunction::Bulk => self.compile_bulk_agg(&spec.columns, &spec.children),
                simple => self.compile_simple_agg(simple, &spec.columns),
            };
            for (alias, body) in compiled {
                aggs.insert(alias, body);
            }
        }
        aggs
    }

    /// One leaf aggregation per column: `{alias: {function: {field, ...}}}`
    fn compile_simple_agg(
        &self,
        function: AggregateFunction,
        columns: &[AggColumn],
    ) -> Map<String, Value> {
        let mut aggs = Map::new();
        for column in columns {
            let (field, alias) = self.wrap_agg_column(&column.field, function);
            let mut attrs = Map::new();
            attrs.insert("field".to_string(), Value::String(field));
            for (key, value) in &column.attrs {
                attrs.insert(key.clone(), value.clone());
            }
            let mut body = Map::new();
            body.insert(function.key().to_string(), Value::Object(attrs));
            aggs.insert(alias, Value::Object(body));
        }
        aggs
    }

    /// Terms aggregation per column, with the child's predicates attached
    /// as a filter sub-aggregation under the `nested` key. A child without
    /// predicates contributes its own aggregations as siblings instead.
    fn compile_queries_agg(
        &self,
        columns: &[AggColumn],
        children: &HashMap<String, QueryState>,
    ) -> Map<String, Value> {
        let mut aggs = Map::new();
        for column in columns {
            let Some(child) = children.get(&column.field) else {
                for (alias, body) in self.compile_simple_agg(AggregateFunction::Terms, &[column.clone()]) {
                    aggs.insert(alias, body);
                }
                continue;
            };

            let (field, alias) = self.wrap_agg_column(&column.field, AggregateFunction::Terms);
            let mut field_attrs = Map::new();
            field_attrs.insert("field".to_string(), Value::String(field));
            let mut entry = Map::new();
            entry.insert("terms".to_string(), Value::Object(field_attrs));

            let (filter, child_aggs) = self.compile_agg_filters(child);
            let has_filter = filter.as_object().is_some_and(|f| !f.is_empty());
            if has_filter {
                let mut nested = Map::new();
                nested.insert("filter".to_string(), filter);
                if !child_aggs.is_empty() {
                    nested.insert("aggs".to_string(), Value::Object(child_aggs));
                }
                let mut sub = Map::new();
                sub.insert("nested".to_string(), Value::Object(nested));
                entry.insert("aggs".to_string(), Value::Object(sub));
            } else if !child_aggs.is_empty() {
                entry.insert("aggs".to_string(), Value::Object(child_aggs));
            }

            aggs.insert(alias, Value::Object(entry));
        }
        aggs
    }

    /// Filter + aggs pair per column with a child query, keyed by the raw
    /// column name; columns without a child fall back to plain terms
    fn compile_bulk_agg(
        &self,
        columns: &[AggColumn],
        children: &HashMap<String, QueryState>,
    ) -> Map<String, Value> {
        let mut aggs = Map::new();
        for column in columns {
            match children.get(&column.field) {
                Some(child) => {
                    let (filter, child_aggs) = self.compile_agg_filters(child);
                    let mut entry = Map::new();
                    entry.insert("filter".to_string(), filter);
                    entry.insert("aggs".to_string(), Value::Object(child_aggs));
                    aggs.insert(column.field.clone(), Value::Object(entry));
                }
                None => {
                    for (alias, body) in
                        self.compile_simple_agg(AggregateFunction::Terms, &[column.clone()])
                    {
                        aggs.insert(alias, body);
                    }
                }
            }
        }
        aggs
    }

    /// Compile a child query into its boolean filter and sub-aggregations
    fn compile_agg_filters(&self, child: &QueryState) -> (Value, Map<String, Value>) {
        let filter = self.compile_bool(&self.compile_wheres(child));
        let aggs = self.compile_aggregate(&child.aggregations);
        (filter, aggs)
    }
}
