//! Name wrapping and document splitting helpers
//!
//! Index and type names get the configured table prefix; aggregation
//! columns support `"field as alias"` naming; insert/update documents are
//! split into an `id` and the remaining body.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::query::grammar::Grammar;
use crate::query::state::AggregateFunction;

fn alias_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\s+as\s+").expect("static pattern"))
}

impl Grammar {
    /// Apply the table prefix to an index name
    pub(crate) fn wrap_table(&self, table: &str) -> String {
        format!("{}{}", self.table_prefix(), table)
    }

    /// Apply the table prefix to a type name
    pub(crate) fn wrap_type(&self, doc_type: &str) -> String {
        format!("{}{}", self.table_prefix(), doc_type)
    }

    /// Resolve an aggregation column to its field name and alias: an
    /// explicit `"field as alias"` wins over the `{function}_{field}`
    /// default
    pub(crate) fn wrap_agg_column(
        &self,
        column: &str,
        function: AggregateFunction,
    ) -> (String, String) {
        match split_alias(column) {
            Some((field, alias)) => (field, alias),
            None => (
                column.to_string(),
                format!("{}_{}", function.key(), column),
            ),
        }
    }
}

/// Split a `"field as alias"` column, case-insensitively
pub(crate) fn split_alias(column: &str) -> Option<(String, String)> {
    let mut parts = alias_pattern().splitn(column, 2);
    let field = parts.next()?;
    let alias = parts.next()?;
    Some((field.to_string(), alias.to_string()))
}

/// Split an insert document into its id (empty string when absent) and the
/// full document body; the id stays inside the body
pub(crate) fn columnize_insert(doc: &Map<String, Value>) -> (Value, Value) {
    let id = doc
        .get("id")
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()));
    (id, Value::Object(doc.clone()))
}

/// Split update values into their id and body. The id is removed from the
/// body; with `build_script` the remaining fields become a partial-update
/// script, otherwise they are sent as-is.
pub(crate) fn columnize_update(
    values: &Map<String, Value>,
    build_script: bool,
) -> (Value, Value) {
    let mut body = values.clone();
    let id = body
        .shift_remove("id")
        .unwrap_or_else(|| Value::String(String::new()));

    if build_script {
        let mut script = Map::new();
        script.insert("script".to_string(), Grammar::compile_script(&body));
        (id, Value::Object(script))
    } else {
        (id, Value::Object(body))
    }
}
