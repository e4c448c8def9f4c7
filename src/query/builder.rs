//! Fluent query builder
//!
//! [`Builder`] binds a [`QueryState`] to a [`Connection`] and a
//! [`Grammar`]. Chainable methods delegate to the state; terminal methods
//! compile the state exactly once, execute the request, and post-process
//! the raw response (hit lists, aggregation buckets, counts, scroll ids).
//!
//! Terminal methods consume the builder, so every builder is single-use:
//! state carried into a terminal call (including aggregation mode, which
//! clears the column selection and result window when registered) is never
//! reset for a later call. Sharing one builder across call paths is ruled
//! out the same way.

use std::collections::HashMap;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::connection::Connection;
use crate::error::{EsQueryError, Result};
use crate::models::response;
use crate::models::{Page, ScrollPage, UpdateSummary};
use crate::query::grammar::Grammar;
use crate::query::highlight;
use crate::query::state::{AggColumn, AggregateFunction, QueryState};

type ScopeFn = Box<dyn Fn(QueryState) -> Result<QueryState>>;

/// Fluent query front end bound to a connection
pub struct Builder<'c> {
    connection: &'c dyn Connection,
    grammar: Grammar,
    state: QueryState,
    scopes: HashMap<String, ScopeFn>,
}

impl std::fmt::Debug for Builder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("grammar", &self.grammar)
            .field("state", &self.state)
            .field("scopes", &self.scopes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<'c> Builder<'c> {
    /// New builder over the given connection. The grammar picks up the
    /// connection's `prefix` setting; the query-log flag defaults from
    /// `log_enabled`.
    pub fn new(connection: &'c dyn Connection) -> Self {
        let prefix = connection
            .get_config("prefix")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let log_enabled = connection
            .get_config("log_enabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        Self {
            connection,
            grammar: Grammar::new().with_table_prefix(prefix),
            state: QueryState::new().log_enable(log_enabled),
            scopes: HashMap::new(),
        }
    }

    /// New builder with an explicit grammar
    pub fn with_grammar(connection: &'c dyn Connection, grammar: Grammar) -> Self {
        Self {
            connection,
            grammar,
            state: QueryState::new(),
            scopes: HashMap::new(),
        }
    }

    /// Shorthand: a new builder already targeting an index
    pub fn table(connection: &'c dyn Connection, name: &str) -> Self {
        Self::new(connection).from(name)
    }

    /// The accumulated query state
    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// Compile the current state to a select body without executing it
    pub fn to_body(&self) -> Value {
        self.grammar.compile_select(&self.state)
    }

    // ---- chainable methods, delegating to the state ----

    pub fn from(mut self, name: &str) -> Self {
        self.state = self.state.from(name);
        self
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state = self.state.select(columns);
        self
    }

    pub fn distinct(mut self, field: impl Into<String>) -> Self {
        self.state = self.state.distinct(field);
        self
    }

    pub fn where_clause(
        mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self> {
        self.state = self.state.where_clause(column, operator, value)?;
        Ok(self)
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state = self.state.where_eq(column, value);
        self
    }

    pub fn where_any<I, S>(mut self, columns: I, value: impl Into<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state = self.state.where_any(columns, value);
        self
    }

    pub fn where_many(mut self, conditions: Value) -> Result<Self> {
        self.state = self.state.where_many(conditions)?;
        Ok(self)
    }

    pub fn where_nested<F>(mut self, callback: F) -> Result<Self>
    where
        F: FnOnce(QueryState) -> Result<QueryState>,
    {
        self.state = self.state.where_nested(callback)?;
        Ok(self)
    }

    pub fn or_where<F>(mut self, callback: F) -> Result<Self>
    where
        F: FnOnce(QueryState) -> Result<QueryState>,
    {
        self.state = self.state.or_where(callback)?;
        Ok(self)
    }

    pub fn where_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.state = self.state.where_in(column, values);
        self
    }

    pub fn where_not_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.state = self.state.where_not_in(column, values);
        self
    }

    pub fn where_between<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.state = self.state.where_between(column, values);
        self
    }

    pub fn where_not_between<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.state = self.state.where_not_between(column, values);
        self
    }

    pub fn where_exists<'a, I>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.state = self.state.where_exists(columns);
        self
    }

    pub fn where_not_exists<'a, I>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.state = self.state.where_not_exists(columns);
        self
    }

    pub fn where_null<'a, I>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.state = self.state.where_null(columns);
        self
    }

    pub fn where_not_null<'a, I>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.state = self.state.where_not_null(columns);
        self
    }

    pub fn where_like(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state = self.state.where_like(column, value);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: &str) -> Result<Self> {
        self.state = self.state.order_by(column, direction)?;
        Ok(self)
    }

    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.state = self.state.order_by_desc(column);
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state = self.state.group_by(columns);
        self
    }

    pub fn group_by_with(mut self, column: impl Into<String>, attrs: Value) -> Self {
        self.state = self.state.group_by_with(column, attrs);
        self
    }

    pub fn group_by_queries<F>(mut self, column: impl Into<String>, callback: F) -> Result<Self>
    where
        F: FnOnce(QueryState) -> Result<QueryState>,
    {
        self.state = self.state.group_by_queries(column, callback)?;
        Ok(self)
    }

    pub fn group_by_bulk<F>(mut self, column: impl Into<String>, callback: F) -> Result<Self>
    where
        F: FnOnce(QueryState) -> Result<QueryState>,
    {
        self.state = self.state.group_by_bulk(column, callback)?;
        Ok(self)
    }

    pub fn group_by_bulk_terms(mut self, column: impl Into<String>) -> Self {
        self.state = self.state.group_by_bulk_terms(column);
        self
    }

    pub fn skip(mut self, value: i64) -> Self {
        self.state = self.state.skip(value);
        self
    }

    pub fn offset(mut self, value: i64) -> Self {
        self.state = self.state.offset(value);
        self
    }

    pub fn take(mut self, value: i64) -> Self {
        self.state = self.state.take(value);
        self
    }

    pub fn limit(mut self, value: i64) -> Self {
        self.state = self.state.limit(value);
        self
    }

    pub fn for_page(mut self, page: i64, per_page: i64) -> Self {
        self.state = self.state.for_page(page, per_page);
        self
    }

    pub fn scroll(mut self, duration: impl Into<String>, scroll_id: impl Into<String>) -> Self {
        self.state = self.state.scroll(duration, scroll_id);
        self
    }

    pub fn refresh(mut self, refresh: bool) -> Self {
        self.state = self.state.refresh(refresh);
        self
    }

    pub fn log_enable(mut self, enabled: bool) -> Self {
        self.state = self.state.log_enable(enabled);
        self
    }

    pub fn track_total(mut self, enabled: bool) -> Self {
        self.state = self.state.track_total(enabled);
        self
    }

    /// Request highlighting on the given fields. Tag pairs come from the
    /// connection's `highlight` config; extra options merge into the spec.
    pub fn highlight(mut self, fields: Value, options: Value) -> Self {
        let config = self.connection.get_config("highlight");
        let spec = highlight::build_spec(config.as_ref(), fields, options);
        self.state = self.state.highlight(spec);
        self
    }

    /// Apply the callback when the condition holds
    pub fn when<F>(self, condition: bool, callback: F) -> Result<Self>
    where
        F: FnOnce(Self) -> Result<Self>,
    {
        if condition {
            callback(self)
        } else {
            Ok(self)
        }
    }

    /// Apply the callback when the condition does not hold
    pub fn unless<F>(self, condition: bool, callback: F) -> Result<Self>
    where
        F: FnOnce(Self) -> Result<Self>,
    {
        self.when(!condition, callback)
    }

    /// Register a named query scope on this builder
    pub fn register_scope<F>(mut self, name: impl Into<String>, scope: F) -> Self
    where
        F: Fn(QueryState) -> Result<QueryState> + 'static,
    {
        self.scopes.insert(name.into(), Box::new(scope));
        self
    }

    /// Apply a registered scope by name; unknown names are a construction
    /// error
    pub fn scope(mut self, name: &str) -> Result<Self> {
        match self.scopes.get(name) {
            Some(scope) => {
                self.state = scope(std::mem::take(&mut self.state))?;
                Ok(self)
            }
            None => Err(EsQueryError::invalid_argument(format!(
                "Unknown scope \"{name}\""
            ))),
        }
    }

    // ---- terminal methods ----

    /// Execute the query and return the raw hit rows.
    ///
    /// When a scroll is attached and the returned page is empty, the
    /// scroll context is released before returning — exactly once per
    /// scroll lifecycle.
    pub fn get(self) -> Result<Vec<Value>> {
        let response = self.run_select()?;
        self.finish_scroll(&response)?;
        Ok(response::hits(&response))
    }

    /// Execute the query and return the whole raw response, with the same
    /// scroll-release obligation as [`get`](Builder::get)
    pub fn get_raw(self) -> Result<Value> {
        let response = self.run_select()?;
        self.finish_scroll(&response)?;
        Ok(response)
    }

    /// Execute the query and return one page of a scroll loop
    pub fn scroll_page(self) -> Result<ScrollPage> {
        let response = self.run_select()?;
        self.finish_scroll(&response)?;
        Ok(ScrollPage {
            total: response::total_hits(&response),
            scroll_id: response::scroll_id(&response).map(str::to_string),
            rows: response::hits(&response),
        })
    }

    /// Execute the query and return the first row
    pub fn first(self) -> Result<Option<Value>> {
        Ok(self.take(1).get()?.into_iter().next())
    }

    /// Fetch a single record by id
    pub fn find(self, id: impl Into<Value>) -> Result<Option<Value>> {
        self.where_eq("id", id).first()
    }

    /// Whether any row matches the query
    pub fn exists(self) -> Result<bool> {
        Ok(self.count()? > 0)
    }

    /// Collect one source field from every matching row
    pub fn pluck(self, column: &str) -> Result<Vec<Value>> {
        let this = if self.state.columns.is_none() {
            self.select([column])
        } else {
            self
        };
        let rows = this.get()?;
        Ok(rows
            .iter()
            .map(|row| row["_source"][column].clone())
            .collect())
    }

    /// Collect one source field keyed by another
    pub fn pluck_keyed(self, column: &str, key: &str) -> Result<Map<String, Value>> {
        let this = if self.state.columns.is_none() {
            self.select([column, key])
        } else {
            self
        };
        let rows = this.get()?;
        let mut out = Map::new();
        for row in &rows {
            let key_value = match &row["_source"][key] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.insert(key_value, row["_source"][column].clone());
        }
        Ok(out)
    }

    /// Execute a count request restricted to the query target and
    /// predicates
    pub fn count(self) -> Result<u64> {
        let body = self.grammar.compile_count(&self.state);
        self.log("count", &body);
        let response = self
            .connection
            .count(body.clone())
            .map_err(|e| e.into_query("count", &body))?;
        response
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| EsQueryError::Response("count response carries no count".to_string()))
    }

    /// Execute the query and unwrap the aggregation results: filtered
    /// entries (carrying `doc_count`) unwrap into their inner
    /// aggregations, bucketed entries yield their bucket lists
    pub fn aggregations(self) -> Result<Map<String, Value>> {
        let response = self.run_select()?;
        Ok(response::unwrap_aggregations(&response))
    }

    /// Minimum value of a column
    pub fn min(self, column: &str) -> Result<Option<Value>> {
        self.metric(AggregateFunction::Min, column)
    }

    /// Maximum value of a column
    pub fn max(self, column: &str) -> Result<Option<Value>> {
        self.metric(AggregateFunction::Max, column)
    }

    /// Average value of a column
    pub fn avg(self, column: &str) -> Result<Option<Value>> {
        self.metric(AggregateFunction::Avg, column)
    }

    /// Sum of a column, zero when nothing matched
    pub fn sum(self, column: &str) -> Result<Value> {
        Ok(self
            .metric(AggregateFunction::Sum, column)?
            .unwrap_or_else(|| json!(0)))
    }

    fn metric(mut self, function: AggregateFunction, column: &str) -> Result<Option<Value>> {
        let alias = format!("{}_{}", function.key(), column);
        self.state = self.state.set_aggregate(
            function,
            vec![AggColumn::new(column)],
            HashMap::new(),
        );
        let response = self.run_select()?;
        let value = response
            .get("aggregations")
            .and_then(|aggs| aggs.get(&alias))
            .and_then(|agg| agg.get("value"))
            .cloned()
            .filter(|value| !value.is_null());
        Ok(value)
    }

    /// Execute the query for the given page with an accurate total count
    /// and return the page of rows plus paging metadata. Pagination mode
    /// and the accurate-count flag live only for this call.
    pub fn paginate(mut self, per_page: i64, page: i64) -> Result<Page> {
        self.state.paginating = true;
        self.state = self.state.for_page(page, per_page).track_total(true);
        let response = self.run_select()?;
        Ok(Page {
            total: response::total_hits(&response),
            rows: response::hits(&response),
            per_page,
            current_page: page,
        })
    }

    /// Index one document, swallowing failures into `false`
    pub fn insert(self, doc: Value) -> bool {
        self.insert_get_version(doc).is_ok()
    }

    /// Index one document, raising on failure. An empty document is a
    /// no-op returning the empty body.
    pub fn insert_get_version(self, doc: Value) -> Result<Value> {
        let body = self.grammar.compile_insert(&self.state, &doc);
        if is_empty_body(&body) {
            return Ok(body);
        }
        self.log("index", &body);
        self.connection
            .insert(body.clone(), self.state.log_enabled)
            .map_err(|e| e.into_query("index", &body))
    }

    /// Index documents in bulk: action/document line pairs in input order
    pub fn batch_insert(self, docs: Vec<Value>) -> Result<Value> {
        let body = self.grammar.compile_batch_insert(&self.state, &docs);
        self.log("bulk", &body);
        self.connection
            .bulk(body.clone(), self.state.log_enabled)
            .map_err(|e| e.into_query("bulk", &body))
    }

    /// Update matching documents. With predicates the request routes
    /// through the update-by-query endpoint; without them the values
    /// compile into a partial-update script. Empty values are a no-op.
    pub fn update(self, values: Value) -> Result<UpdateSummary> {
        let body = self.grammar.compile_update(&self.state, &values);
        if is_empty_body(&body) {
            return Ok(UpdateSummary::default());
        }
        let by_query = !self.state.wheres.is_empty();
        let method = if by_query { "update_by_query" } else { "update" };
        self.log(method, &body);
        let response = self
            .connection
            .update(body.clone(), by_query, self.state.log_enabled)
            .map_err(|e| e.into_query(method, &body))?;
        Ok(UpdateSummary {
            total: response.get("total").and_then(Value::as_u64).unwrap_or(0),
            updated: response.get("updated").and_then(Value::as_u64).unwrap_or(0),
        })
    }

    /// Update documents in bulk: `{update: ...}` action lines paired with
    /// `{doc: ...}` lines
    pub fn batch_update(self, values: Vec<Value>) -> Result<Value> {
        let body = self.grammar.compile_batch_update(&self.state, &values);
        self.log("bulk", &body);
        self.connection
            .bulk(body.clone(), self.state.log_enabled)
            .map_err(|e| e.into_query("bulk", &body))
    }

    /// Delete matching documents (delete by query). Passing an id narrows
    /// the query to that document first.
    pub fn delete(self, id: Option<Value>) -> Result<Value> {
        let this = match id {
            Some(id) => self.where_eq("id", id),
            None => self,
        };
        let body = this.grammar.compile_delete(&this.state);
        this.log("delete_by_query", &body);
        this.connection
            .delete(body.clone(), this.state.log_enabled)
            .map_err(|e| e.into_query("delete_by_query", &body))
    }

    /// Release a scroll context by id
    pub fn clear_scroll(&self, scroll_id: &str) -> Result<Value> {
        let body = json!({ "scroll_id": scroll_id });
        self.connection
            .clear_scroll(body.clone())
            .map_err(|e| e.into_query("clear_scroll", &body))
    }

    fn run_select(&self) -> Result<Value> {
        let body = self.grammar.compile_select(&self.state);
        self.log("search", &body);
        self.connection
            .select(body.clone())
            .map_err(|e| e.into_query("search", &body))
    }

    /// Release the scroll context when the returned page is empty; called
    /// once per terminal call, after the response is in hand
    fn finish_scroll(&self, response: &Value) -> Result<()> {
        if self.state.scroll.is_none() {
            return Ok(());
        }
        if response::hits(response).is_empty() {
            if let Some(scroll_id) = response::scroll_id(response) {
                self.clear_scroll(scroll_id)?;
            }
        }
        Ok(())
    }

    fn log(&self, method: &str, body: &Value) {
        if self.state.log_enabled {
            debug!(
                method,
                paginating = self.state.paginating,
                body = %body,
                "executing query"
            );
        }
    }
}

fn is_empty_body(body: &Value) -> bool {
    body.as_object().is_some_and(|b| b.is_empty())
}
