//! Query state accumulator
//!
//! [`QueryState`] is the full, mutable description of one query before
//! compilation. Chainable methods consume and return the state; the
//! [`Grammar`](crate::query::grammar::Grammar) only ever reads it.
//! Nested-group and sub-aggregation closures receive a fresh child state
//! seeded with the parent's index.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::{EsQueryError, Result};
use crate::query::predicate::{Boolean, ColumnRef, Operator, Predicate, SortDirection};

/// Scroll cursor request: keep-alive duration plus the id of an already
/// open cursor (empty when opening a new one)
#[derive(Clone, Debug, Default)]
pub struct ScrollSpec {
    pub duration: String,
    pub scroll_id: String,
}

/// Aggregation function tags
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateFunction {
    Terms,
    Min,
    Max,
    Sum,
    Avg,
    Queries,
    Bulk,
}

impl AggregateFunction {
    /// The request-body key for this function
    pub fn key(self) -> &'static str {
        match self {
            AggregateFunction::Terms => "terms",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Queries => "queries",
            AggregateFunction::Bulk => "bulk",
        }
    }
}

/// One aggregation target: a field name (optionally `"field as alias"`)
/// plus extra attributes emitted alongside `field` in the aggregation body
#[derive(Clone, Debug)]
pub struct AggColumn {
    pub field: String,
    pub attrs: Map<String, Value>,
}

impl AggColumn {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            attrs: Map::new(),
        }
    }
}

/// One registered aggregation: a function, its target columns, and child
/// query states for filtered/nested sub-aggregations keyed by column
#[derive(Clone, Debug)]
pub struct AggregationSpec {
    pub function: AggregateFunction,
    pub columns: Vec<AggColumn>,
    pub children: HashMap<String, QueryState>,
}

/// The accumulated description of one query
///
/// Insertion order of predicates, sorts and aggregations is semantically
/// significant: it is the order clauses appear in the compiled body.
#[derive(Clone, Debug, Default)]
pub struct QueryState {
    pub(crate) columns: Option<Vec<String>>,
    pub(crate) distinct: Option<String>,
    pub(crate) index: Option<String>,
    pub(crate) doc_type: Option<String>,
    pub(crate) wheres: Vec<Predicate>,
    pub(crate) orders: Vec<(String, SortDirection)>,
    pub(crate) offset: Option<i64>,
    pub(crate) limit: Option<i64>,
    pub(crate) aggregations: Vec<AggregationSpec>,
    pub(crate) highlight: Option<Value>,
    pub(crate) scroll: Option<ScrollSpec>,
    pub(crate) refresh: Option<bool>,
    pub(crate) track_total: Option<bool>,
    pub(crate) log_enabled: bool,
    pub(crate) paginating: bool,
}

impl QueryState {
    pub fn new() -> Self {
        Self {
            log_enabled: true,
            ..Self::default()
        }
    }

    /// Target index, with dotted-name support: at most two segments, the
    /// second becoming the secondary type.
    pub fn from(mut self, name: &str) -> Self {
        match name.split_once('.') {
            Some((index, doc_type)) => {
                self.index = Some(index.to_string());
                self.doc_type = Some(doc_type.to_string());
            }
            None => self.index = Some(name.to_string()),
        }
        self
    }

    /// Columns to return; unset defaults to `*` at compile time
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Collapse results on the given field
    pub fn distinct(mut self, field: impl Into<String>) -> Self {
        self.distinct = Some(field.into());
        self
    }

    /// Add a basic comparison clause.
    ///
    /// An operator outside the supported set degrades to shorthand
    /// equality: the operator string itself becomes the compared value and
    /// the third argument is discarded. A JSON null value is only legal
    /// with `=`, `<>` or `!=`.
    pub fn where_clause(
        mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self> {
        let value = value.into();
        let predicate = match Operator::parse(operator) {
            Some(op) => {
                if value.is_null() && !Operator::allows_null(operator) {
                    return Err(EsQueryError::invalid_argument(
                        "Illegal operator and value combination",
                    ));
                }
                Predicate::Basic {
                    column: ColumnRef::One(column.into()),
                    operator: op,
                    value,
                }
            }
            None => Predicate::Basic {
                column: ColumnRef::One(column.into()),
                operator: Operator::Eq,
                value: Value::String(operator.to_string()),
            },
        };
        self.wheres.push(predicate);
        Ok(self)
    }

    /// Two-argument shorthand for an equality clause
    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.wheres.push(Predicate::Basic {
            column: ColumnRef::One(column.into()),
            operator: Operator::Eq,
            value: value.into(),
        });
        self
    }

    /// Match a single value against several columns at once (`multi_match`)
    pub fn where_any<I, S>(mut self, columns: I, value: impl Into<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wheres.push(Predicate::Basic {
            column: ColumnRef::Many(columns.into_iter().map(Into::into).collect()),
            operator: Operator::Eq,
            value: value.into(),
        });
        self
    }

    /// Add several conditions at once.
    ///
    /// An object applies `column => value` equality pairs. An array mixes
    /// pair objects with `[column, operator, value]` triples.
    pub fn where_many(mut self, conditions: Value) -> Result<Self> {
        match conditions {
            Value::Object(pairs) => {
                for (column, value) in pairs {
                    self = self.where_eq(column, value);
                }
                Ok(self)
            }
            Value::Array(entries) => {
                for entry in entries {
                    self = match entry {
                        Value::Object(_) => self.where_many(entry)?,
                        Value::Array(triple) if triple.len() == 3 => {
                            let (column, operator) = match (&triple[0], &triple[1]) {
                                (Value::String(c), Value::String(o)) => (c.clone(), o.clone()),
                                _ => {
                                    return Err(EsQueryError::invalid_argument(
                                        "Condition triple must start with column and operator strings",
                                    ))
                                }
                            };
                            self.where_clause(column, &operator, triple[2].clone())?
                        }
                        other => {
                            return Err(EsQueryError::invalid_argument(format!(
                                "Unsupported condition entry: {other}"
                            )))
                        }
                    };
                }
                Ok(self)
            }
            other => Err(EsQueryError::invalid_argument(format!(
                "Conditions must be an object or array, got {other}"
            ))),
        }
    }

    /// Open a nested group joined to the parent with `and`
    pub fn where_nested<F>(self, callback: F) -> Result<Self>
    where
        F: FnOnce(QueryState) -> Result<QueryState>,
    {
        let child = callback(self.child_query())?;
        Ok(self.add_nested(child, Boolean::And))
    }

    /// Open a nested group joined to the parent with `or`.
    ///
    /// A group holding exactly one basic condition collapses onto the
    /// parent as a plain predicate whose bucket resolves to `should`;
    /// larger groups stay nested.
    pub fn or_where<F>(self, callback: F) -> Result<Self>
    where
        F: FnOnce(QueryState) -> Result<QueryState>,
    {
        let mut child = callback(self.child_query())?;

        if child.wheres.len() == 1 {
            if let Predicate::Basic {
                column: ColumnRef::One(column),
                value,
                ..
            } = &child.wheres[0]
            {
                let (column, value) = (column.clone(), value.clone());
                child.wheres.clear();
                let mut parent = self;
                parent.wheres.push(Predicate::Basic {
                    column: ColumnRef::One(column),
                    operator: Operator::Or,
                    value,
                });
                return Ok(parent);
            }
        }

        Ok(self.add_nested(child, Boolean::Or))
    }

    /// Attach an already built child state as a nested group; groups with
    /// no conditions are dropped
    pub fn add_nested(mut self, child: QueryState, boolean: Boolean) -> Self {
        if !child.wheres.is_empty() {
            self.wheres.push(Predicate::Nested {
                state: Box::new(child),
                boolean,
            });
        }
        self
    }

    /// Membership clause
    pub fn where_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.wheres.push(Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Negated membership clause
    pub fn where_not_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.wheres.push(Predicate::NotIn {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Range clause over `[low, high)`. Anything other than exactly two
    /// values compiles to an empty clause rather than erroring.
    pub fn where_between<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.wheres.push(Predicate::Between {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Negated range clause
    pub fn where_not_between<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.wheres.push(Predicate::NotBetween {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Field-presence clause, one predicate per column
    pub fn where_exists<'a, I>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        for column in columns {
            self.wheres.push(Predicate::Exists {
                column: column.to_string(),
            });
        }
        self
    }

    /// Negated field-presence clause, one predicate per column
    pub fn where_not_exists<'a, I>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        for column in columns {
            self.wheres.push(Predicate::NotExists {
                column: column.to_string(),
            });
        }
        self
    }

    /// Alias: a null field is one that does not exist
    pub fn where_null<'a, I>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.where_not_exists(columns)
    }

    /// Alias: a non-null field is one that exists
    pub fn where_not_null<'a, I>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.where_exists(columns)
    }

    /// Full-text match clause
    pub fn where_like(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.wheres.push(Predicate::Like {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Add a sort pair; direction must be `asc` or `desc`
    pub fn order_by(mut self, column: impl Into<String>, direction: &str) -> Result<Self> {
        let direction = SortDirection::parse(direction)?;
        self.orders.push((column.into(), direction));
        Ok(self)
    }

    /// Add a descending sort pair
    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.orders.push((column.into(), SortDirection::Desc));
        self
    }

    /// Bucket results by the given columns (`terms` aggregation)
    pub fn group_by<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = columns.into_iter().map(AggColumn::new).collect();
        self.set_aggregate(AggregateFunction::Terms, columns, HashMap::new())
    }

    /// Bucket results by a column with extra aggregation attributes
    /// (e.g. `{"size": 100}`) emitted alongside `field`
    pub fn group_by_with(self, column: impl Into<String>, attrs: Value) -> Self {
        let mut agg_column = AggColumn::new(column);
        if let Value::Object(attrs) = attrs {
            agg_column.attrs = attrs;
        }
        self.set_aggregate(AggregateFunction::Terms, vec![agg_column], HashMap::new())
    }

    /// Bucket results by a column with a filtered/nested sub-aggregation
    /// described by the callback
    pub fn group_by_queries<F>(self, column: impl Into<String>, callback: F) -> Result<Self>
    where
        F: FnOnce(QueryState) -> Result<QueryState>,
    {
        let column = column.into();
        let child = callback(self.child_query())?;
        let children = HashMap::from([(column.clone(), child)]);
        Ok(self.set_aggregate(
            AggregateFunction::Queries,
            vec![AggColumn::new(column)],
            children,
        ))
    }

    /// Register a bulk aggregation entry: a filter plus sub-aggregations
    /// keyed by the raw column name
    pub fn group_by_bulk<F>(self, column: impl Into<String>, callback: F) -> Result<Self>
    where
        F: FnOnce(QueryState) -> Result<QueryState>,
    {
        let column = column.into();
        let child = callback(self.child_query())?;
        let children = HashMap::from([(column.clone(), child)]);
        Ok(self.set_aggregate(
            AggregateFunction::Bulk,
            vec![AggColumn::new(column)],
            children,
        ))
    }

    /// Register a bulk aggregation entry without a filter; falls back to a
    /// plain `terms` aggregation
    pub fn group_by_bulk_terms(self, column: impl Into<String>) -> Self {
        self.set_aggregate(
            AggregateFunction::Bulk,
            vec![AggColumn::new(column)],
            HashMap::new(),
        )
    }

    /// Alias for `offset`
    pub fn skip(self, value: i64) -> Self {
        self.offset(value)
    }

    /// Result window start, clamped to zero
    pub fn offset(mut self, value: i64) -> Self {
        self.offset = Some(value.max(0));
        self
    }

    /// Alias for `limit`
    pub fn take(self, value: i64) -> Self {
        self.limit(value)
    }

    /// Result window size; negative values are ignored
    pub fn limit(mut self, value: i64) -> Self {
        if value >= 0 {
            self.limit = Some(value);
        }
        self
    }

    /// Offset/limit for the given page number
    pub fn for_page(self, page: i64, per_page: i64) -> Self {
        self.offset((page - 1) * per_page).limit(per_page)
    }

    /// Attach a scroll cursor request to the query
    pub fn scroll(mut self, duration: impl Into<String>, scroll_id: impl Into<String>) -> Self {
        self.scroll = Some(ScrollSpec {
            duration: duration.into(),
            scroll_id: scroll_id.into(),
        });
        self
    }

    /// Ask the engine to refresh after a write
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = Some(refresh);
        self
    }

    /// Toggle query logging for this query
    pub fn log_enable(mut self, enabled: bool) -> Self {
        self.log_enabled = enabled;
        self
    }

    /// Request an accurate total hit count (`track_total_hits`)
    pub fn track_total(mut self, enabled: bool) -> Self {
        self.track_total = Some(enabled);
        self
    }

    /// Attach a prebuilt highlight spec
    pub fn highlight(mut self, spec: Value) -> Self {
        self.highlight = Some(spec);
        self
    }

    /// Apply the callback when the condition holds
    pub fn when<F>(self, condition: bool, callback: F) -> Result<Self>
    where
        F: FnOnce(QueryState) -> Result<QueryState>,
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
        F: FnOnce(QueryState) -> Result<QueryState>,
    {
        self.when(!condition, callback)
    }

    /// Fresh child state for nested groups and sub-aggregations, seeded
    /// with the parent's index
    pub fn child_query(&self) -> QueryState {
        let mut child = QueryState::new();
        child.index.clone_from(&self.index);
        child
    }

    /// Register an aggregation, merging into an existing spec for the same
    /// function. Aggregation mode excludes row selection: requested columns
    /// are cleared and the window shrinks to zero.
    pub(crate) fn set_aggregate(
        mut self,
        function: AggregateFunction,
        columns: Vec<AggColumn>,
        children: HashMap<String, QueryState>,
    ) -> Self {
        match self
            .aggregations
            .iter()
            .position(|spec| spec.function == function)
        {
            Some(index) => {
                let spec = &mut self.aggregations[index];
                spec.columns.extend(columns);
                spec.children.extend(children);
            }
            None => self.aggregations.push(AggregationSpec {
                function,
                columns,
                children,
            }),
        }
        self.limit = Some(0);
        self.offset = None;
        self.columns = Some(Vec::new());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_splits_dotted_names() {
        let state = QueryState::new().from("logs.event");
        assert_eq!(state.index.as_deref(), Some("logs"));
        assert_eq!(state.doc_type.as_deref(), Some("event"));

        let state = QueryState::new().from("logs");
        assert_eq!(state.index.as_deref(), Some("logs"));
        assert!(state.doc_type.is_none());

        // Only the first separator splits
        let state = QueryState::new().from("a.b.c");
        assert_eq!(state.index.as_deref(), Some("a"));
        assert_eq!(state.doc_type.as_deref(), Some("b.c"));
    }

    #[test]
    fn test_limit_ignores_negative_values() {
        let state = QueryState::new().limit(-1);
        assert!(state.limit.is_none());

        let state = QueryState::new().limit(10).limit(-5);
        assert_eq!(state.limit, Some(10));
    }

    #[test]
    fn test_offset_clamps_to_zero() {
        let state = QueryState::new().offset(-5);
        assert_eq!(state.offset, Some(0));
    }

    #[test]
    fn test_unknown_operator_degrades_to_equality() {
        let state = QueryState::new().where_clause("name", "bogus", 42).unwrap();
        match &state.wheres[0] {
            Predicate::Basic {
                operator, value, ..
            } => {
                assert_eq!(*operator, Operator::Eq);
                assert_eq!(*value, json!("bogus"));
            }
            other => panic!("expected basic predicate, got {other:?}"),
        }
    }

    #[test]
    fn test_null_value_rejected_outside_equality() {
        let err = QueryState::new()
            .where_clause("age", ">", Value::Null)
            .unwrap_err();
        assert!(err.is_invalid_argument());

        assert!(QueryState::new()
            .where_clause("age", "=", Value::Null)
            .is_ok());
        assert!(QueryState::new()
            .where_clause("age", "!=", Value::Null)
            .is_ok());
    }

    #[test]
    fn test_aggregation_resets_columns_and_window() {
        let state = QueryState::new()
            .select(["a", "b"])
            .limit(50)
            .offset(10)
            .group_by(["category"]);

        assert_eq!(state.columns, Some(vec![]));
        assert_eq!(state.limit, Some(0));
        assert!(state.offset.is_none());
    }

    #[test]
    fn test_aggregations_merge_by_function() {
        let state = QueryState::new().group_by(["a"]).group_by(["b"]);
        assert_eq!(state.aggregations.len(), 1);
        assert_eq!(state.aggregations[0].columns.len(), 2);

        let state = state.group_by_bulk_terms("c");
        assert_eq!(state.aggregations.len(), 2);
    }

    #[test]
    fn test_single_or_group_collapses() {
        let state = QueryState::new()
            .or_where(|q| q.where_clause("a", "=", 1))
            .unwrap();

        assert_eq!(state.wheres.len(), 1);
        match &state.wheres[0] {
            Predicate::Basic {
                operator, value, ..
            } => {
                assert_eq!(*operator, Operator::Or);
                assert_eq!(*value, json!(1));
            }
            other => panic!("expected collapsed basic predicate, got {other:?}"),
        }
    }

    #[test]
    fn test_multi_predicate_or_group_stays_nested() {
        let state = QueryState::new()
            .or_where(|q| Ok(q.where_eq("a", 1).where_eq("b", 2)))
            .unwrap();

        assert_eq!(state.wheres.len(), 1);
        assert!(matches!(
            &state.wheres[0],
            Predicate::Nested {
                boolean: Boolean::Or,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_nested_group_is_dropped() {
        let state = QueryState::new().where_nested(Ok).unwrap();
        assert!(state.wheres.is_empty());
    }

    #[test]
    fn test_where_many_object_and_triples() {
        let state = QueryState::new()
            .where_many(json!({"status": "open", "kind": "task"}))
            .unwrap();
        assert_eq!(state.wheres.len(), 2);

        let state = QueryState::new()
            .where_many(json!([{"status": "open"}, ["age", ">", 5]]))
            .unwrap();
        assert_eq!(state.wheres.len(), 2);
        match &state.wheres[1] {
            Predicate::Basic { operator, .. } => assert_eq!(*operator, Operator::Gt),
            other => panic!("expected basic predicate, got {other:?}"),
        }

        assert!(QueryState::new().where_many(json!("nope")).is_err());
    }

    #[test]
    fn test_exists_family_appends_per_column() {
        let state = QueryState::new().where_exists(["a", "b"]);
        assert_eq!(state.wheres.len(), 2);

        let state = QueryState::new().where_null(["deleted_at"]);
        assert!(matches!(&state.wheres[0], Predicate::NotExists { .. }));

        let state = QueryState::new().where_not_null(["created_at"]);
        assert!(matches!(&state.wheres[0], Predicate::Exists { .. }));
    }

    #[test]
    fn test_when_and_unless() {
        let state = QueryState::new()
            .when(true, |q| Ok(q.where_eq("a", 1)))
            .unwrap()
            .when(false, |q| Ok(q.where_eq("b", 2)))
            .unwrap()
            .unless(false, |q| Ok(q.where_eq("c", 3)))
            .unwrap();
        assert_eq!(state.wheres.len(), 2);
    }
}
