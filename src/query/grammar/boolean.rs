//! Boolean predicate compiler
//!
//! Turns the ordered predicate list of a query into the engine's bucketed
//! bool query. Each predicate contributes one leaf clause (`term`, `terms`,
//! `range`, `match`, `multi_match`, `exists`) to a bucket derived from its
//! operator; or-groups are embedded as a single AND-ed clause containing
//! the OR (`must: [{bool: {should: [...]}}]`).

use serde_json::{Map, Value};

use crate::query::grammar::Grammar;
use crate::query::predicate::{Boolean, BucketTag, ColumnRef, Operator, Predicate};
use crate::query::state::QueryState;

/// One predicate compiled to its clause plus the bucket it lands in
#[derive(Clone, Debug)]
pub(crate) struct CompiledWhere {
    pub bucket: BucketTag,
    pub clause: CompiledClause,
}

/// Either a single leaf clause or the member clauses of an or-group,
/// which are wrapped individually during assembly
#[derive(Clone, Debug)]
pub(crate) enum CompiledClause {
    Leaf(Value),
    Group(Vec<Value>),
}

impl Grammar {
    /// Compile each predicate of the state, in insertion order
    pub(crate) fn compile_wheres(&self, state: &QueryState) -> Vec<CompiledWhere> {
        state
            .wheres
            .iter()
            .map(|predicate| self.compile_predicate(predicate))
            .collect()
    }

    fn compile_predicate(&self, predicate: &Predicate) -> CompiledWhere {
        match predicate {
            Predicate::Basic {
                column,
                operator,
                value,
            } => {
                let clause = compile_meta(column, value, Some(*operator));
                // A multi-column comparison always compiles to a scored
                // multi_match clause, so it lands in must regardless of
                // the operator it was built with.
                let bucket = match column {
                    ColumnRef::Many(_) => BucketTag::Must,
                    ColumnRef::One(_) => bucket_for(*operator),
                };
                CompiledWhere {
                    bucket,
                    clause: CompiledClause::Leaf(clause),
                }
            }
            Predicate::In { column, values } => leaf(
                BucketTag::Filter,
                keyed2("terms", column, Value::Array(values.clone())),
            ),
            Predicate::NotIn { column, values } => leaf(
                BucketTag::MustNot,
                keyed2("terms", column, Value::Array(values.clone())),
            ),
            Predicate::Between { column, values } => {
                leaf(BucketTag::Filter, compile_between(column, values))
            }
            Predicate::NotBetween { column, values } => {
                leaf(BucketTag::MustNot, compile_between(column, values))
            }
            Predicate::Exists { column } => leaf(
                BucketTag::Filter,
                keyed2("exists", "field", Value::String(column.clone())),
            ),
            Predicate::NotExists { column } => leaf(
                BucketTag::MustNot,
                keyed2("exists", "field", Value::String(column.clone())),
            ),
            Predicate::Like { column, value } => {
                leaf(BucketTag::Must, keyed2("match", column, value.clone()))
            }
            Predicate::Nested { state, boolean } => {
                let child = self.compile_wheres(state);
                match boolean {
                    Boolean::And => CompiledWhere {
                        bucket: BucketTag::Filter,
                        clause: CompiledClause::Leaf(self.compile_bool(&child)),
                    },
                    Boolean::Or => CompiledWhere {
                        bucket: BucketTag::Should,
                        clause: CompiledClause::Group(
                            child.iter().map(clause_value).collect(),
                        ),
                    },
                }
            }
        }
    }

    /// Assemble compiled predicates into the bucketed bool structure.
    ///
    /// Buckets appear in first-occurrence order and empty buckets are
    /// omitted. Should entries are re-tagged as a single must member
    /// wrapping their OR group.
    pub(crate) fn compile_bool(&self, wheres: &[CompiledWhere]) -> Value {
        let mut buckets: Map<String, Value> = Map::new();
        for compiled in wheres {
            let (key, value) = match compiled.bucket {
                BucketTag::Should => {
                    let members = match &compiled.clause {
                        CompiledClause::Leaf(clause) => vec![clause.clone()],
                        CompiledClause::Group(members) => members.clone(),
                    };
                    ("must", should_group(members))
                }
                bucket => (bucket.key(), clause_value(compiled)),
            };
            let slot = buckets
                .entry(key)
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(entries) = slot {
                entries.push(value);
            }
        }
        if buckets.is_empty() {
            Value::Object(Map::new())
        } else {
            keyed("bool", Value::Object(buckets))
        }
    }
}

/// Resolve a compiled predicate to a single clause value; or-groups become
/// their wrapped should structure
fn clause_value(compiled: &CompiledWhere) -> Value {
    match &compiled.clause {
        CompiledClause::Leaf(clause) => clause.clone(),
        CompiledClause::Group(members) => should_group(members.clone()),
    }
}

/// Build the embedded OR structure: members without a direct match clause
/// are wrapped in an implicit filter sub-clause
fn should_group(members: Vec<Value>) -> Value {
    let wrapped: Vec<Value> = members
        .into_iter()
        .map(|member| {
            let is_match = member
                .as_object()
                .is_some_and(|m| m.contains_key("match"));
            if is_match {
                member
            } else {
                keyed("bool", keyed("filter", member))
            }
        })
        .collect();
    keyed("bool", keyed("should", Value::Array(wrapped)))
}

/// Compile a comparison into its leaf clause based on value shape:
/// multi-column targets become `multi_match`, array values `terms`, range
/// operators `range`, `like` a `match`, everything else a `term`
fn compile_meta(column: &ColumnRef, value: &Value, operator: Option<Operator>) -> Value {
    match column {
        ColumnRef::Many(fields) => {
            let mut inner = Map::new();
            inner.insert("query".to_string(), value.clone());
            inner.insert(
                "fields".to_string(),
                Value::Array(fields.iter().map(|f| Value::String(f.clone())).collect()),
            );
            keyed("multi_match", Value::Object(inner))
        }
        ColumnRef::One(column) => {
            if value.is_array() {
                return keyed2("terms", column, value.clone());
            }
            if let Some(keyword) = operator.and_then(Operator::range_keyword) {
                return keyed2("range", column, keyed(keyword, value.clone()));
            }
            if operator == Some(Operator::Like) {
                return keyed2("match", column, value.clone());
            }
            keyed2("term", column, value.clone())
        }
    }
}

/// Range clause over `[low, high)`; any arity other than two degrades to
/// an empty clause
fn compile_between(column: &str, values: &[Value]) -> Value {
    if values.len() != 2 {
        return Value::Object(Map::new());
    }
    let mut bounds = Map::new();
    bounds.insert("gte".to_string(), values[0].clone());
    bounds.insert("lt".to_string(), values[1].clone());
    keyed2("range", column, Value::Object(bounds))
}

/// Bucket inference: negated operators go to must_not, the or marker to
/// should, like to must, everything else to filter
fn bucket_for(operator: Operator) -> BucketTag {
    match operator {
        Operator::Ne => BucketTag::MustNot,
        Operator::Or => BucketTag::Should,
        Operator::Like => BucketTag::Must,
        _ => BucketTag::Filter,
    }
}

fn leaf(bucket: BucketTag, clause: Value) -> CompiledWhere {
    CompiledWhere {
        bucket,
        clause: CompiledClause::Leaf(clause),
    }
}

fn keyed(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn keyed2(outer: &str, inner: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(inner.to_string(), value);
    keyed(outer, Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grammar() -> Grammar {
        Grammar::new()
    }

    fn compile(state: QueryState) -> Value {
        let grammar = grammar();
        let compiled = grammar.compile_wheres(&state);
        grammar.compile_bool(&compiled)
    }

    #[test]
    fn test_bucket_inference() {
        assert_eq!(bucket_for(Operator::Eq), BucketTag::Filter);
        assert_eq!(bucket_for(Operator::Gt), BucketTag::Filter);
        assert_eq!(bucket_for(Operator::Ne), BucketTag::MustNot);
        assert_eq!(bucket_for(Operator::Like), BucketTag::Must);
        assert_eq!(bucket_for(Operator::Or), BucketTag::Should);
    }

    #[test]
    fn test_range_and_term_clauses_land_in_filter() {
        let state = QueryState::new()
            .where_clause("age", ">", 5)
            .unwrap()
            .where_clause("name", "=", "x")
            .unwrap();

        assert_eq!(
            compile(state),
            json!({
                "bool": {
                    "filter": [
                        {"range": {"age": {"gt": 5}}},
                        {"term": {"name": "x"}}
                    ]
                }
            })
        );
    }

    #[test]
    fn test_negated_operator_lands_in_must_not() {
        let state = QueryState::new()
            .where_clause("status", "!=", "closed")
            .unwrap();

        assert_eq!(
            compile(state),
            json!({"bool": {"must_not": [{"term": {"status": "closed"}}]}})
        );
    }

    #[test]
    fn test_array_value_compiles_to_terms() {
        let state = QueryState::new()
            .where_clause("status", "=", json!(["a", "b"]))
            .unwrap();

        assert_eq!(
            compile(state),
            json!({"bool": {"filter": [{"terms": {"status": ["a", "b"]}}]}})
        );
    }

    #[test]
    fn test_like_compiles_to_match_in_must() {
        let state = QueryState::new().where_like("title", "rust");
        assert_eq!(
            compile(state),
            json!({"bool": {"must": [{"match": {"title": "rust"}}]}})
        );
    }

    #[test]
    fn test_multi_column_compiles_to_multi_match() {
        let state = QueryState::new().where_any(["title", "body"], "rust");
        assert_eq!(
            compile(state),
            json!({
                "bool": {
                    "must": [
                        {"multi_match": {"query": "rust", "fields": ["title", "body"]}}
                    ]
                }
            })
        );
    }

    #[test]
    fn test_exists_clauses() {
        let state = QueryState::new()
            .where_exists(["a"])
            .where_not_exists(["b"]);
        assert_eq!(
            compile(state),
            json!({
                "bool": {
                    "filter": [{"exists": {"field": "a"}}],
                    "must_not": [{"exists": {"field": "b"}}]
                }
            })
        );
    }

    #[test]
    fn test_between_requires_exactly_two_values() {
        assert_eq!(
            compile_between("price", &[json!(10), json!(20)]),
            json!({"range": {"price": {"gte": 10, "lt": 20}}})
        );
        assert_eq!(compile_between("price", &[json!(10)]), json!({}));
        assert_eq!(
            compile_between("price", &[json!(1), json!(2), json!(3)]),
            json!({})
        );
    }

    #[test]
    fn test_or_group_embeds_as_single_must_member() {
        let state = QueryState::new()
            .or_where(|q| Ok(q.where_eq("a", 1).where_eq("b", 2)))
            .unwrap();

        assert_eq!(
            compile(state),
            json!({
                "bool": {
                    "must": [
                        {"bool": {"should": [
                            {"bool": {"filter": {"term": {"a": 1}}}},
                            {"bool": {"filter": {"term": {"b": 2}}}}
                        ]}}
                    ]
                }
            })
        );
    }

    #[test]
    fn test_match_members_stay_bare_in_or_groups() {
        let state = QueryState::new()
            .or_where(|q| Ok(q.where_like("title", "rust").where_eq("b", 2)))
            .unwrap();

        assert_eq!(
            compile(state),
            json!({
                "bool": {
                    "must": [
                        {"bool": {"should": [
                            {"match": {"title": "rust"}},
                            {"bool": {"filter": {"term": {"b": 2}}}}
                        ]}}
                    ]
                }
            })
        );
    }

    #[test]
    fn test_collapsed_or_matches_explicit_should() {
        let collapsed = QueryState::new()
            .or_where(|q| q.where_clause("a", "=", 1))
            .unwrap();

        assert_eq!(
            compile(collapsed),
            json!({
                "bool": {
                    "must": [
                        {"bool": {"should": [
                            {"bool": {"filter": {"term": {"a": 1}}}}
                        ]}}
                    ]
                }
            })
        );
    }

    #[test]
    fn test_and_group_compiles_to_nested_bool() {
        let state = QueryState::new()
            .where_nested(|q| Ok(q.where_eq("a", 1).where_eq("b", 2)))
            .unwrap();

        assert_eq!(
            compile(state),
            json!({
                "bool": {
                    "filter": [
                        {"bool": {"filter": [
                            {"term": {"a": 1}},
                            {"term": {"b": 2}}
                        ]}}
                    ]
                }
            })
        );
    }

    #[test]
    fn test_empty_predicate_list_compiles_to_empty_object() {
        assert_eq!(compile(QueryState::new()), json!({}));
    }
}
