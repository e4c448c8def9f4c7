//! Integration tests for aggregation-request compilation

use pretty_assertions::assert_eq;
use serde_json::json;

use esquery::{Grammar, QueryState};

fn compile(state: &QueryState) -> serde_json::Value {
    Grammar::new().compile_select(state)
}

#[test]
fn test_group_by_produces_aggregation_only_request() {
    let state = QueryState::new().from("products").group_by(["category"]);
    let body = compile(&state);

    assert_eq!(
        body,
        json!({
            "index": "products",
            "body": {
                "aggs": {"terms_category": {"terms": {"field": "category"}}}
            },
            "size": 0
        })
    );
    // Aggregation mode excludes row selection entirely
    assert_eq!(body.get("_source"), None);
    assert_eq!(body.get("from"), None);
}

#[test]
fn test_group_by_with_predicates_keeps_query_segment() {
    let state = QueryState::new()
        .from("products")
        .where_clause("price", ">", 10)
        .unwrap()
        .group_by(["category"]);

    let body = compile(&state);
    assert_eq!(
        body["body"]["query"],
        json!({"bool": {"filter": [{"range": {"price": {"gt": 10}}}]}})
    );
    assert_eq!(body["size"], json!(0));
}

#[test]
fn test_repeated_group_by_merges_columns() {
    let state = QueryState::new()
        .from("products")
        .group_by(["category"])
        .group_by(["brand"]);

    assert_eq!(
        compile(&state)["body"]["aggs"],
        json!({
            "terms_category": {"terms": {"field": "category"}},
            "terms_brand": {"terms": {"field": "brand"}}
        })
    );
}

#[test]
fn test_queries_mode_with_filtered_child_and_own_aggs() {
    let state = QueryState::new()
        .from("products")
        .group_by_queries("category", |q| {
            Ok(q.where_clause("price", ">", 10)?.group_by(["brand"]))
        })
        .unwrap();

    assert_eq!(
        compile(&state)["body"]["aggs"],
        json!({
            "terms_category": {
                "terms": {"field": "category"},
                "aggs": {
                    "nested": {
                        "filter": {
                            "bool": {"filter": [{"range": {"price": {"gt": 10}}}]}
                        },
                        "aggs": {"terms_brand": {"terms": {"field": "brand"}}}
                    }
                }
            }
        })
    );
}

#[test]
fn test_queries_mode_without_predicates_merges_siblings() {
    let state = QueryState::new()
        .from("products")
        .group_by_queries("category", |q| Ok(q.group_by(["brand"])))
        .unwrap();

    assert_eq!(
        compile(&state)["body"]["aggs"],
        json!({
            "terms_category": {
                "terms": {"field": "category"},
                "aggs": {"terms_brand": {"terms": {"field": "brand"}}}
            }
        })
    );
}

#[test]
fn test_bulk_mode_keys_entries_by_column_name() {
    let state = QueryState::new()
        .from("tasks")
        .group_by_bulk("open", |q| {
            Ok(q.where_eq("status", "open").group_by(["assignee"]))
        })
        .unwrap()
        .group_by_bulk_terms("category");

    assert_eq!(
        compile(&state)["body"]["aggs"],
        json!({
            "open": {
                "filter": {"bool": {"filter": [{"term": {"status": "open"}}]}},
                "aggs": {"terms_assignee": {"terms": {"field": "assignee"}}}
            },
            "terms_category": {"terms": {"field": "category"}}
        })
    );
}

#[test]
fn test_explicit_alias_and_extra_attributes() {
    let state = QueryState::new()
        .from("products")
        .group_by_with("price as price_buckets", json!({"size": 50}));

    assert_eq!(
        compile(&state)["body"]["aggs"],
        json!({
            "price_buckets": {"terms": {"field": "price", "size": 50}}
        })
    );
}
