//! Integration tests for insert/update/delete compilation

use pretty_assertions::assert_eq;
use serde_json::json;

use esquery::{Grammar, QueryState};

#[test]
fn test_insert_splits_id_beside_body() {
    let state = QueryState::new().from("tasks");
    let body = Grammar::new().compile_insert(&state, &json!({"id": 7, "title": "x"}));

    assert_eq!(
        body,
        json!({
            "index": "tasks",
            "id": 7,
            "body": {"id": 7, "title": "x"}
        })
    );
}

#[test]
fn test_insert_without_id_drops_the_id_key() {
    let state = QueryState::new().from("tasks");
    let body = Grammar::new().compile_insert(&state, &json!({"title": "x"}));
    assert_eq!(body.get("id"), None);
    assert_eq!(body["body"], json!({"title": "x"}));
}

#[test]
fn test_empty_insert_compiles_to_empty_body() {
    let state = QueryState::new().from("tasks");
    assert_eq!(Grammar::new().compile_insert(&state, &json!({})), json!({}));
    assert_eq!(
        Grammar::new().compile_update(&state, &json!({})),
        json!({})
    );
}

#[test]
fn test_batch_insert_pairs_action_and_document_lines() {
    let state = QueryState::new().from("tasks");
    let body = Grammar::new().compile_batch_insert(
        &state,
        &[json!({"id": 1, "a": "x"}), json!({"id": 2, "a": "y"})],
    );

    assert_eq!(
        body,
        json!({
            "index": "tasks",
            "body": [
                {"index": {"_index": "tasks", "_id": 1}},
                {"id": 1, "a": "x"},
                {"index": {"_index": "tasks", "_id": 2}},
                {"id": 2, "a": "y"}
            ]
        })
    );
}

#[test]
fn test_batch_insert_keeps_empty_ids_in_action_lines() {
    let state = QueryState::new().from("tasks");
    let body = Grammar::new().compile_batch_insert(&state, &[json!({"a": "x"})]);
    assert_eq!(
        body["body"][0],
        json!({"index": {"_index": "tasks", "_id": ""}})
    );
}

#[test]
fn test_batch_insert_applies_the_table_prefix() {
    let grammar = Grammar::new().with_table_prefix("app_");
    let state = QueryState::new().from("tasks");
    let body = grammar.compile_batch_insert(&state, &[json!({"id": 1})]);
    assert_eq!(
        body["body"][0],
        json!({"index": {"_index": "app_tasks", "_id": 1}})
    );
}

#[test]
fn test_update_without_predicates_builds_a_script() {
    let state = QueryState::new().from("tasks");
    let body = Grammar::new().compile_update(&state, &json!({"id": 7, "status": "done"}));

    assert_eq!(
        body,
        json!({
            "index": "tasks",
            "id": 7,
            "body": {
                "script": {
                    "inline": "ctx._source.status=params.status;",
                    "params": {"status": "done"}
                }
            }
        })
    );
}

#[test]
fn test_update_with_predicates_sends_plain_values() {
    let state = QueryState::new()
        .from("tasks")
        .where_eq("status", "open");
    let body = Grammar::new().compile_update(&state, &json!({"status": "done"}));

    assert_eq!(
        body["body"],
        json!({
            "query": {"bool": {"filter": [{"term": {"status": "open"}}]}},
            "status": "done"
        })
    );
}

#[test]
fn test_batch_update_pairs_update_and_doc_lines() {
    let state = QueryState::new().from("tasks");
    let body = Grammar::new().compile_batch_update(
        &state,
        &[json!({"id": 1, "a": "x"}), json!({"id": 2, "a": "y"})],
    );

    assert_eq!(
        body["body"],
        json!([
            {"update": {"_index": "tasks", "_id": 1}},
            {"doc": {"a": "x"}},
            {"update": {"_index": "tasks", "_id": 2}},
            {"doc": {"a": "y"}}
        ])
    );
}

#[test]
fn test_delete_compiles_through_the_select_pipeline() {
    let state = QueryState::new()
        .from("tasks")
        .where_eq("status", "stale");
    let body = Grammar::new().compile_delete(&state);

    assert_eq!(
        body,
        json!({
            "index": "tasks",
            "body": {
                "query": {"bool": {"filter": [{"term": {"status": "stale"}}]}}
            }
        })
    );
}

#[test]
fn test_upsert_keeps_raw_values_in_body() {
    let state = QueryState::new().from("tasks");
    let body = Grammar::new().compile_upsert(&state, &json!({"id": 3, "a": "x"}));
    assert_eq!(
        body,
        json!({
            "index": "tasks",
            "id": 3,
            "body": {"id": 3, "a": "x"}
        })
    );
}

#[test]
fn test_refresh_false_is_dropped_from_mutations() {
    let state = QueryState::new().from("tasks").refresh(false);
    let body = Grammar::new().compile_insert(&state, &json!({"id": 1}));
    assert_eq!(body.get("refresh"), None);

    let state = QueryState::new().from("tasks").refresh(true);
    let body = Grammar::new().compile_insert(&state, &json!({"id": 1}));
    assert_eq!(body["refresh"], json!(true));
}
