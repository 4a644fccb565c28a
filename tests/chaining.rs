mod common;

use contentsearch::error::SearchError;
use contentsearch::request::{SearchRequest, SearchRequests};
use serde_json::json;

use common::*;

#[test]
fn later_requests_see_earlier_rows() {
    let searcher = searcher();
    let batch = SearchRequests::new(vec![
        SearchRequest::new("page").named("pages").fields("id,createUserId").query("!notdeleted()"),
        SearchRequest::new("comment").named("comments").fields("id,createUserId").query("contentId in @pages.id"),
        SearchRequest::new("user").named("authors").fields("id,username").query("id in @comments.createUserId or id in @pages.createUserId"),
    ]);
    let bag = searcher.search(&batch, ADMIN).expect("search");
    assert_eq!(ids(bag.rows("pages").expect("pages"), "id"), vec![PUBLIC_PAGE, EDITORS_PAGE]);
    assert_eq!(ids(bag.rows("comments").expect("comments"), "id"), vec![1, 2, 3]);
    assert_eq!(ids(bag.rows("authors").expect("authors"), "id"), vec![ADMIN, ALICE]);
}

#[test]
fn not_in_excludes_earlier_rows() {
    let searcher = searcher();
    let batch = SearchRequests::new(vec![
        SearchRequest::new("content").named("mine").fields("id").query("createUserId = @me"),
        SearchRequest::new("content").named("others").fields("id").query("id not in @mine.id"),
    ])
    .with_value("me", json!(ALICE));
    let bag = searcher.search(&batch, ADMIN).expect("search");
    assert_eq!(ids(bag.rows("mine").expect("mine"), "id"), vec![ALICE_FILE]);
    assert_eq!(ids(bag.rows("others").expect("others"), "id"), vec![5, 6, 8, 9]);
}

#[test]
fn empty_results_chain_to_empty_results() {
    let searcher = searcher();
    let batch = SearchRequests::new(vec![
        SearchRequest::new("page").named("none").fields("id").query("name = @missing"),
        SearchRequest::new("comment").named("comments").fields("id").query("contentId in @none.id"),
    ])
    .with_value("missing", json!("no such page"));
    let bag = searcher.search(&batch, ADMIN).expect("search");
    assert_eq!(bag.rows("none"), Some(&Vec::new()));
    assert_eq!(bag.rows("comments"), Some(&Vec::new()));
}

#[test]
fn references_only_reach_backwards() {
    let searcher = searcher();
    let forward = SearchRequests::new(vec![
        SearchRequest::new("page").named("first").query("id in @second.id"),
        SearchRequest::new("page").named("second"),
    ]);
    let own = SearchRequests::new(vec![SearchRequest::new("page").named("loop").query("id in @loop.id")]);
    let nowhere = SearchRequests::new(vec![SearchRequest::new("page").named("p").query("id in @nowhere.id")]);
    for (batch, request, missing) in [(forward, "first", "second"), (own, "loop", "loop"), (nowhere, "p", "nowhere")] {
        let error = searcher.search(&batch, ADMIN).expect_err("reference");
        assert_eq!(error.request_name(), Some(request));
        assert!(matches!(error.root(), SearchError::UnknownReference(name) if name == missing));
    }
}

#[test]
fn failures_name_the_request_and_return_nothing() {
    let searcher = searcher();
    let batch = SearchRequests::new(vec![
        SearchRequest::new("page").named("fine").fields("id"),
        SearchRequest::new("page").named("broken").fields("id,nonsense"),
    ]);
    let error = searcher.search(&batch, ADMIN).expect_err("unknown field");
    assert_eq!(error.request_name(), Some("broken"));
    assert!(matches!(error.root(), SearchError::UnknownField { field, .. } if field == "nonsense"));
}

#[test]
fn duplicate_names_fail_before_any_query() {
    let searcher = searcher();
    let batch = SearchRequests::new(vec![
        SearchRequest::new("page").named("x"),
        SearchRequest::new("comment").named("x"),
    ]);
    let before = searcher.store().query_count();
    assert!(matches!(searcher.search(&batch, ADMIN), Err(SearchError::DuplicateName(name)) if name == "x"));
    assert!(matches!(searcher.search_unrestricted(&batch), Err(SearchError::DuplicateName(_))));
    assert_eq!(searcher.store().query_count(), before);

    // a defaulted name collides with an explicit one just the same
    let batch = SearchRequests::new(vec![SearchRequest::new("page"), SearchRequest::new("user").named("page")]);
    assert!(matches!(searcher.search(&batch, 0), Err(SearchError::DuplicateName(_))));
}

#[test]
fn request_names_cannot_shadow_values() {
    let searcher = searcher();
    let batch = SearchRequests::new(vec![SearchRequest::new("page").named("target").fields("id")])
        .with_value("target", json!(5));
    let before = searcher.store().query_count();
    assert!(matches!(searcher.search(&batch, 0), Err(SearchError::ParameterConflict(name)) if name == "target"));
    assert!(matches!(searcher.search_unrestricted(&batch), Err(SearchError::ParameterConflict(_))));
    assert_eq!(searcher.store().query_count(), before);
}
