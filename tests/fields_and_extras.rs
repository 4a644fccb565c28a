mod common;

use contentsearch::request::{SearchRequest, SearchRequests};
use serde_json::{json, Value};

use common::*;

fn one(type_name: &str, fields: &str, id: i64) -> serde_json::Map<String, Value> {
    let batch = SearchRequests::new(vec![SearchRequest::new(type_name).named("r").fields(fields).query("id = @id")])
        .with_value("id", json!(id));
    let bag = searcher().search(&batch, ADMIN).expect("search");
    bag.rows("r").and_then(|rows| rows.first().cloned()).expect("row")
}

#[test]
fn content_extras_are_filled_in() {
    let page = one("page", "id,keywords,values,votes,permissions", PUBLIC_PAGE);
    assert_eq!(page["keywords"], json!(["welcome", "intro"]));
    assert_eq!(page["values"], json!({"color": "blue", "config": {"a": 1}, "plain": "not json"}));
    assert_eq!(page["votes"], json!({"ok": 1, "good": 2, "bad": 0}));
    assert_eq!(page["permissions"], json!({"0": "R", "1": "CRUD"}));
}

#[test]
fn rows_without_extras_get_empty_collections() {
    let page = one("page", "id,keywords,values,votes,permissions", DELETED_PAGE);
    assert_eq!(page["keywords"], json!([]));
    assert_eq!(page["values"], json!({}));
    assert_eq!(page["votes"], json!({"ok": 0, "good": 0, "bad": 0}));
    assert_eq!(page["permissions"], json!({"0": "R"}));
}

#[test]
fn extras_span_every_row() {
    let batch = SearchRequests::new(vec![SearchRequest::new("page").named("r").fields("id,keywords")]);
    let bag = searcher().search(&batch, ADMIN).expect("search");
    let keywords: Vec<Value> = bag.rows("r").expect("r").iter().map(|r| r["keywords"].clone()).collect();
    assert_eq!(keywords, vec![json!(["welcome", "intro"]), json!(["internal"]), json!([])]);
}

#[test]
fn id_needed_for_extras_is_not_returned() {
    let page = one("page", "name,keywords", PUBLIC_PAGE);
    assert!(!page.contains_key("id"));
    assert_eq!(page["name"], json!("Welcome"));
    assert_eq!(page["keywords"], json!(["welcome", "intro"]));
}

#[test]
fn user_groups() {
    assert_eq!(one("user", "id,groups", ALICE)["groups"], json!([EDITORS]));
    assert_eq!(one("user", "id,groups", BOB)["groups"], json!([]));
}

#[test]
fn aggregate_fields_only_when_named() {
    let page = one("page", "id,commentCount,watchCount,lastCommentId,lastRevisionId", PUBLIC_PAGE);
    assert_eq!(page["commentCount"], json!(2));
    assert_eq!(page["watchCount"], json!(2));
    assert_eq!(page["lastCommentId"], json!(2));
    assert_eq!(page["lastRevisionId"], json!(2));
    let empty = one("module", "id,commentCount,lastCommentId", MODULE);
    assert_eq!(empty["commentCount"], json!(0));
    assert_eq!(empty["lastCommentId"], Value::Null);

    let star = one("page", "*", PUBLIC_PAGE);
    let mut keys: Vec<&str> = star.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(
        keys,
        vec!["contentType", "createDate", "createUserId", "deleted", "id", "internalType", "name", "parentId", "text"]
    );
}

#[test]
fn users_expose_registration_but_no_secrets() {
    let admin = one("user", "*", ADMIN);
    assert_eq!(admin["registered"], json!(1));
    assert!(!admin.contains_key("email"));
    assert!(!admin.contains_key("password"));
    assert_eq!(one("user", "~username", BOB)["registered"], json!(0));
}

#[test]
fn macros_against_side_tables() {
    let searcher = searcher();
    let batch = SearchRequests::new(vec![
        SearchRequest::new("content").named("tagged").fields("id").query("!keywordlike(@kw)"),
        SearchRequest::new("content").named("blue").fields("id").query("!valuelike(@key, @value)"),
        SearchRequest::new("content").named("typed").fields("id").query("!notnull(contentType)"),
        SearchRequest::new("content").named("untyped").fields("id").query("!null(contentType) and !notdeleted()"),
        SearchRequest::new("ban").named("bans").fields("id,bannedUserId").query("!activebans()"),
    ])
    .with_value("kw", json!("wel%"))
    .with_value("key", json!("color"))
    .with_value("value", json!("%blue%"));
    let bag = searcher.search(&batch, ADMIN).expect("search");
    assert_eq!(ids(bag.rows("tagged").expect("tagged"), "id"), vec![PUBLIC_PAGE]);
    assert_eq!(ids(bag.rows("blue").expect("blue"), "id"), vec![PUBLIC_PAGE]);
    assert_eq!(ids(bag.rows("typed").expect("typed"), "id"), vec![ALICE_FILE]);
    assert_eq!(ids(bag.rows("untyped").expect("untyped"), "id"), vec![5, 6, 9]);
    assert_eq!(ids(bag.rows("bans").expect("bans"), "bannedUserId"), vec![BOB]);
}

#[test]
fn ordering_by_field() {
    let batch = SearchRequests::new(vec![
        SearchRequest::new("content").named("byname").fields("id").order("name"),
        SearchRequest::new("content").named("newest").fields("id").order("createDate_desc").limit(2),
        SearchRequest::new("page").named("busiest").fields("id").order("commentCount_desc").limit(1),
    ]);
    let bag = searcher().search(&batch, ADMIN).expect("search");
    // Avatar, Chat, Editorial, Gone, Welcome
    assert_eq!(ids(bag.rows("byname").expect("byname"), "id"), vec![7, 9, 6, 8, 5]);
    assert_eq!(ids(bag.rows("newest").expect("newest"), "id"), vec![9, 8]);
    assert_eq!(ids(bag.rows("busiest").expect("busiest"), "id"), vec![PUBLIC_PAGE]);
}
