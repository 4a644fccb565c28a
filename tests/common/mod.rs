#![allow(dead_code)]

use std::sync::Arc;

use contentsearch::config::SearcherConfig;
use contentsearch::persist::{PersistenceMode, Store};
use contentsearch::search::Searcher;

pub const ADMIN: i64 = 1;
pub const ALICE: i64 = 2;
pub const BOB: i64 = 3;
pub const EDITORS: i64 = 10;

pub const PUBLIC_PAGE: i64 = 5;
pub const EDITORS_PAGE: i64 = 6;
pub const ALICE_FILE: i64 = 7;
pub const DELETED_PAGE: i64 = 8;
pub const MODULE: i64 = 9;

// Users 1-3 plus one group; five content rows with different grants.
pub const SEED: &str = r#"
    insert into users (id, username, super, type, createDate, registrationKey, email, password)
        values (1, 'admin', 1, 0, '2020-01-01T00:00:00', null, 'admin@example.com', 'secret');
    insert into users (id, username, super, type, createDate, registrationKey)
        values (2, 'alice', 0, 0, '2020-02-01T00:00:00', null);
    insert into users (id, username, super, type, createDate, registrationKey)
        values (3, 'bob', 0, 0, '2020-03-01T00:00:00', 'pending');
    insert into users (id, username, super, type, createDate)
        values (10, 'editors', 0, 1, '2020-01-02T00:00:00');
    insert into user_relations (type, userId, relatedId) values (1, 2, 10);

    insert into content (id, createUserId, createDate, internalType, name, parentId, contentType, text)
        values (5, 1, '2021-01-01T00:00:00', 1, 'Welcome', 0, null, 'hello');
    insert into content (id, createUserId, createDate, internalType, name, parentId, contentType, text)
        values (6, 1, '2021-01-02T00:00:00', 1, 'Editorial', 0, null, 'internal');
    insert into content (id, createUserId, createDate, internalType, name, parentId, contentType, text)
        values (7, 2, '2021-01-03T00:00:00', 2, 'Avatar', 5, 'image/png', '');
    insert into content (id, deleted, createUserId, createDate, internalType, name, parentId, text)
        values (8, 1, 1, '2021-01-04T00:00:00', 1, 'Gone', 0, '');
    insert into content (id, createUserId, createDate, internalType, name, parentId, text)
        values (9, 1, '2021-01-05T00:00:00', 3, 'Chat', 0, 'module code');

    insert into content_permissions (contentId, userId, "create", "read", "update", "delete") values (5, 0, 0, 1, 0, 0);
    insert into content_permissions (contentId, userId, "create", "read", "update", "delete") values (5, 1, 1, 1, 1, 1);
    insert into content_permissions (contentId, userId, "create", "read", "update", "delete") values (6, 10, 0, 1, 0, 0);
    insert into content_permissions (contentId, userId, "create", "read", "update", "delete") values (7, 2, 0, 1, 1, 0);
    insert into content_permissions (contentId, userId, "create", "read", "update", "delete") values (8, 0, 0, 1, 0, 0);
    insert into content_permissions (contentId, userId, "create", "read", "update", "delete") values (9, 0, 0, 1, 0, 0);

    insert into content_keywords (contentId, value) values (5, 'welcome');
    insert into content_keywords (contentId, value) values (5, 'intro');
    insert into content_keywords (contentId, value) values (6, 'internal');
    insert into content_values (contentId, key, value) values (5, 'color', '"blue"');
    insert into content_values (contentId, key, value) values (5, 'config', '{"a":1}');
    insert into content_values (contentId, key, value) values (5, 'plain', 'not json');
    insert into content_votes (contentId, userId, vote) values (5, 1, 1);
    insert into content_votes (contentId, userId, vote) values (5, 2, 2);
    insert into content_votes (contentId, userId, vote) values (5, 3, 2);
    insert into content_watches (id, contentId, userId) values (1, 5, 2);
    insert into content_watches (id, contentId, userId) values (2, 6, 2);
    insert into content_watches (id, contentId, userId) values (3, 5, 3);
    insert into content_history (id, contentId, action, createUserId) values (1, 5, 1, 1);
    insert into content_history (id, contentId, action, createUserId) values (2, 5, 2, 1);
    insert into content_history (id, contentId, action, createUserId) values (3, 6, 1, 1);

    insert into comments (id, contentId, createUserId, createDate, text) values (1, 5, 1, '2021-02-01T00:00:00', 'first');
    insert into comments (id, contentId, createUserId, createDate, text) values (2, 5, 2, '2021-02-02T00:00:00', 'second');
    insert into comments (id, contentId, createUserId, createDate, text) values (3, 6, 1, '2021-02-03T00:00:00', 'editors only');

    insert into user_variables (userId, key, value) values (2, 'theme', 'dark');
    insert into user_variables (userId, key, value) values (3, 'theme', 'light');
    insert into bans (id, createDate, expireDate, createUserId, bannedUserId, message) values (1, '2020-01-01T00:00:00', '2000-01-01T00:00:00', 1, 2, 'old');
    insert into bans (id, createDate, expireDate, createUserId, bannedUserId, message) values (2, '2020-01-01T00:00:00', '2999-01-01T00:00:00', 1, 3, 'current');
    insert into admin_log (id, type, text, createDate, initiator, target) values (1, 1, 'banned bob', '2020-01-01T00:00:00', 1, 3);
"#;

pub fn store() -> Arc<Store> {
    let store = Store::new(PersistenceMode::InMemory, 1).expect("store");
    store.borrow().expect("connection").execute_batch(SEED).expect("seed");
    Arc::new(store)
}

pub fn searcher() -> Searcher {
    Searcher::new(store(), SearcherConfig::default())
}

pub fn searcher_with(config: SearcherConfig) -> Searcher {
    Searcher::new(store(), config)
}

/// The integer `field` of every row, in row order.
pub fn ids(rows: &[serde_json::Map<String, serde_json::Value>], field: &str) -> Vec<i64> {
    rows.iter().filter_map(|r| r.get(field).and_then(|v| v.as_i64())).collect()
}
