//! Tier-2 fields: values that live in side tables and are fetched in one
//! batched query per field after the primary rows are known.

use std::collections::HashMap;

use roaring::RoaringTreemap;
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};

use crate::datatype::{row_id, ResultSet, Row};
use crate::error::Result;
use crate::macros::CAPABILITIES;
use crate::permission::PermissionMap;
use crate::persist::PooledConnection;
use crate::registry::{ExtraKind, RELATION_IN_GROUP, VOTE_KINDS};

const IDS: &str = "(SELECT value FROM json_each(@ids))";

/// Fills every requested tier-2 field on every row. Rows need their `id`.
pub fn augment(connection: &PooledConnection, rows: &mut ResultSet, extras: &[(&str, ExtraKind)]) -> Result<()> {
    if extras.is_empty() || rows.is_empty() {
        return Ok(());
    }
    let ids = collect_ids(rows);
    for (name, kind) in extras {
        let mut found = if ids.is_empty() { HashMap::new() } else { fetch(connection, *kind, &ids)? };
        for row in rows.iter_mut() {
            let value = row_id(row).and_then(|id| found.remove(&id)).unwrap_or_else(|| empty(*kind));
            row.insert(name.to_string(), value);
        }
    }
    Ok(())
}

/// Distinct non-negative row ids.
pub fn collect_ids(rows: &ResultSet) -> RoaringTreemap {
    rows.iter()
        .filter_map(row_id)
        .filter_map(|id| u64::try_from(id).ok())
        .collect()
}

/// Permission maps for the given content ids; ids without grants are absent.
pub fn permission_maps(connection: &PooledConnection, ids: &RoaringTreemap) -> Result<HashMap<i64, PermissionMap>> {
    let rows = connection.query_rows(
        &format!(
            "SELECT contentId AS id, userId, \"create\", \"read\", \"update\", \"delete\" \
             FROM content_permissions WHERE contentId IN {IDS} ORDER BY userId"
        ),
        &id_parameter(ids),
    )?;
    let mut maps: HashMap<i64, PermissionMap> = HashMap::new();
    for row in &rows {
        let (Some(id), Some(user)) = (row_id(row), row.get("userId").and_then(Value::as_i64)) else {
            continue;
        };
        maps.entry(id).or_default().insert(user, letters(row));
    }
    Ok(maps)
}

fn letters(row: &Row) -> String {
    CAPABILITIES
        .iter()
        .filter(|(_, column)| row.get(*column).and_then(Value::as_i64).unwrap_or(0) != 0)
        .map(|(letter, _)| *letter)
        .collect()
}

fn id_parameter(ids: &RoaringTreemap) -> Vec<(String, SqlValue)> {
    let list: Vec<u64> = ids.iter().collect();
    vec![("@ids".to_string(), SqlValue::Text(Value::from(list).to_string()))]
}

fn empty(kind: ExtraKind) -> Value {
    match kind {
        ExtraKind::Keywords | ExtraKind::Groups => Value::Array(Vec::new()),
        ExtraKind::Values | ExtraKind::Permissions => Value::Object(Map::new()),
        ExtraKind::Votes => Value::Object(
            VOTE_KINDS.iter().map(|(_, name)| (name.to_string(), Value::from(0))).collect(),
        ),
    }
}

fn fetch(connection: &PooledConnection, kind: ExtraKind, ids: &RoaringTreemap) -> Result<HashMap<i64, Value>> {
    let mut found: HashMap<i64, Value> = HashMap::new();
    match kind {
        ExtraKind::Permissions => {
            for (id, map) in permission_maps(connection, ids)? {
                let object = map.into_iter().map(|(user, caps)| (user.to_string(), Value::from(caps))).collect();
                found.insert(id, Value::Object(object));
            }
        }
        ExtraKind::Keywords => {
            let sql = format!("SELECT contentId AS id, value FROM content_keywords WHERE contentId IN {IDS} ORDER BY content_keywords.id");
            for row in connection.query_rows(&sql, &id_parameter(ids))? {
                if let (Some(id), Some(value)) = (row_id(&row), row.get("value")) {
                    push(&mut found, id, value.clone());
                }
            }
        }
        ExtraKind::Groups => {
            let sql = format!(
                "SELECT userId AS id, relatedId FROM user_relations \
                 WHERE type = {RELATION_IN_GROUP} AND userId IN {IDS} ORDER BY relatedId"
            );
            for row in connection.query_rows(&sql, &id_parameter(ids))? {
                if let (Some(id), Some(group)) = (row_id(&row), row.get("relatedId")) {
                    push(&mut found, id, group.clone());
                }
            }
        }
        ExtraKind::Values => {
            let sql = format!("SELECT contentId AS id, key, value FROM content_values WHERE contentId IN {IDS} ORDER BY content_values.id");
            for row in connection.query_rows(&sql, &id_parameter(ids))? {
                let (Some(id), Some(Value::String(key))) = (row_id(&row), row.get("key")) else {
                    continue;
                };
                // values holding JSON come back decoded
                let value = match row.get("value") {
                    Some(Value::String(text)) => serde_json::from_str(text).unwrap_or_else(|_| Value::from(text.as_str())),
                    other => other.cloned().unwrap_or(Value::Null),
                };
                if let Value::Object(map) = found.entry(id).or_insert_with(|| empty(kind)) {
                    map.insert(key.clone(), value);
                }
            }
        }
        ExtraKind::Votes => {
            let sql = format!(
                "SELECT contentId AS id, vote, COUNT(*) AS count FROM content_votes \
                 WHERE contentId IN {IDS} GROUP BY contentId, vote"
            );
            for row in connection.query_rows(&sql, &id_parameter(ids))? {
                let Some(id) = row_id(&row) else { continue };
                let vote = row.get("vote").and_then(Value::as_i64);
                let Some((_, name)) = VOTE_KINDS.iter().find(|(v, _)| Some(*v) == vote) else {
                    continue;
                };
                if let Value::Object(map) = found.entry(id).or_insert_with(|| empty(kind)) {
                    map.insert(name.to_string(), row.get("count").cloned().unwrap_or(Value::from(0)));
                }
            }
        }
    }
    Ok(found)
}

fn push(found: &mut HashMap<i64, Value>, id: i64, value: Value) {
    if let Value::Array(list) = found.entry(id).or_insert_with(|| Value::Array(Vec::new())) {
        list.push(value);
    }
}
