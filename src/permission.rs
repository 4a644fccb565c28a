//! Row-level read permissions.
//!
//! Permission checks are not written per type. The injector rewrites each
//! request of a governed type so it also requires a read grant for one of the
//! requester's groups, and each private type so only the owner's rows match.
//! The rewrite happens on a copy of the batch before compilation and lands in
//! the request's `restriction`, which the compiler parses apart from the
//! caller's query and ANDs in as its own condition.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SearchError};
use crate::registry::{OtherHasher, TypeRegistry};
use crate::request::SearchRequests;

/// The identity standing for "everyone" in permission grants.
pub const EVERYONE: i64 = 0;
pub const READ: char = 'R';

/// Identity id to the capability letters (`C`, `R`, `U`, `D`) it holds.
pub type PermissionMap = BTreeMap<i64, String>;

// ------------- Requester -------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Requester {
    pub id: i64,
    pub groups: Vec<i64>,
    /// Super users see everything governed by permissions.
    pub elevated: bool,
}

impl Requester {
    pub fn anonymous() -> Self {
        Self::default()
    }
    /// Every identity whose grants apply to this requester.
    pub fn group_set(&self) -> BTreeSet<i64> {
        let mut set: BTreeSet<i64> = self.groups.iter().copied().collect();
        set.insert(EVERYONE);
        set.insert(self.id);
        set
    }
    pub fn can(&self, permissions: &PermissionMap, capability: char) -> bool {
        let capability = capability.to_ascii_uppercase();
        self.group_set().iter().any(|id| {
            permissions
                .get(id)
                .is_some_and(|caps| caps.chars().any(|c| c.to_ascii_uppercase() == capability))
        })
    }
}

// ------------- System keys -------------
static NEXT_BATCH: AtomicU64 = AtomicU64::new(1);

/// Pool keys the engine adds on its own behalf. Every batch gets a fresh
/// prefix so concurrent batches never share names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemKeys {
    pub prefix: String,
    pub requester: String,
    pub groups: String,
}

impl SystemKeys {
    pub fn next() -> Self {
        let prefix = format!("_sys{}", NEXT_BATCH.fetch_add(1, Ordering::Relaxed));
        Self {
            requester: format!("{prefix}_requester"),
            groups: format!("{prefix}_groups"),
            prefix,
        }
    }
}

// ------------- Injection -------------
/// Returns the batch with permission clauses added to every request that
/// needs them, and the requester's system keys added to its values.
pub fn restrict(
    batch: &SearchRequests,
    requester: &Requester,
    keys: &SystemKeys,
    registry: &TypeRegistry,
) -> Result<SearchRequests> {
    let mut restricted = batch.clone();
    for key in [&keys.requester, &keys.groups] {
        if restricted.values.contains_key(key.as_str()) {
            return Err(SearchError::ParameterConflict(key.clone()));
        }
    }
    restricted.values.insert(keys.requester.clone(), Value::from(requester.id));
    restricted.values.insert(
        keys.groups.clone(),
        Value::Array(requester.group_set().into_iter().map(Value::from).collect()),
    );

    for request in restricted.requests.iter_mut() {
        let access = registry.resolve(&request.type_name)?.access();
        if access.elevated_only && !requester.elevated {
            return Err(SearchError::ForbiddenAccess(format!(
                "{} is only searchable by super users",
                request.type_name
            )));
        }
        let mut clauses = Vec::new();
        if let Some(field) = access.governed_by {
            if !requester.elevated {
                clauses.push(format!("!permissionlimit(@{}, {field}, {READ})", keys.groups));
            }
        }
        if let Some(owner) = access.owner {
            clauses.push(format!("{owner} = @{}", keys.requester));
        }
        request.restriction = clauses.join(" and ");
    }
    Ok(restricted)
}

// ------------- Cache -------------
/// Permission maps of content rows, trusted for a bounded time.
pub struct PermissionCache {
    freshness: TimeDelta,
    enabled: bool,
    kept: Mutex<HashMap<i64, (DateTime<Utc>, PermissionMap), OtherHasher>>,
}

impl PermissionCache {
    pub fn new(seconds: u64) -> Self {
        let freshness = i64::try_from(seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self { freshness, enabled: seconds > 0, kept: Mutex::new(HashMap::default()) }
    }
    pub fn get(&self, content_id: i64) -> Option<PermissionMap> {
        if !self.enabled {
            return None;
        }
        let kept = self.kept.lock().ok()?;
        let (stamp, map) = kept.get(&content_id)?;
        (Utc::now() - *stamp <= self.freshness).then(|| map.clone())
    }
    pub fn put(&self, content_id: i64, map: &PermissionMap) {
        if !self.enabled {
            return;
        }
        if let Ok(mut kept) = self.kept.lock() {
            kept.insert(content_id, (Utc::now(), map.clone()));
        }
    }
    pub fn invalidate(&self, content_id: i64) {
        if let Ok(mut kept) = self.kept.lock() {
            kept.remove(&content_id);
        }
    }
    pub fn len(&self) -> usize {
        self.kept.lock().map(|k| k.len()).unwrap_or(0)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
