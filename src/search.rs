//! The execution engine.
//!
//! A batch runs on one pooled connection, strictly in order. Each request is
//! compiled against the parameter pool as it stands, executed, augmented with
//! its extra fields, and then added to the pool so later requests can refer
//! to its rows. Any failure aborts the whole batch; partial results are never
//! handed back.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::compiler::{compile, CompileContext};
use crate::config::SearcherConfig;
use crate::datatype::{ResultSet, Row};
use crate::error::{Result, SearchError};
use crate::extras;
use crate::interface::CancelToken;
use crate::permission::{restrict, PermissionCache, PermissionMap, Requester, SystemKeys, EVERYONE, READ};
use crate::persist::{PooledConnection, Store};
use crate::registry::{self, TypeRegistry};
use crate::request::{ParameterPool, ResultBag, SearchRequest, SearchRequests};

pub struct Searcher {
    store: Arc<Store>,
    registry: &'static TypeRegistry,
    config: SearcherConfig,
    cache: PermissionCache,
}

impl Searcher {
    pub fn new(store: Arc<Store>, config: SearcherConfig) -> Self {
        Self::with_registry(store, registry::standard(), config)
    }
    pub fn with_registry(store: Arc<Store>, registry: &'static TypeRegistry, config: SearcherConfig) -> Self {
        let cache = PermissionCache::new(config.permission_cache_seconds);
        Self { store, registry, config, cache }
    }
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
    pub fn registry(&self) -> &'static TypeRegistry {
        self.registry
    }
    pub fn config(&self) -> &SearcherConfig {
        &self.config
    }

    /// Runs a batch on behalf of a user, with permissions enforced.
    pub fn search(&self, batch: &SearchRequests, requester_id: i64) -> Result<ResultBag> {
        self.search_with_cancel(batch, requester_id, &CancelToken::new())
    }

    pub fn search_with_cancel(
        &self,
        batch: &SearchRequests,
        requester_id: i64,
        cancel: &CancelToken,
    ) -> Result<ResultBag> {
        batch.check_names()?;
        let connection = self.store.borrow()?;
        let requester = self.requester(&connection, requester_id).inspect_err(|e| {
            warn!(requester = requester_id, error = %e, "could not resolve requester");
        })?;
        let keys = SystemKeys::next();
        let restricted = restrict(batch, &requester, &keys, self.registry)
            .and_then(|restricted| restricted.check_conflicts().map(|_| restricted))
            .inspect_err(|e| warn!(requester = requester_id, error = %e, "search batch rejected"))?;
        self.execute(&connection, &restricted, &keys.prefix, cancel)
    }

    /// Runs a batch with no permission rewriting. Only for trusted callers
    /// inside the process, never for anything a user sent.
    pub fn search_unrestricted(&self, batch: &SearchRequests) -> Result<ResultBag> {
        batch.check_names()?;
        batch.check_conflicts()?;
        let connection = self.store.borrow()?;
        let keys = SystemKeys::next();
        self.execute(&connection, batch, &keys.prefix, &CancelToken::new())
    }

    /// A single row of any type, unrestricted.
    pub fn get_by_id(&self, type_name: &str, id: i64) -> Result<Row> {
        let connection = self.store.borrow()?;
        self.row_by_id(&connection, type_name, id, "*")
    }

    /// The permission map governing visibility of one row.
    pub fn permissions_for(&self, type_name: &str, id: i64) -> Result<PermissionMap> {
        let info = self.registry.resolve(type_name)?;
        let access = info.access();
        let connection = self.store.borrow()?;
        if access.elevated_only {
            self.row_by_id(&connection, type_name, id, "id")?;
            return Ok(PermissionMap::new());
        }
        if let Some(owner) = access.owner {
            let row = self.row_by_id(&connection, type_name, id, owner)?;
            let mut map = PermissionMap::new();
            if let Some(owner) = row.get(owner).and_then(Value::as_i64) {
                map.insert(owner, READ.to_string());
            }
            return Ok(map);
        }
        match access.governed_by {
            Some(field) => {
                let row = self.row_by_id(&connection, type_name, id, field)?;
                let content_id = row.get(field).and_then(Value::as_i64).unwrap_or(0);
                self.content_permissions(&connection, content_id)
            }
            None => Ok(PermissionMap::from([(EVERYONE, READ.to_string())])),
        }
    }

    /// Drops the cached permissions of a content row after it changed.
    pub fn invalidate(&self, content_id: i64) {
        self.cache.invalidate(content_id);
    }

    pub fn cached_permissions(&self) -> usize {
        self.cache.len()
    }

    fn content_permissions(&self, connection: &PooledConnection, content_id: i64) -> Result<PermissionMap> {
        if let Some(map) = self.cache.get(content_id) {
            debug!(content = content_id, "permission cache hit");
            return Ok(map);
        }
        let ids = u64::try_from(content_id).into_iter().collect();
        let map = extras::permission_maps(connection, &ids)?.remove(&content_id).unwrap_or_default();
        self.cache.put(content_id, &map);
        Ok(map)
    }

    fn row_by_id(&self, connection: &PooledConnection, type_name: &str, id: i64, fields: &str) -> Result<Row> {
        let batch = SearchRequests::new(vec![
            SearchRequest::new(type_name).named("row").fields(fields).query("id = @id").limit(1),
        ])
        .with_value("id", Value::from(id));
        let mut bag = self
            .execute(connection, &batch, &SystemKeys::next().prefix, &CancelToken::new())
            .map_err(|e| match e {
                SearchError::InRequest { source, .. } => *source,
                other => other,
            })?;
        bag.data
            .remove("row")
            .and_then(|rows| rows.into_iter().next())
            .ok_or_else(|| SearchError::NotFound { type_name: type_name.to_string(), id })
    }

    fn requester(&self, connection: &PooledConnection, id: i64) -> Result<Requester> {
        if id == 0 {
            return Ok(Requester::anonymous());
        }
        if id < 0 {
            return Err(SearchError::UnknownRequester(id));
        }
        let user = match self.row_by_id(connection, "user", id, "id,super,groups") {
            Err(SearchError::NotFound { .. }) => return Err(SearchError::UnknownRequester(id)),
            other => other?,
        };
        let elevated = match user.get("super") {
            Some(Value::Bool(flag)) => *flag,
            Some(value) => value.as_i64().unwrap_or(0) != 0,
            None => false,
        };
        let groups = user
            .get("groups")
            .and_then(Value::as_array)
            .map(|groups| groups.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();
        Ok(Requester { id, groups, elevated })
    }

    fn execute(
        &self,
        connection: &PooledConnection,
        batch: &SearchRequests,
        prefix: &str,
        cancel: &CancelToken,
    ) -> Result<ResultBag> {
        let started = Instant::now();
        let mut pool = ParameterPool::new(&batch.values);
        let mut bag = ResultBag::default();
        for request in &batch.requests {
            let name = request.result_name();
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled(name.to_string()));
            }
            let rows = self
                .run(connection, request, &pool, prefix, &mut bag)
                .and_then(|rows| pool.insert_rows(name, &rows).map(|_| rows))
                .map_err(|e| SearchError::in_request(name, e))?;
            bag.data.insert(name.to_string(), rows);
        }
        info!(
            requests = batch.requests.len(),
            rows = bag.data.values().map(Vec::len).sum::<usize>(),
            elapsed_ms = millis(started),
            "search batch completed"
        );
        Ok(bag)
    }

    fn run(
        &self,
        connection: &PooledConnection,
        request: &SearchRequest,
        pool: &ParameterPool,
        prefix: &str,
        bag: &mut ResultBag,
    ) -> Result<ResultSet> {
        let name = request.result_name();
        let context = CompileContext {
            registry: self.registry,
            pool,
            prefix,
            max_limit: self.config.max_individual_result_set,
        };
        let compiled = compile(request, &context)?;
        debug!(request = name, type_name = compiled.type_name, sql = %compiled.sql, "compiled search");

        let started = Instant::now();
        let mut rows = connection.query_rows(&compiled.sql, &compiled.bindings())?;
        bag.database_times.insert(name.to_string(), millis(started));

        let started = Instant::now();
        extras::augment(connection, &mut rows, &compiled.extras)?;
        if compiled.hidden_id {
            for row in rows.iter_mut() {
                row.remove("id");
            }
        }
        bag.database_times.insert(format!("{name}_extras"), millis(started));
        Ok(rows)
    }
}

fn millis(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
