// used for persistence
use rusqlite::{Connection, ToSql};
use rusqlite::types::Value as SqlValue;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use tracing::debug;

use crate::datatype::{from_sql, ResultSet, Row};
use crate::error::{Result, SearchError};

/// Where the store keeps its data.
#[derive(Debug, Clone)]
pub enum PersistenceMode {
    /// A private in-memory database; a single connection serves every call.
    InMemory,
    /// A database file shared by a pool of connections.
    File(String),
}

// ------------- Persistence -------------
/// The relational store searched by the engine. Connections are borrowed
/// for the duration of one search call and handed back on drop.
pub struct Store {
    idle: Mutex<Vec<Connection>>,
    returned: Condvar,
    queries: AtomicU64,
}

impl Store {
    pub fn new(mode: PersistenceMode, pool_size: usize) -> Result<Self> {
        let connections = match mode {
            PersistenceMode::InMemory => vec![Connection::open_in_memory()?],
            PersistenceMode::File(path) => {
                let mut connections = Vec::new();
                for _ in 0..pool_size.max(1) {
                    let connection = Connection::open(&path)?;
                    connection.busy_timeout(std::time::Duration::from_secs(5))?;
                    connections.push(connection);
                }
                connections
            }
        };
        Self::create_schema(&connections[0])?;
        Ok(Self::from_connections(connections))
    }
    /// Wraps connections supplied by the caller; the schema must already exist.
    pub fn from_connections(connections: Vec<Connection>) -> Self {
        Self {
            idle: Mutex::new(connections),
            returned: Condvar::new(),
            queries: AtomicU64::new(0),
        }
    }
    /// Blocks until a connection is idle.
    pub fn borrow(&self) -> Result<PooledConnection<'_>> {
        let mut idle = self.idle.lock().map_err(|e| SearchError::Lock(e.to_string()))?;
        loop {
            if let Some(connection) = idle.pop() {
                return Ok(PooledConnection { store: self, connection: ManuallyDrop::new(connection) });
            }
            idle = self.returned.wait(idle).map_err(|e| SearchError::Lock(e.to_string()))?;
        }
    }
    /// Number of search queries issued against this store so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn create_schema(connection: &Connection) -> Result<()> {
        // Column names follow the entity field names so the registry can map
        // them one to one. Booleans are integers, dates ISO-8601 text.
        connection.execute_batch(
            "
            create table if not exists users (
                id integer primary key,
                username text not null,
                avatar integer not null default 0,
                special text null,
                super integer not null default 0,
                type integer not null default 0,
                createDate text null,
                editDate text null,
                email text not null default '',
                password text not null default '',
                salt text not null default '',
                registrationKey text null,
                deleted integer not null default 0
            );
            create table if not exists user_relations (
                id integer primary key,
                type integer not null,
                userId integer not null,
                relatedId integer not null,
                createDate text null,
                createUserId integer not null default 0
            );
            create index if not exists user_relations_userId on user_relations (userId);
            create table if not exists user_variables (
                id integer primary key,
                userId integer not null,
                createDate text null,
                editDate text null,
                editCount integer not null default 0,
                key text not null,
                value text not null,
                constraint unique_user_variable unique (userId, key)
            );
            create table if not exists bans (
                id integer primary key,
                createDate text null,
                expireDate text null,
                createUserId integer not null,
                bannedUserId integer not null,
                message text null,
                type integer not null default 0
            );
            create table if not exists content (
                id integer primary key,
                deleted integer not null default 0,
                createUserId integer not null,
                createDate text null,
                internalType integer not null default 0,
                name text not null default '',
                parentId integer not null default 0,
                contentType text null,
                text text not null default ''
            );
            create index if not exists content_parentId on content (parentId);
            create table if not exists content_keywords (
                id integer primary key,
                contentId integer not null,
                value text not null
            );
            create index if not exists content_keywords_contentId on content_keywords (contentId);
            create table if not exists content_values (
                id integer primary key,
                contentId integer not null,
                key text not null,
                value text not null
            );
            create index if not exists content_values_contentId on content_values (contentId);
            create table if not exists content_permissions (
                id integer primary key,
                contentId integer not null,
                userId integer not null,
                \"create\" integer not null default 0,
                \"read\" integer not null default 0,
                \"update\" integer not null default 0,
                \"delete\" integer not null default 0,
                constraint unique_permission unique (contentId, userId)
            );
            create index if not exists content_permissions_userId on content_permissions (userId);
            create table if not exists content_votes (
                id integer primary key,
                contentId integer not null,
                userId integer not null,
                vote integer not null,
                createDate text null
            );
            create index if not exists content_votes_contentId on content_votes (contentId);
            create table if not exists content_watches (
                id integer primary key,
                contentId integer not null,
                userId integer not null,
                lastCommentId integer not null default 0,
                lastActivityId integer not null default 0,
                createDate text null,
                editDate text null
            );
            create table if not exists content_history (
                id integer primary key,
                contentId integer not null,
                action integer not null default 0,
                createDate text null,
                createUserId integer not null default 0
            );
            create table if not exists comments (
                id integer primary key,
                contentId integer not null,
                createUserId integer not null,
                createDate text null,
                text text not null default '',
                editDate text null,
                editUserId integer null,
                deleted integer not null default 0,
                module text null,
                receiveUserId integer not null default 0
            );
            create index if not exists comments_contentId on comments (contentId);
            create table if not exists admin_log (
                id integer primary key,
                type integer not null,
                text text null,
                createDate text null,
                initiator integer not null,
                target integer not null
            );
            ",
        )?;
        Ok(())
    }
}

/// A connection on loan from the [`Store`].
pub struct PooledConnection<'s> {
    store: &'s Store,
    connection: ManuallyDrop<Connection>,
}

impl PooledConnection<'_> {
    /// Runs one parameterized query and collects every row as a JSON object
    /// keyed by column name. Parameter names carry their `@` prefix.
    pub fn query_rows(&self, sql: &str, parameters: &[(String, SqlValue)]) -> Result<ResultSet> {
        self.store.queries.fetch_add(1, Ordering::SeqCst);
        let mut statement = self.prepare(sql)?;
        let columns: Vec<String> = statement.column_names().into_iter().map(String::from).collect();
        let named: Vec<(&str, &dyn ToSql)> = parameters
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect();
        let mut rows = statement.query(named.as_slice())?;
        let mut result = ResultSet::new();
        while let Some(row) = rows.next()? {
            let mut kept = Row::new();
            for (i, column) in columns.iter().enumerate() {
                kept.insert(column.clone(), from_sql(row.get_ref(i)?));
            }
            result.push(kept);
        }
        debug!(rows = result.len(), "query returned");
        Ok(result)
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;
    fn deref(&self) -> &Connection {
        &self.connection
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        // SAFETY: taken exactly once, and the field is never read again
        let connection = unsafe { ManuallyDrop::take(&mut self.connection) };
        if let Ok(mut idle) = self.store.idle.lock() {
            idle.push(connection);
            self.store.returned.notify_one();
        }
    }
}
