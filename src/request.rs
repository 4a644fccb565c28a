//! The batch model: requests coming in, the parameter pool threaded through
//! execution, and the result bag going out.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::datatype::ResultSet;
use crate::error::{Result, SearchError};
use crate::registry::OtherHasher;

// ------------- Requests -------------
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    /// Key of the result in the bag and the pool; the type name when empty.
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub fields: String,
    pub query: String,
    pub order: String,
    pub limit: i64,
    pub skip: i64,
    /// Filter added by the permission layer. Parsed on its own and ANDed
    /// with `query` as a separate tree, so nothing in `query` can reach it.
    #[serde(skip)]
    pub restriction: String,
}

impl SearchRequest {
    pub fn new(type_name: &str) -> Self {
        Self { type_name: type_name.to_string(), ..Default::default() }
    }
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
    pub fn fields(mut self, fields: &str) -> Self {
        self.fields = fields.to_string();
        self
    }
    pub fn query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self
    }
    pub fn order(mut self, order: &str) -> Self {
        self.order = order.to_string();
        self
    }
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = skip;
        self
    }
    /// The name results are stored under.
    pub fn result_name(&self) -> &str {
        if self.name.is_empty() { &self.type_name } else { &self.name }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequests {
    pub values: Map<String, Value>,
    pub requests: Vec<SearchRequest>,
}

impl SearchRequests {
    pub fn new(requests: Vec<SearchRequest>) -> Self {
        Self { values: Map::new(), requests }
    }
    pub fn with_value(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }
    /// Fails with `DuplicateName` on the first name used twice.
    pub fn check_names(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for request in &self.requests {
            if !seen.insert(request.result_name()) {
                return Err(SearchError::DuplicateName(request.result_name().to_string()));
            }
        }
        Ok(())
    }
    /// Fails with `ParameterConflict` when a request would shadow a value.
    pub fn check_conflicts(&self) -> Result<()> {
        match self.requests.iter().find(|r| self.values.contains_key(r.result_name())) {
            Some(request) => Err(SearchError::ParameterConflict(request.result_name().to_string())),
            None => Ok(()),
        }
    }
}

// ------------- Parameter pool -------------
/// Named values visible to the request being compiled: the batch values,
/// the system keys, and the rows of every request completed so far.
#[derive(Debug, Clone, Default)]
pub struct ParameterPool {
    kept: HashMap<String, Value, OtherHasher>,
}

impl ParameterPool {
    pub fn new(values: &Map<String, Value>) -> Self {
        let mut kept = HashMap::default();
        for (key, value) in values {
            kept.insert(key.clone(), value.clone());
        }
        Self { kept }
    }
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.kept.get(key)
    }
    pub fn contains(&self, key: &str) -> bool {
        self.kept.contains_key(key)
    }
    /// Adds a key that must not exist yet.
    pub fn insert(&mut self, key: &str, value: Value) -> Result<()> {
        if self.kept.contains_key(key) {
            return Err(SearchError::ParameterConflict(key.to_string()));
        }
        self.kept.insert(key.to_string(), value);
        Ok(())
    }
    pub fn insert_rows(&mut self, key: &str, rows: &ResultSet) -> Result<()> {
        self.insert(key, Value::Array(rows.iter().cloned().map(Value::Object).collect()))
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

// ------------- Results -------------
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultBag {
    pub data: BTreeMap<String, ResultSet>,
    /// Milliseconds per request, plus `<name>_extras` for the extra fields.
    #[serde(rename = "databaseTimes")]
    pub database_times: BTreeMap<String, f64>,
}

impl ResultBag {
    pub fn rows(&self, name: &str) -> Option<&ResultSet> {
        self.data.get(name)
    }
    /// The bag without its timings, for comparing two runs.
    pub fn without_times(&self) -> BTreeMap<String, ResultSet> {
        self.data.clone()
    }
}
