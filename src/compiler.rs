//! Compilation of one [`SearchRequest`] into parameterized SQL.
//!
//! The compiler only ever writes SQL from registry descriptors and the parsed
//! [`Expr`] tree; caller-supplied values reach SQLite exclusively as bound
//! parameters. Lists (including fields gathered from earlier results) are
//! bound as JSON text and unpacked with `json_each`, so any set size maps to
//! a single parameter.

use std::collections::{BTreeMap, HashSet};

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use crate::datatype::{is_scalar, to_sql};
use crate::error::{Result, SearchError};
use crate::macros;
use crate::parser::{parse, Expr, Operand, ValueRef};
use crate::registry::{ExtraKind, FieldDescriptor, OtherHasher, TypeInfo, TypeRegistry};
use crate::request::{ParameterPool, SearchRequest};

pub const DESCENDING_SUFFIX: &str = "_desc";

/// Everything a compilation may look at besides the request itself.
pub struct CompileContext<'a> {
    pub registry: &'a TypeRegistry,
    pub pool: &'a ParameterPool,
    /// Prefix for parameters the compiler introduces; unique per batch.
    pub prefix: &'a str,
    pub max_limit: i64,
}

#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub type_name: &'static str,
    pub sql: String,
    /// Bound values by parameter name (without the `@`).
    pub parameters: BTreeMap<String, Value>,
    /// Requested fields, in request order.
    pub fields: Vec<&'static str>,
    /// Requested fields the extra-field resolver has to fill in.
    pub extras: Vec<(&'static str, ExtraKind)>,
    /// `id` was only selected so extras can be matched back to rows.
    pub hidden_id: bool,
    pub limit: i64,
    pub skip: i64,
}

impl CompiledQuery {
    /// Parameters in the form the store binds them: `@name` and SQLite values.
    pub fn bindings(&self) -> Vec<(String, SqlValue)> {
        self.parameters
            .iter()
            .map(|(name, value)| (format!("@{name}"), to_sql(value)))
            .collect()
    }
}

pub fn compile(request: &SearchRequest, context: &CompileContext) -> Result<CompiledQuery> {
    let info = context.registry.resolve(&request.type_name)?;
    let fields = resolve_fields(info, &request.fields)?;
    let order = order_clause(info, &request.order)?;
    let limit = if request.limit <= 0 { context.max_limit } else { request.limit.min(context.max_limit) };
    let skip = request.skip.max(0);

    let mut emitter = Emitter::new(info, context);
    let mut filters = Vec::new();
    for text in [&request.query, &request.restriction] {
        if let Some(expr) = parse(text)? {
            filters.push(emitter.expr(&expr)?);
        }
    }

    let mut columns = Vec::new();
    let mut extras = Vec::new();
    for field in &fields {
        match (field.sql(), field.extra()) {
            (Some(sql), _) => columns.push(format!("{sql} AS \"{}\"", field.name())),
            (None, Some(kind)) => extras.push((field.name(), kind)),
            (None, None) => return Err(info.unknown_field(field.name())),
        }
    }
    let hidden_id = !extras.is_empty() && !fields.iter().any(|f| f.name() == "id");
    if hidden_id {
        let id = info.selectable_field("id")?;
        let sql = id.sql().ok_or_else(|| info.unknown_field("id"))?;
        columns.push(format!("{sql} AS \"id\""));
    }
    if columns.is_empty() {
        return Err(SearchError::InvalidQuery(format!("no fields selected for {}", info.name())));
    }

    let mut conditions = Vec::new();
    if let Some(restriction) = info.restriction() {
        conditions.push(restriction.to_string());
    }
    conditions.extend(filters.into_iter().map(|filter| format!("({filter})")));
    let mut sql = format!("SELECT {} FROM {} AS main", columns.join(", "), info.table());
    if !conditions.is_empty() {
        sql += &format!(" WHERE {}", conditions.join(" AND "));
    }
    sql += &format!(" ORDER BY {order} LIMIT {limit} OFFSET {skip}");

    Ok(CompiledQuery {
        type_name: info.name(),
        sql,
        parameters: emitter.parameters,
        fields: fields.iter().map(|f| f.name()).collect(),
        extras,
        hidden_id,
        limit,
        skip,
    })
}

/// Expands `*`, `~a,b` and explicit field lists against the type.
pub fn resolve_fields<'t>(info: &'t TypeInfo, fields: &str) -> Result<Vec<&'t FieldDescriptor>> {
    let fields = fields.trim();
    let mut resolved: Vec<&FieldDescriptor> = Vec::new();
    if let Some(excluded) = fields.strip_prefix('~') {
        let mut skip = Vec::new();
        for name in split_list(excluded) {
            skip.push(info.selectable_field(name)?.name());
        }
        resolved.extend(info.default_fields().filter(|f| !skip.contains(&f.name())));
    } else if fields.is_empty() {
        resolved.extend(info.default_fields());
    } else {
        for name in split_list(fields) {
            if name == "*" {
                resolved.extend(info.default_fields());
            } else {
                resolved.push(info.selectable_field(name)?);
            }
        }
    }
    let mut seen = Vec::new();
    resolved.retain(|f| {
        let first = !seen.contains(&f.name());
        seen.push(f.name());
        first
    });
    Ok(resolved)
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|x| !x.is_empty())
}

fn order_clause(info: &TypeInfo, order: &str) -> Result<String> {
    let order = order.trim();
    let (name, direction) = match order.strip_suffix(DESCENDING_SUFFIX) {
        Some(name) => (name, "DESC"),
        None if order.is_empty() => (info.natural_order(), "ASC"),
        None => (order, "ASC"),
    };
    let field = info
        .field(name)
        .filter(|f| f.queryable())
        .and_then(|f| f.sql().map(|sql| (f.name(), sql)));
    let Some((name, sql)) = field else {
        return Err(SearchError::InvalidSort { type_name: info.name().to_string(), field: order.to_string() });
    };
    let mut clause = format!("{sql} {direction}");
    if name != "id" {
        if let Some(id) = info.field("id").and_then(FieldDescriptor::sql) {
            clause += &format!(", {id} ASC");
        }
    }
    Ok(clause)
}

// ------------- Emitter -------------
/// Writes SQL for an expression tree, collecting the parameters it binds.
pub(crate) struct Emitter<'a> {
    pub(crate) info: &'a TypeInfo,
    context: &'a CompileContext<'a>,
    parameters: BTreeMap<String, Value>,
    derived: usize,
}

impl<'a> Emitter<'a> {
    fn new(info: &'a TypeInfo, context: &'a CompileContext<'a>) -> Self {
        Self { info, context, parameters: BTreeMap::new(), derived: 0 }
    }

    fn expr(&mut self, expr: &Expr) -> Result<String> {
        Ok(match expr {
            Expr::Or(terms) => format!("({})", self.join(terms, " OR ")?),
            Expr::And(terms) => format!("({})", self.join(terms, " AND ")?),
            Expr::Not(inner) => format!("NOT ({})", self.expr(inner)?),
            Expr::Bool(true) => "(1 = 1)".to_string(),
            Expr::Bool(false) => "(1 = 0)".to_string(),
            Expr::Compare { left, comparator, right } => {
                format!("{} {} {}", self.operand(left)?, comparator.sql(), self.operand(right)?)
            }
            Expr::In { field, negated, source } => {
                let not = if *negated { "NOT " } else { "" };
                format!("{} {not}IN {}", self.field(field)?, self.list(source)?)
            }
            Expr::Macro { name, args } => macros::expand(self, name, args)?,
        })
    }

    fn join(&mut self, terms: &[Expr], separator: &str) -> Result<String> {
        let mut parts = Vec::new();
        for term in terms {
            parts.push(self.expr(term)?);
        }
        Ok(parts.join(separator))
    }

    fn operand(&mut self, operand: &Operand) -> Result<String> {
        match operand {
            Operand::Field(name) => self.field(name),
            Operand::Value(reference) => self.scalar(reference),
        }
    }

    /// SQL for a searchable field of the current type.
    pub(crate) fn field(&self, name: &str) -> Result<String> {
        let field = self.info.queryable_field(name)?;
        field.sql().ok_or_else(|| self.info.unknown_field(name))
    }

    /// Placeholder for a single value.
    pub(crate) fn scalar(&mut self, reference: &ValueRef) -> Result<String> {
        let value = self.resolve(reference)?;
        if !is_scalar(&value) {
            return Err(SearchError::InvalidQuery(format!(
                "{reference} holds a list; compare it with IN instead"
            )));
        }
        self.bind(reference, value)
    }

    /// A sub-select yielding every value of a list (a lone scalar counts as
    /// a list of one).
    pub(crate) fn list(&mut self, reference: &ValueRef) -> Result<String> {
        let value = self.resolve(reference)?;
        match &value {
            Value::Array(items) if items.iter().all(is_scalar) => {
                Ok(format!("(SELECT value FROM json_each({}))", self.bind(reference, value)?))
            }
            Value::Array(_) => Err(SearchError::InvalidQuery(format!(
                "{reference} is a result set; name one of its fields, like {reference}.id"
            ))),
            Value::Object(_) => Err(SearchError::InvalidQuery(format!(
                "{reference} is an object; name one of its fields"
            ))),
            _ => Ok(format!("({})", self.bind(reference, value)?)),
        }
    }

    /// Introduces a new parameter that is not in the pool.
    pub(crate) fn derive(&mut self, value: Value) -> Result<String> {
        let name = format!("{}_d{}", self.context.prefix, self.derived);
        self.derived += 1;
        if self.context.pool.contains(&name) || self.parameters.contains_key(&name) {
            return Err(SearchError::ParameterConflict(name));
        }
        self.parameters.insert(name.clone(), value);
        Ok(format!("@{name}"))
    }

    fn bind(&mut self, reference: &ValueRef, value: Value) -> Result<String> {
        match reference.field {
            None => {
                self.parameters.insert(reference.name.clone(), value);
                Ok(format!("@{}", reference.name))
            }
            Some(_) => self.derive(value),
        }
    }

    fn resolve(&self, reference: &ValueRef) -> Result<Value> {
        let base = self
            .context
            .pool
            .get(&reference.name)
            .ok_or_else(|| SearchError::UnknownReference(reference.name.clone()))?;
        let Some(field) = &reference.field else {
            return Ok(base.clone());
        };
        match base {
            Value::Array(rows) => {
                let mut found = false;
                let mut seen: HashSet<String, OtherHasher> = HashSet::default();
                let mut values: Vec<Value> = Vec::new();
                for row in rows {
                    if let Some(value) = row.as_object().and_then(|r| r.get(field)) {
                        found = true;
                        // first occurrence wins, in row order
                        if !value.is_null() && seen.insert(value.to_string()) {
                            values.push(value.clone());
                        }
                    }
                }
                if !found && !rows.is_empty() {
                    return Err(SearchError::InvalidQuery(format!(
                        "'{}' has no field '{field}'; select it in that request",
                        reference.name
                    )));
                }
                Ok(Value::Array(values))
            }
            Value::Object(object) => object
                .get(field)
                .cloned()
                .ok_or_else(|| SearchError::UnknownReference(reference.to_string())),
            _ => Err(SearchError::InvalidQuery(format!("{} is not a result set or object", reference.name))),
        }
    }
}
