//! The type registry: one explicit descriptor table per logical entity.
//!
//! Every searchable entity (users, content and its subtypes, comments, ...)
//! is described by a [`TypeInfo`] naming its table, its fields and how rows
//! of that type are made visible to a requester. The compiler, the
//! permission injector and the extra-field resolver all work off these
//! descriptors, so adding an entity never needs type-specific search code.
//!
//! The standard registry is built once on first use and never mutated.

use std::collections::HashMap;
use std::hash::BuildHasherDefault;

use lazy_static::lazy_static;
use seahash::SeaHasher;
use serde::Serialize;

use crate::error::{Result, SearchError};

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

// ------------- Enumerations stored as integers -------------
pub const USER_TYPE_USER: i64 = 0;
pub const USER_TYPE_GROUP: i64 = 1;
pub const RELATION_IN_GROUP: i64 = 1;

pub const CONTENT_TYPE_PAGE: i64 = 1;
pub const CONTENT_TYPE_FILE: i64 = 2;
pub const CONTENT_TYPE_MODULE: i64 = 3;

/// Vote values and the names they are tallied under.
pub const VOTE_KINDS: [(i64, &str); 3] = [(1, "ok"), (2, "good"), (3, "bad")];

// ------------- Field -------------
/// Fields whose values come from a secondary, batched lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtraKind {
    Keywords,
    Values,
    Permissions,
    Votes,
    Groups,
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Column(&'static str),
    SubSelect(&'static str),
    Expression(&'static str),
    Lookup,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDescriptor {
    name: &'static str,
    #[serde(skip)]
    source: Source,
    selectable: bool,
    queryable: bool,
    writable: bool,
    tier: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra: Option<ExtraKind>,
}

impl FieldDescriptor {
    /// A plain column of the main table, selectable and searchable.
    pub const fn column(name: &'static str) -> Self {
        Self {
            name,
            source: Source::Column(name),
            selectable: true,
            queryable: true,
            writable: true,
            tier: 0,
            extra: None,
        }
    }
    /// A tier-0 value computed from columns of the same row.
    pub const fn expression(name: &'static str, sql: &'static str) -> Self {
        Self {
            name,
            source: Source::Expression(sql),
            selectable: true,
            queryable: true,
            writable: false,
            tier: 0,
            extra: None,
        }
    }
    /// A tier-1 value: a correlated sub-select against `main`.
    pub const fn sub_select(name: &'static str, sql: &'static str) -> Self {
        Self {
            name,
            source: Source::SubSelect(sql),
            selectable: true,
            queryable: true,
            writable: false,
            tier: 1,
            extra: None,
        }
    }
    /// A tier-2 value filled in by the extra-field resolver.
    pub const fn lookup(name: &'static str, kind: ExtraKind) -> Self {
        Self {
            name,
            source: Source::Lookup,
            selectable: true,
            queryable: false,
            writable: true,
            tier: 2,
            extra: Some(kind),
        }
    }
    pub const fn readonly(mut self) -> Self {
        self.writable = false;
        self
    }
    /// Stored, maybe writable, but never handed out nor searched on.
    pub const fn private(mut self) -> Self {
        self.selectable = false;
        self.queryable = false;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
    pub fn selectable(&self) -> bool {
        self.selectable
    }
    pub fn queryable(&self) -> bool {
        self.queryable
    }
    pub fn writable(&self) -> bool {
        self.writable
    }
    pub fn tier(&self) -> u8 {
        self.tier
    }
    pub fn extra(&self) -> Option<ExtraKind> {
        self.extra
    }
    /// The SQL expression for this field against the `main` alias, if the
    /// field lives in the primary query at all.
    pub fn sql(&self) -> Option<String> {
        match self.source {
            Source::Column(column) => Some(format!("main.\"{column}\"")),
            Source::SubSelect(sql) | Source::Expression(sql) => Some(format!("({sql})")),
            Source::Lookup => None,
        }
    }
}

// ------------- Access -------------
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Access {
    /// Field holding the content id whose permissions govern the row.
    pub governed_by: Option<&'static str>,
    /// Field holding the only identity allowed to see the row.
    pub owner: Option<&'static str>,
    pub elevated_only: bool,
}

// ------------- TypeInfo -------------
#[derive(Debug, Clone, Serialize)]
pub struct TypeInfo {
    name: &'static str,
    #[serde(skip)]
    table: &'static str,
    #[serde(skip)]
    restriction: Option<&'static str>,
    natural_order: &'static str,
    access: Access,
    fields: Vec<FieldDescriptor>,
}

impl TypeInfo {
    pub fn new(name: &'static str, table: &'static str, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name,
            table,
            restriction: None,
            natural_order: "id",
            access: Access::default(),
            fields,
        }
    }
    /// Limit the type to the rows of its table matching a fixed predicate.
    pub fn restricted(mut self, restriction: &'static str) -> Self {
        self.restriction = Some(restriction);
        self
    }
    pub fn governed_by(mut self, field: &'static str) -> Self {
        self.access.governed_by = Some(field);
        self
    }
    pub fn owned_by(mut self, field: &'static str) -> Self {
        self.access.owner = Some(field);
        self
    }
    pub fn elevated_only(mut self) -> Self {
        self.access.elevated_only = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
    pub fn table(&self) -> &'static str {
        self.table
    }
    pub fn restriction(&self) -> Option<&'static str> {
        self.restriction
    }
    pub fn natural_order(&self) -> &'static str {
        self.natural_order
    }
    pub fn access(&self) -> Access {
        self.access
    }
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
    pub fn is_permission_governed(&self) -> bool {
        self.access.governed_by.is_some()
    }
    /// True when rows are keyed by their own content id, i.e. the type
    /// carries the permission/value/keyword/vote side tables.
    pub fn is_content(&self) -> bool {
        self.access.governed_by == Some("id")
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
    pub fn selectable_field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.field(name)
            .filter(|f| f.selectable)
            .ok_or_else(|| self.unknown_field(name))
    }
    pub fn queryable_field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.field(name)
            .filter(|f| f.queryable)
            .ok_or_else(|| self.unknown_field(name))
    }
    /// What `*` expands to: every selectable tier-0 field.
    pub fn default_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.selectable && f.tier == 0)
    }
    pub fn unknown_field(&self, name: &str) -> SearchError {
        SearchError::UnknownField { type_name: self.name.to_string(), field: name.to_string() }
    }
}

// ------------- Registry -------------
#[derive(Debug)]
pub struct TypeRegistry {
    kept: HashMap<String, TypeInfo, OtherHasher>,
    order: Vec<&'static str>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            kept: HashMap::default(),
            order: Vec::new(),
        }
    }
    pub fn register(&mut self, info: TypeInfo) {
        if self.kept.insert(info.name.to_string(), info.clone()).is_none() {
            self.order.push(info.name);
        }
    }
    pub fn resolve(&self, type_name: &str) -> Result<&TypeInfo> {
        self.kept
            .get(type_name)
            .ok_or_else(|| SearchError::UnknownType(type_name.to_string()))
    }
    pub fn is_permission_governed(&self, type_name: &str) -> Result<bool> {
        Ok(self.resolve(type_name)?.is_permission_governed())
    }
    pub fn field_descriptor(&self, type_name: &str, field: &str) -> Result<&FieldDescriptor> {
        self.resolve(type_name)?.selectable_field(field)
    }
    pub fn types(&self) -> impl Iterator<Item = &TypeInfo> {
        self.order.iter().filter_map(|name| self.kept.get(*name))
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    /// A serializable description of every type, in registration order.
    pub fn about(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.types()
                .filter_map(|t| serde_json::to_value(t).ok())
                .collect(),
        )
    }

    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(
            TypeInfo::new("user", "users", vec![
                FieldDescriptor::column("id").readonly(),
                FieldDescriptor::column("username"),
                FieldDescriptor::column("avatar"),
                FieldDescriptor::column("special"),
                FieldDescriptor::column("super").readonly(),
                FieldDescriptor::column("type").readonly(),
                FieldDescriptor::column("createDate").readonly(),
                FieldDescriptor::column("editDate").readonly(),
                FieldDescriptor::column("deleted").readonly(),
                FieldDescriptor::expression("registered", "main.\"registrationKey\" IS NULL"),
                FieldDescriptor::column("email").private(),
                FieldDescriptor::lookup("groups", ExtraKind::Groups).readonly(),
            ]),
        );
        registry.register(TypeInfo::new("content", "content", content_fields()).governed_by("id"));
        registry.register(
            TypeInfo::new("page", "content", content_fields())
                .restricted("main.\"internalType\" = 1")
                .governed_by("id"),
        );
        registry.register(
            TypeInfo::new("file", "content", content_fields())
                .restricted("main.\"internalType\" = 2")
                .governed_by("id"),
        );
        registry.register(
            TypeInfo::new("module", "content", content_fields())
                .restricted("main.\"internalType\" = 3")
                .governed_by("id"),
        );
        registry.register(
            TypeInfo::new("comment", "comments", vec![
                FieldDescriptor::column("id").readonly(),
                FieldDescriptor::column("contentId"),
                FieldDescriptor::column("createUserId").readonly(),
                FieldDescriptor::column("createDate").readonly(),
                FieldDescriptor::column("text"),
                FieldDescriptor::column("editDate").readonly(),
                FieldDescriptor::column("editUserId").readonly(),
                FieldDescriptor::column("deleted").readonly(),
                FieldDescriptor::column("module").readonly(),
                FieldDescriptor::column("receiveUserId"),
            ])
            .governed_by("contentId"),
        );
        registry.register(
            TypeInfo::new("activity", "content_history", vec![
                FieldDescriptor::column("id").readonly(),
                FieldDescriptor::column("contentId").readonly(),
                FieldDescriptor::column("action").readonly(),
                FieldDescriptor::column("createDate").readonly(),
                FieldDescriptor::column("createUserId").readonly(),
            ])
            .governed_by("contentId"),
        );
        registry.register(
            TypeInfo::new("watch", "content_watches", vec![
                FieldDescriptor::column("id").readonly(),
                FieldDescriptor::column("contentId"),
                FieldDescriptor::column("userId").readonly(),
                FieldDescriptor::column("lastCommentId"),
                FieldDescriptor::column("lastActivityId"),
                FieldDescriptor::column("createDate").readonly(),
                FieldDescriptor::column("editDate").readonly(),
            ])
            .governed_by("contentId")
            .owned_by("userId"),
        );
        registry.register(
            TypeInfo::new("vote", "content_votes", vec![
                FieldDescriptor::column("id").readonly(),
                FieldDescriptor::column("contentId"),
                FieldDescriptor::column("userId").readonly(),
                FieldDescriptor::column("vote"),
                FieldDescriptor::column("createDate").readonly(),
            ])
            .governed_by("contentId"),
        );
        registry.register(
            TypeInfo::new("uservariable", "user_variables", vec![
                FieldDescriptor::column("id").readonly(),
                FieldDescriptor::column("userId").readonly(),
                FieldDescriptor::column("createDate").readonly(),
                FieldDescriptor::column("editDate").readonly(),
                FieldDescriptor::column("editCount").readonly(),
                FieldDescriptor::column("key"),
                FieldDescriptor::column("value"),
            ])
            .owned_by("userId"),
        );
        registry.register(TypeInfo::new("ban", "bans", vec![
            FieldDescriptor::column("id").readonly(),
            FieldDescriptor::column("createDate").readonly(),
            FieldDescriptor::column("expireDate"),
            FieldDescriptor::column("createUserId").readonly(),
            FieldDescriptor::column("bannedUserId"),
            FieldDescriptor::column("message"),
            FieldDescriptor::column("type"),
        ]));
        registry.register(
            TypeInfo::new("adminlog", "admin_log", vec![
                FieldDescriptor::column("id").readonly(),
                FieldDescriptor::column("type").readonly(),
                FieldDescriptor::column("text").readonly(),
                FieldDescriptor::column("createDate").readonly(),
                FieldDescriptor::column("initiator").readonly(),
                FieldDescriptor::column("target").readonly(),
            ])
            .elevated_only(),
        );
        registry
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// The comment sub-selects only count the "natural" stream: no deleted comments, no module messages.
fn content_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::column("id").readonly(),
        FieldDescriptor::column("deleted").readonly(),
        FieldDescriptor::column("createUserId").readonly(),
        FieldDescriptor::column("createDate").readonly(),
        FieldDescriptor::column("internalType").readonly(),
        FieldDescriptor::column("name"),
        FieldDescriptor::column("parentId"),
        FieldDescriptor::column("contentType"),
        FieldDescriptor::column("text"),
        FieldDescriptor::lookup("permissions", ExtraKind::Permissions),
        FieldDescriptor::lookup("values", ExtraKind::Values),
        FieldDescriptor::lookup("keywords", ExtraKind::Keywords),
        FieldDescriptor::lookup("votes", ExtraKind::Votes).readonly(),
        FieldDescriptor::sub_select("lastCommentId",
            "select id from comments where main.id = contentId and deleted = 0 and module is null order by id desc limit 1"),
        FieldDescriptor::sub_select("lastCommentDate",
            "select createDate from comments where main.id = contentId and deleted = 0 and module is null order by id desc limit 1"),
        FieldDescriptor::sub_select("commentCount",
            "select count(*) from comments where main.id = contentId and deleted = 0 and module is null"),
        FieldDescriptor::sub_select("watchCount",
            "select count(*) from content_watches where main.id = contentId"),
        FieldDescriptor::sub_select("lastRevisionId",
            "select id from content_history where main.id = contentId order by id desc limit 1"),
        FieldDescriptor::sub_select("lastRevisionDate",
            "select createDate from content_history where main.id = contentId order by id desc limit 1"),
    ]
}

lazy_static! {
    static ref STANDARD: TypeRegistry = TypeRegistry::standard();
}

/// The process-wide registry of standard entity types.
pub fn standard() -> &'static TypeRegistry {
    &STANDARD
}
