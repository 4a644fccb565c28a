//! Contentsearch – a generic search engine for a content/user data model.
//!
//! Callers send a *batch* of named search requests. Each request names an
//! entity type, the fields it wants, a filter expression, an order, a limit
//! and a skip. Requests run in order, and a later request may refer to the
//! rows of an earlier one (`@pages.id`). The batch comes back as a result bag
//! keyed by request name.
//!
//! ## Modules
//! * [`registry`] – Descriptor table of every searchable type and its fields.
//! * [`parser`] – The filter language (grammar in `query.pest`) parsed to an expression tree.
//! * [`compiler`] / [`macros`] – Expression trees and requests compiled to parameterized SQL.
//! * [`permission`] – Requester context and the read-permission rewrite of a batch.
//! * [`extras`] – Batched lookups for list and map fields (keywords, values, votes...).
//! * [`search`] – The [`search::Searcher`] running batches end to end.
//! * [`interface`] – Background execution and cancellation of batches.
//! * [`persist`] – SQLite schema and connection pool.
//! * [`config`] – Settings read through the `config` crate.
//!
//! ## Query language
//! Filters combine comparisons (`=`, `<>`, `<`, `<=`, `>`, `>=`, `LIKE`),
//! `IN`/`NOT IN`, `AND`/`OR`/`NOT`, parentheses and macros such as
//! `!notdeleted()`. Values are never written inline: every value is a named
//! parameter from the batch (`@name`) or a field of an earlier result
//! (`@request.field`). A quoted string or number in the text is refused.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use contentsearch::persist::{PersistenceMode, Store};
//! use contentsearch::request::{SearchRequest, SearchRequests};
//! use contentsearch::search::Searcher;
//! use contentsearch::config::SearcherConfig;
//!
//! let store = Store::new(PersistenceMode::InMemory, 1).unwrap();
//! let searcher = Searcher::new(Arc::new(store), SearcherConfig::default());
//! let batch = SearchRequests::new(vec![SearchRequest::new("page").query("!notdeleted()")]);
//! let bag = searcher.search(&batch, 0).unwrap();
//! assert!(bag.rows("page").unwrap().is_empty());
//! ```

pub mod compiler;
pub mod config;
pub mod datatype;
pub mod error;
pub mod extras;
pub mod interface;
pub mod macros;
pub mod parser;
pub mod permission;
pub mod persist;
pub mod registry;
pub mod request;
pub mod search;
