//! Query macros: `!name(args...)` calls expanded into SQL fragments.
//!
//! Macros are the only way to reach side tables (permissions, keywords,
//! values) from a query. Each one checks its own arity and argument kinds.

use serde_json::Value;

use crate::compiler::Emitter;
use crate::datatype::now_text;
use crate::error::{Result, SearchError};
use crate::parser::{MacroArg, ValueRef};

/// Capability letters in the order of the permission table columns.
pub const CAPABILITIES: [(char, &str); 4] = [('C', "create"), ('R', "read"), ('U', "update"), ('D', "delete")];

pub const MACROS: [&str; 7] =
    ["permissionlimit", "null", "notnull", "notdeleted", "activebans", "valuelike", "keywordlike"];

pub(crate) fn expand(emitter: &mut Emitter, name: &str, args: &[MacroArg]) -> Result<String> {
    match name {
        "permissionlimit" => {
            let [groups, field, caps] = arity::<3>(name, args)?;
            let groups = emitter.list(value(name, groups)?)?;
            let field = emitter.field(word(name, field)?)?;
            let mut checks = Vec::new();
            for letter in word(name, caps)?.chars() {
                let column = CAPABILITIES
                    .iter()
                    .find(|(c, _)| c.eq_ignore_ascii_case(&letter))
                    .map(|(_, column)| column)
                    .ok_or_else(|| SearchError::InvalidQuery(format!("unknown capability '{letter}' in !{name}")))?;
                checks.push(format!(" AND \"{column}\" = 1"));
            }
            Ok(format!(
                "{field} IN (SELECT contentId FROM content_permissions WHERE userId IN {groups}{})",
                checks.concat()
            ))
        }
        "null" | "notnull" => {
            let [field] = arity::<1>(name, args)?;
            let field = emitter.field(word(name, field)?)?;
            Ok(if name == "null" { format!("{field} IS NULL") } else { format!("{field} IS NOT NULL") })
        }
        "notdeleted" => {
            arity::<0>(name, args)?;
            Ok(format!("{} = 0", emitter.field("deleted")?))
        }
        "activebans" => {
            arity::<0>(name, args)?;
            let expire = emitter.field("expireDate")?;
            let now = emitter.derive(Value::String(now_text()))?;
            Ok(format!("{expire} > {now}"))
        }
        "valuelike" => {
            let [key, pattern] = arity::<2>(name, args)?;
            content_only(emitter, name)?;
            let key = emitter.scalar(value(name, key)?)?;
            let pattern = emitter.scalar(value(name, pattern)?)?;
            Ok(format!(
                "main.\"id\" IN (SELECT contentId FROM content_values WHERE key LIKE {key} AND value LIKE {pattern})"
            ))
        }
        "keywordlike" => {
            let [keyword] = arity::<1>(name, args)?;
            content_only(emitter, name)?;
            let keyword = emitter.scalar(value(name, keyword)?)?;
            Ok(format!("main.\"id\" IN (SELECT contentId FROM content_keywords WHERE value LIKE {keyword})"))
        }
        _ => Err(SearchError::InvalidQuery(format!("unknown macro !{name}"))),
    }
}

fn arity<'a, const N: usize>(name: &str, args: &'a [MacroArg]) -> Result<&'a [MacroArg; N]> {
    args.try_into().map_err(|_| {
        SearchError::InvalidQuery(format!("!{name} takes {N} argument(s), got {}", args.len()))
    })
}

fn value<'a>(name: &str, arg: &'a MacroArg) -> Result<&'a ValueRef> {
    match arg {
        MacroArg::Value(reference) => Ok(reference),
        MacroArg::Word(word) => Err(SearchError::InvalidQuery(format!("!{name} expects a @value, got '{word}'"))),
    }
}

fn word<'a>(name: &str, arg: &'a MacroArg) -> Result<&'a str> {
    match arg {
        MacroArg::Word(word) => Ok(word),
        MacroArg::Value(reference) => {
            Err(SearchError::InvalidQuery(format!("!{name} expects a name, got {reference}")))
        }
    }
}

fn content_only(emitter: &Emitter, name: &str) -> Result<()> {
    if emitter.info.is_content() {
        Ok(())
    } else {
        Err(SearchError::InvalidQuery(format!("!{name} only applies to content, not {}", emitter.info.name())))
    }
}
