//! Parsing of search query expressions into an [`Expr`] tree.
//!
//! Parsing happens in two passes. A character scan first rejects anything
//! that looks like an inline literal (quotes, numbers), which is what keeps
//! caller text out of the generated SQL. The pest grammar in `query.pest`
//! then builds the tree; SQL is only ever emitted from that tree.

use lazy_static::lazy_static;
use pest::Parser;
use pest::iterators::Pair;
use regex::Regex;
use std::fmt;

use crate::error::{Result, SearchError};

#[derive(pest_derive::Parser)]
#[grammar = "query.pest"]
struct QueryParser;

lazy_static! {
    // a quote of any kind, or a digit that begins a word
    static ref LITERAL: std::result::Result<Regex, regex::Error> = Regex::new(r#"['"`]|\b[0-9]"#);
}

// ------------- Expression tree -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Like,
}
impl Comparator {
    pub fn sql(&self) -> &'static str {
        match self {
            Comparator::Equal => "=",
            Comparator::NotEqual => "<>",
            Comparator::Less => "<",
            Comparator::LessEqual => "<=",
            Comparator::Greater => ">",
            Comparator::GreaterEqual => ">=",
            Comparator::Like => "LIKE",
        }
    }
}

/// `@name` or `@name.field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRef {
    pub name: String,
    pub field: Option<String>,
}
impl fmt::Display for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "@{}.{}", self.name, field),
            None => write!(f, "@{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Field(String),
    Value(ValueRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroArg {
    /// A bare word; the macro decides whether it names a field or a flag.
    Word(String),
    Value(ValueRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Not(Box<Expr>),
    Bool(bool),
    Compare { left: Operand, comparator: Comparator, right: Operand },
    In { field: String, negated: bool, source: ValueRef },
    Macro { name: String, args: Vec<MacroArg> },
}

/// Parses a query expression. An empty (or blank) query yields `None`.
pub fn parse(query: &str) -> Result<Option<Expr>> {
    reject_literals(query)?;
    let mut pairs = QueryParser::parse(Rule::query, query).map_err(|e| {
        let (line, col) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (l, c),
            pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        SearchError::Parse { message: e.variant.message().to_string(), line: Some(line), col: Some(col) }
    })?;
    let query = pairs.next().ok_or_else(|| invariant("empty parse"))?;
    match query.into_inner().find(|p| p.as_rule() == Rule::or_expr) {
        Some(expr) => Ok(Some(build(expr)?)),
        None => Ok(None),
    }
}

/// Refuses quoted strings and numbers anywhere in the text. Digits are
/// fine inside identifiers (`field2`), never at the start of a token.
pub fn reject_literals(query: &str) -> Result<()> {
    let pattern = LITERAL.as_ref().map_err(|e| SearchError::InvalidQuery(e.to_string()))?;
    if let Some(found) = pattern.find(query) {
        let literal: String = query[found.start()..]
            .chars()
            .take_while(|x| !x.is_whitespace() && *x != ')' && *x != ',')
            .collect();
        return Err(SearchError::UnsafeQuery { literal, col: query[..found.start()].chars().count() + 1 });
    }
    Ok(())
}

fn invariant(message: &str) -> SearchError {
    SearchError::Parse { message: message.to_string(), line: None, col: None }
}

fn build(pair: Pair<Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::or_expr => collapse(pair, Rule::and_expr, Expr::Or),
        Rule::and_expr => collapse(pair, Rule::not_expr, Expr::And),
        Rule::not_expr => {
            let mut negations = 0;
            let mut primary = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::negation => negations += 1,
                    _ => primary = Some(build(inner)?),
                }
            }
            let expr = primary.ok_or_else(|| invariant("missing expression after not"))?;
            Ok(if negations % 2 == 1 { Expr::Not(Box::new(expr)) } else { expr })
        }
        Rule::boolean => {
            let value = pair.into_inner().next().map(|p| p.as_rule() == Rule::kw_true);
            Ok(Expr::Bool(value.unwrap_or(false)))
        }
        Rule::comparison => {
            let mut inner = pair.into_inner();
            let left = inner.next().map(operand).ok_or_else(|| invariant("missing left operand"))?;
            let comparator = inner.next().map(comparator).ok_or_else(|| invariant("missing comparator"))??;
            let right = inner.next().map(operand).ok_or_else(|| invariant("missing right operand"))?;
            Ok(Expr::Compare { left, comparator, right })
        }
        Rule::membership => {
            let mut field = String::new();
            let mut negated = false;
            let mut source = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::field => field = inner.as_str().to_string(),
                    Rule::not_in => negated = true,
                    Rule::value_ref => source = Some(value_ref(inner)),
                    _ => (),
                }
            }
            let source = source.ok_or_else(|| invariant("missing reference after in"))?;
            Ok(Expr::In { field, negated, source })
        }
        Rule::macro_call => {
            let mut name = String::new();
            let mut args = Vec::new();
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::macro_name => name = inner.as_str().to_lowercase(),
                    Rule::value_ref => args.push(MacroArg::Value(value_ref(inner))),
                    Rule::word => args.push(MacroArg::Word(inner.as_str().to_string())),
                    _ => (),
                }
            }
            Ok(Expr::Macro { name, args })
        }
        rule => Err(invariant(&format!("unexpected {:?}", rule))),
    }
}

// Builds each child of the wanted rule and folds single children away.
fn collapse(pair: Pair<Rule>, child: Rule, combine: fn(Vec<Expr>) -> Expr) -> Result<Expr> {
    let mut terms = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == child {
            terms.push(build(inner)?);
        }
    }
    match terms.len() {
        0 => Err(invariant("empty expression")),
        1 => Ok(terms.remove(0)),
        _ => Ok(combine(terms)),
    }
}

fn operand(pair: Pair<Rule>) -> Operand {
    match pair.as_rule() {
        Rule::value_ref => Operand::Value(value_ref(pair)),
        _ => Operand::Field(pair.as_str().to_string()),
    }
}

fn comparator(pair: Pair<Rule>) -> Result<Comparator> {
    Ok(match pair.as_str().to_lowercase().as_str() {
        "=" => Comparator::Equal,
        "<>" | "!=" => Comparator::NotEqual,
        "<" => Comparator::Less,
        "<=" => Comparator::LessEqual,
        ">" => Comparator::Greater,
        ">=" => Comparator::GreaterEqual,
        "like" => Comparator::Like,
        other => return Err(invariant(&format!("unknown comparator {other}"))),
    })
}

fn value_ref(pair: Pair<Rule>) -> ValueRef {
    let mut name = String::new();
    let mut field = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ref_name => name = inner.as_str().to_string(),
            Rule::ref_field => field = Some(inner.as_str().to_string()),
            _ => (),
        }
    }
    ValueRef { name, field }
}
