//! Static expression front-end
//!
//! Alert `crit`/`warn`/`depends` expressions are parsed and type checked
//! when the configuration loads. Nothing is evaluated here; the result is
//! the set of tag keys the expression groups by and the type it returns,
//! which is all the alert binder needs to validate an alert.

mod funcs;
mod parse;

pub use funcs::{query_tags, Builtin, TagRule, BUILTINS};
pub use parse::{BinaryOp, Node, UnaryOp};

use crate::error::ExprError;
use crate::opentsdb::format_keys;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Tag keys an expression result is grouped by
pub type Tags = BTreeSet<String>;

/// Type of an expression value, ordered from least to most general
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Scalar,
    Number,
    Series,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::String => "string",
            ValueType::Scalar => "scalar",
            ValueType::Number => "number",
            ValueType::Series => "series",
        };
        write!(f, "{}", s)
    }
}

/// Source of lookup table tag keys for `lookup()` calls
pub trait TagSource {
    /// Tag keys of the named table, or `None` if there is no such table
    fn table_tags(&self, table: &str) -> Option<Tags>;
}

/// No tables at all
impl TagSource for () {
    fn table_tags(&self, _table: &str) -> Option<Tags> {
        None
    }
}

/// A parsed and checked expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    text: String,
    root: Node,
    tags: Tags,
    return_type: ValueType,
}

impl Expr {
    /// Parse and type check `text`
    ///
    /// # Errors
    /// Returns the first syntax or type error found.
    pub fn new(text: &str, tables: &dyn TagSource) -> Result<Self, ExprError> {
        let root = parse::parse(text)?;
        let (return_type, tags) = check(&root, tables)?;
        Ok(Self {
            text: text.to_string(),
            root,
            tags,
            return_type,
        })
    }

    /// Source text as written
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Tag keys of the result
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn return_type(&self) -> ValueType {
        self.return_type
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

fn check(node: &Node, tables: &dyn TagSource) -> Result<(ValueType, Tags), ExprError> {
    match node {
        Node::Number(_) => Ok((ValueType::Scalar, Tags::new())),
        Node::String(_) => Ok((ValueType::String, Tags::new())),
        Node::Unary { op, arg } => {
            let (t, tags) = check(arg, tables)?;
            if t == ValueType::String {
                return Err(ExprError::Operand {
                    op: op.symbol().to_string(),
                    operand: t,
                });
            }
            Ok((t, tags))
        }
        Node::Binary { op, left, right } => {
            let (lt, ltags) = check(left, tables)?;
            let (rt, rtags) = check(right, tables)?;
            for t in [lt, rt] {
                if t == ValueType::String {
                    return Err(ExprError::Operand {
                        op: op.symbol().to_string(),
                        operand: t,
                    });
                }
            }
            Ok((lt.max(rt), union_tags(ltags, rtags)?))
        }
        Node::Func { name, args, .. } => check_func(name, args, tables),
    }
}

/// Tags of a binary operation: the operands must group the same way or
/// one must group by a subset of the other's keys.
fn union_tags(left: Tags, right: Tags) -> Result<Tags, ExprError> {
    if left.is_empty() || right.is_subset(&left) {
        return Ok(if left.is_empty() { right } else { left });
    }
    if right.is_empty() || left.is_subset(&right) {
        return Ok(right);
    }
    Err(ExprError::MismatchedTags {
        left: format_keys(&left),
        right: format_keys(&right),
    })
}

fn check_func(
    name: &str,
    args: &[Node],
    tables: &dyn TagSource,
) -> Result<(ValueType, Tags), ExprError> {
    let builtin = funcs::find(name).ok_or_else(|| ExprError::UnknownFunction(name.to_string()))?;
    if args.len() != builtin.args.len() {
        return Err(ExprError::Arity {
            func: name.to_string(),
            expected: builtin.args.len(),
            got: args.len(),
        });
    }

    let mut arg_tags = Vec::with_capacity(args.len());
    for (index, (arg, &expected)) in args.iter().zip(builtin.args).enumerate() {
        let (got, tags) = check(arg, tables)?;
        if !got.accepted_as(expected) {
            return Err(ExprError::ArgType {
                func: name.to_string(),
                index,
                expected,
                got,
            });
        }
        arg_tags.push(tags);
    }

    let literal = |i: usize| match &args[i] {
        Node::String(s) => Some(s.as_str()),
        _ => None,
    };

    // lookupSeries also names a table; it must exist even though the
    // result keeps the series' tags.
    if name == "lookupSeries" {
        if let Some(table) = literal(1) {
            if tables.table_tags(table).is_none() {
                return Err(ExprError::BadLookup(table.to_string()));
            }
        }
    }

    let tags = match builtin.tags {
        TagRule::None => Tags::new(),
        TagRule::Arg(i) => arg_tags.swap_remove(i),
        TagRule::Query(i) => match literal(i) {
            Some(q) => query_tags(q)?,
            None => Tags::new(),
        },
        TagRule::LookupTable(i) => match literal(i) {
            Some(table) => tables
                .table_tags(table)
                .ok_or_else(|| ExprError::BadLookup(table.to_string()))?,
            None => Tags::new(),
        },
        TagRule::KeyList(i) => literal(i).map(funcs::key_list).unwrap_or_default(),
    };
    Ok((builtin.returns, tags))
}
