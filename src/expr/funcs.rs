//! Builtin function signatures

use super::{Tags, ValueType};
use crate::error::ExprError;

use ValueType::{Number, Scalar, Series, String as Str};

/// How a function derives the tag keys of its result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRule {
    /// Result is not grouped
    None,
    /// Group-by tags of the query string at this argument index
    Query(usize),
    /// Same tags as the argument at this index
    Arg(usize),
    /// Tag keys of the lookup table named by this argument
    LookupTable(usize),
    /// Comma separated tag keys given literally by this argument
    KeyList(usize),
}

/// Static signature of a builtin
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub args: &'static [ValueType],
    pub returns: ValueType,
    pub tags: TagRule,
}

const fn builtin(
    name: &'static str,
    args: &'static [ValueType],
    returns: ValueType,
    tags: TagRule,
) -> Builtin {
    Builtin {
        name,
        args,
        returns,
        tags,
    }
}

const REDUCTION: &[ValueType] = &[Series];

pub const BUILTINS: &[Builtin] = &[
    // queries
    builtin("q", &[Str, Str, Str], Series, TagRule::Query(0)),
    builtin("band", &[Str, Str, Str, Scalar], Series, TagRule::Query(0)),
    builtin("over", &[Str, Str, Str, Scalar], Series, TagRule::Query(0)),
    builtin("change", &[Str, Str, Str], Number, TagRule::Query(0)),
    builtin("count", &[Str, Str, Str], Scalar, TagRule::None),
    // reductions
    builtin("avg", REDUCTION, Number, TagRule::Arg(0)),
    builtin("cCount", REDUCTION, Number, TagRule::Arg(0)),
    builtin("dev", REDUCTION, Number, TagRule::Arg(0)),
    builtin("diff", REDUCTION, Number, TagRule::Arg(0)),
    builtin("first", REDUCTION, Number, TagRule::Arg(0)),
    builtin("last", REDUCTION, Number, TagRule::Arg(0)),
    builtin("len", REDUCTION, Number, TagRule::Arg(0)),
    builtin("max", REDUCTION, Number, TagRule::Arg(0)),
    builtin("median", REDUCTION, Number, TagRule::Arg(0)),
    builtin("min", REDUCTION, Number, TagRule::Arg(0)),
    builtin("since", REDUCTION, Number, TagRule::Arg(0)),
    builtin("streak", REDUCTION, Number, TagRule::Arg(0)),
    builtin("sum", REDUCTION, Number, TagRule::Arg(0)),
    builtin("percentile", &[Series, Scalar], Number, TagRule::Arg(0)),
    builtin("forecastlr", &[Series, Scalar], Number, TagRule::Arg(0)),
    // groups and numbers
    builtin("abs", &[Number], Number, TagRule::Arg(0)),
    builtin("nv", &[Number, Scalar], Number, TagRule::Arg(0)),
    builtin("d", &[Str], Scalar, TagRule::None),
    builtin("dropna", &[Series], Series, TagRule::Arg(0)),
    builtin("t", &[Number, Str], Series, TagRule::KeyList(1)),
    builtin("ungroup", &[Number], Scalar, TagRule::None),
    builtin("epoch", &[], Scalar, TagRule::None),
    builtin("sort", &[Number, Str], Number, TagRule::Arg(0)),
    builtin("limit", &[Number, Scalar], Number, TagRule::Arg(0)),
    builtin("lookup", &[Str, Str], Number, TagRule::LookupTable(0)),
    builtin("lookupSeries", &[Series, Str, Str], Number, TagRule::Arg(0)),
];

/// Find a builtin by name
pub fn find(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

impl ValueType {
    /// Whether a value of type `self` may be passed where `expected` is declared
    pub fn accepted_as(self, expected: ValueType) -> bool {
        self == expected || (self == Scalar && expected == Number)
    }
}

/// Group-by tag keys of an OpenTSDB-style query
///
/// The query is `agg:[downsample:][rate{...}:]metric{k=v,...}[{filters}]`;
/// the keys of the first brace group after the metric name are the result
/// tags.
pub fn query_tags(query: &str) -> Result<Tags, ExprError> {
    let bad = || ExprError::BadQuery(query.to_string());

    let mut depth = 0usize;
    let mut last_colon = None;
    for (i, c) in query.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.checked_sub(1).ok_or_else(bad)?,
            ':' if depth == 0 => last_colon = Some(i),
            _ => {}
        }
    }
    if depth != 0 {
        return Err(bad());
    }
    let metric = &query[last_colon.ok_or_else(bad)? + 1..];
    if metric.trim().is_empty() || metric.starts_with('{') {
        return Err(bad());
    }

    let Some(open) = metric.find('{') else {
        return Ok(Tags::new());
    };
    let close = metric[open..].find('}').ok_or_else(bad)? + open;
    let inner = &metric[open + 1..close];
    let mut tags = Tags::new();
    for pair in inner.split(',').filter(|p| !p.trim().is_empty()) {
        let (key, _) = pair.split_once('=').ok_or_else(bad)?;
        tags.insert(key.trim().to_string());
    }
    Ok(tags)
}

/// Tag keys listed literally as `a,b,c`
pub fn key_list(text: &str) -> Tags {
    text.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
