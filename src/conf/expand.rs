//! `$variable` expansion
//!
//! Values may reference `$name`, `${name}` or `$env.NAME`. Local (section)
//! variables shadow global ones; `$env.` reads the process environment.
//! Substituted values are expanded again, so variables can be built from
//! other variables.

use crate::error::ExpandError;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Variable name to value
pub type Vars = HashMap<String, String>;

/// Deepest chain of nested substitutions before giving up
pub const MAX_EXPAND_DEPTH: usize = 64;

fn var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$(?:[\w.]+|\{[\w.]+\})").expect("static regex"))
}

/// Expand every variable reference in `text`
///
/// With `ignore_bad_expand` unresolved references are left untouched
/// (macros are expanded this way, before the vars of the section using
/// them are known).
///
/// # Errors
/// `ExpandError::Unknown` for an unresolved reference, `ExpandError::TooDeep`
/// when substitution nests deeper than [`MAX_EXPAND_DEPTH`].
pub fn expand(
    text: &str,
    locals: Option<&Vars>,
    globals: &Vars,
    ignore_bad_expand: bool,
) -> Result<String, ExpandError> {
    expand_depth(text, locals, globals, ignore_bad_expand, 0)
}

fn expand_depth(
    text: &str,
    locals: Option<&Vars>,
    globals: &Vars,
    ignore_bad_expand: bool,
    depth: usize,
) -> Result<String, ExpandError> {
    let mut failure = None;
    let expanded = var_regex().replace_all(text, |caps: &Captures| {
        let token = &caps[0];
        if failure.is_some() {
            return token.to_string();
        }
        match resolve(token, locals, globals, ignore_bad_expand, depth) {
            Ok(value) => value,
            Err(e) => {
                failure = Some(e);
                token.to_string()
            }
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(expanded.into_owned()),
    }
}

fn resolve(
    token: &str,
    locals: Option<&Vars>,
    globals: &Vars,
    ignore_bad_expand: bool,
    depth: usize,
) -> Result<String, ExpandError> {
    let name = match token.strip_prefix("${").and_then(|t| t.strip_suffix('}')) {
        Some(inner) if !ignore_bad_expand => format!("${}", inner),
        _ => token.to_string(),
    };

    let value = if let Some(v) = locals.and_then(|vars| vars.get(&name)) {
        v.clone()
    } else if let Some(v) = globals.get(&name) {
        v.clone()
    } else if let Some(env) = name.strip_prefix("$env.") {
        std::env::var(env).unwrap_or_default()
    } else if ignore_bad_expand {
        return Ok(token.to_string());
    } else {
        return Err(ExpandError::Unknown(name));
    };

    if depth >= MAX_EXPAND_DEPTH {
        return Err(ExpandError::TooDeep(name));
    }
    expand_depth(&value, locals, globals, ignore_bad_expand, depth + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_local_variable() {
        let locals = vars(&[("$a", "3")]);
        assert_eq!(expand("$a", Some(&locals), &Vars::new(), false).unwrap(), "3");
    }

    #[test]
    fn test_braced_variable() {
        let globals = vars(&[("$host", "ny-web01")]);
        assert_eq!(
            expand("${host}.example.com", None, &globals, false).unwrap(),
            "ny-web01.example.com"
        );
    }

    #[test]
    fn test_locals_shadow_globals() {
        let locals = vars(&[("$x", "local")]);
        let globals = vars(&[("$x", "global")]);
        assert_eq!(expand("$x", Some(&locals), &globals, false).unwrap(), "local");
    }

    #[test]
    fn test_nested_expansion() {
        let globals = vars(&[("$metric", "os.cpu"), ("$q", "avg:$metric{host=*}")]);
        assert_eq!(
            expand("q(\"$q\")", None, &globals, false).unwrap(),
            "q(\"avg:os.cpu{host=*}\")"
        );
    }

    #[test]
    fn test_env_variable() {
        std::env::set_var("ALERTCONF_EXPAND_TEST", "1");
        assert_eq!(
            expand("$env.ALERTCONF_EXPAND_TEST", None, &Vars::new(), false).unwrap(),
            "1"
        );
    }

    #[test]
    fn test_unknown_variable() {
        assert_eq!(
            expand("$nope", None, &Vars::new(), false),
            Err(ExpandError::Unknown("$nope".to_string()))
        );
    }

    #[test]
    fn test_ignore_bad_expand_keeps_token() {
        assert_eq!(
            expand("a ${later} $b", None, &Vars::new(), true).unwrap(),
            "a ${later} $b"
        );
    }

    #[test]
    fn test_cycle_is_an_error() {
        let globals = vars(&[("$a", "$b"), ("$b", "$a")]);
        assert!(matches!(
            expand("$a", None, &globals, false),
            Err(ExpandError::TooDeep(_))
        ));
    }

    #[test]
    fn test_text_without_variables() {
        assert_eq!(
            expand("plain text", None, &Vars::new(), false).unwrap(),
            "plain text"
        );
    }
}
