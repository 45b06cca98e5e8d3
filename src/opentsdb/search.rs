//! Wildcard tag value matching
//!
//! A pattern is a restricted regular expression: `.` is literal, `*`
//! matches any run of characters and `|` separates alternatives. The whole
//! value must match.

use regex::Regex;

/// Compile a wildcard pattern into an anchored regex
pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    let translated = pattern.replace('.', r"\.").replace('*', ".*");
    Regex::new(&format!("^({})$", translated))
}

/// Check whether `value` matches the wildcard `pattern`
///
/// # Errors
/// Returns the regex error when the translated pattern does not compile.
pub fn matches(pattern: &str, value: &str) -> Result<bool, regex::Error> {
    if pattern == "*" {
        return Ok(true);
    }
    Ok(compile(pattern)?.is_match(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_everything() {
        assert!(matches("*", "").unwrap());
        assert!(matches("*", "anything").unwrap());
    }

    #[test]
    fn test_prefix_wildcard() {
        assert!(matches("ny-*", "ny-web01").unwrap());
        assert!(!matches("ny-*", "la-web01").unwrap());
    }

    #[test]
    fn test_dot_is_literal() {
        assert!(matches("a.b", "a.b").unwrap());
        assert!(!matches("a.b", "axb").unwrap());
    }

    #[test]
    fn test_alternation() {
        assert!(matches("web01|web02", "web02").unwrap());
        assert!(!matches("web01|web02", "web03").unwrap());
    }

    #[test]
    fn test_anchored() {
        assert!(!matches("web", "web01").unwrap());
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches("(", "x").is_err());
    }
}
