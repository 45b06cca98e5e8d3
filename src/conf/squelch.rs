//! Tag-pattern suppression of alert instances

use crate::error::SquelchError;
use crate::opentsdb::TagSet;
use regex::Regex;
use std::collections::BTreeMap;

/// One squelch rule: every listed tag must be present and match its regex
#[derive(Debug, Clone, Default)]
pub struct Squelch(BTreeMap<String, Regex>);

impl Squelch {
    /// Whether `tags` satisfies every constraint of this rule
    pub fn squelched(&self, tags: &TagSet) -> bool {
        self.0.iter().all(|(key, re)| match tags.get(key) {
            Some(value) => re.is_match(value),
            None => false,
        })
    }

    /// Source patterns of the rule
    pub fn patterns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, re)| (k.as_str(), re.as_str()))
    }
}

impl PartialEq for Squelch {
    fn eq(&self, other: &Self) -> bool {
        self.patterns().eq(other.patterns())
    }
}

/// Ordered list of squelch rules; any matching rule suppresses
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Squelches(Vec<Squelch>);

impl Squelches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=regex,key2=regex` and append it as a rule
    ///
    /// # Errors
    /// Fails on malformed or missing tags, or an invalid regular expression.
    pub fn add(&mut self, text: &str) -> Result<(), SquelchError> {
        let tags = TagSet::parse(text)?;
        if tags.is_empty() {
            return Err(SquelchError::Empty);
        }
        let mut rule = BTreeMap::new();
        for (key, pattern) in tags.iter() {
            let re = Regex::new(pattern).map_err(|e| SquelchError::Regex {
                key: key.to_string(),
                message: e.to_string(),
            })?;
            rule.insert(key.to_string(), re);
        }
        self.0.push(Squelch(rule));
        Ok(())
    }

    /// Whether any rule suppresses `tags`
    pub fn squelched(&self, tags: &TagSet) -> bool {
        self.0.iter().any(|s| s.squelched(tags))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Squelch> {
        self.0.iter()
    }
}
