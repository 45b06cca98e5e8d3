//! Tag sets, durations and tag search
//!
//! Small OpenTSDB-flavoured helpers shared by the configuration loader,
//! the expression front-end and the notifier.

mod duration;
pub mod search;

pub use duration::{format_duration, parse_duration};

use crate::error::TagError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Unordered `key=value` labels identifying one time series or alert instance
///
/// Keys are kept sorted so that display and comparison are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    /// Create an empty tag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `a=b,c=d`
    ///
    /// An empty string yields an empty set. Whitespace around keys and
    /// values is trimmed.
    ///
    /// # Errors
    /// `TagError::BadTag` for a pair without `=`, `TagError::Duplicate`
    /// when a key is repeated.
    pub fn parse(text: &str) -> Result<Self, TagError> {
        let mut tags = BTreeMap::new();
        if text.trim().is_empty() {
            return Ok(Self(tags));
        }
        for pair in text.split(',') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| TagError::BadTag(pair.to_string()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(TagError::BadTag(pair.to_string()));
            }
            if tags
                .insert(key.to_string(), value.trim().to_string())
                .is_some()
            {
                return Err(TagError::Duplicate(pair.to_string()));
            }
        }
        Ok(Self(tags))
    }

    /// Get the value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert or replace a tag
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Check whether a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of tags
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no tags
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(key, value)` pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The set of keys
    pub fn keys(&self) -> BTreeSet<String> {
        self.0.keys().cloned().collect()
    }

    /// Whether both sets use exactly the same keys, ignoring values
    pub fn keys_equal(&self, other: &TagSet) -> bool {
        self.0.len() == other.0.len() && self.0.keys().all(|k| other.0.contains_key(k))
    }

    /// Render as `a=b,c=d` without braces
    pub fn tag_string(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.tag_string())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Render a set of tag keys as `{a,b}`
pub fn format_keys(keys: &BTreeSet<String>) -> String {
    format!(
        "{{{}}}",
        keys.iter().cloned().collect::<Vec<_>>().join(",")
    )
}
