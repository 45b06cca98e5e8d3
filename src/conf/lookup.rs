//! Lookup tables
//!
//! ```text
//! lookup cpu {
//!     entry host=ny-*,dc=ny {
//!         high = 90
//!     }
//!     entry host=*,dc=* {
//!         high = 80
//!     }
//! }
//! ```
//!
//! Entry names are tag patterns matched with [`crate::opentsdb::search`];
//! the first entry matching a tag set and defining the requested key wins.

use super::parse::{Node, SectionNode};
use super::Loader;
use crate::error::ConfError;
use crate::expr::{TagSource, Tags};
use crate::opentsdb::{format_keys, TagSet};
use log::warn;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// One `entry <tags> { ... }` block
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    /// Source text of the entry
    pub def: String,
    /// Tag pattern as written
    pub name: String,
    pub key: TagSet,
    pub values: BTreeMap<String, String>,
    #[serde(skip)]
    matchers: Vec<(String, Option<Regex>)>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.def == other.def
            && self.name == other.name
            && self.key == other.key
            && self.values == other.values
    }
}

impl Entry {
    fn new(def: String, name: String, key: TagSet) -> Result<Self, regex::Error> {
        let mut matchers = Vec::with_capacity(key.len());
        for (k, pattern) in key.iter() {
            // `*` matches any value, including a missing tag
            let re = match pattern {
                "*" => None,
                p => Some(crate::opentsdb::search::compile(p)?),
            };
            matchers.push((k.to_string(), re));
        }
        Ok(Self {
            def,
            name,
            key,
            values: BTreeMap::new(),
            matchers,
        })
    }

    /// Whether this entry's tag pattern matches `tags`
    pub fn matches(&self, tags: &TagSet) -> bool {
        self.matchers.iter().all(|(key, re)| match re {
            None => true,
            Some(re) => re.is_match(tags.get(key).unwrap_or("")),
        })
    }
}

/// A named lookup table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lookup {
    pub name: String,
    /// Source text of the whole section
    pub text: String,
    /// Tag keys shared by every entry, sorted
    pub tags: Vec<String>,
    pub entries: Vec<Entry>,
}

impl Lookup {
    /// Value of `key` for the first entry matching `tags` that defines it
    pub fn get(&self, key: &str, tags: &TagSet) -> Option<&str> {
        self.entries
            .iter()
            .filter(|e| e.matches(tags))
            .find_map(|e| e.values.get(key))
            .map(String::as_str)
    }

    /// Like [`Lookup::get`], parsing the value as a number
    ///
    /// A value that is not a number is logged and treated as missing.
    pub fn get_number(&self, key: &str, tags: &TagSet) -> Option<f64> {
        let value = self.get(key, tags)?;
        match value.trim().parse::<f64>() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!(
                    "lookup {}: value {:?} for {} at {} is not a number",
                    self.name, value, key, tags
                );
                None
            }
        }
    }

    /// Tag keys as a set, for expression tag inference
    pub fn tag_keys(&self) -> Tags {
        self.tags.iter().cloned().collect()
    }
}

impl TagSource for HashMap<String, Lookup> {
    fn table_tags(&self, table: &str) -> Option<Tags> {
        self.get(table).map(Lookup::tag_keys)
    }
}

impl Loader<'_> {
    pub(super) fn load_lookup(&mut self, s: &SectionNode) -> Result<(), ConfError> {
        let name = &s.name;
        if self.conf.lookups.contains_key(name) {
            return Err(self.error(s, format!("duplicate lookup name: {}", name)));
        }

        let mut lookup = Lookup {
            name: name.clone(),
            text: s.raw_text.clone(),
            tags: Vec::new(),
            entries: Vec::new(),
        };
        let mut seen_keys: Vec<TagSet> = Vec::new();

        for node in &s.nodes {
            let entry_node = match node {
                Node::Section(n) if n.section_type == "entry" => n,
                Node::Section(_) => return Err(self.error(node, "unexpected subsection type")),
                Node::Pair(_) => return Err(self.error(node, "unexpected node")),
            };

            let key = TagSet::parse(&entry_node.name).map_err(|e| self.error(node, e.to_string()))?;
            if key.is_empty() {
                return Err(self.error(node, "lookup entries require tags"));
            }
            match seen_keys.first() {
                None => lookup.tags = key.keys().into_iter().collect(),
                Some(first) if !first.keys_equal(&key) => {
                    return Err(self.error(
                        node,
                        format!(
                            "lookup tags mismatch, expected {}",
                            format_keys(&lookup.tag_keys())
                        ),
                    ));
                }
                Some(_) => {}
            }
            if seen_keys.contains(&key) {
                return Err(self.error(node, "duplicate entry"));
            }

            let mut entry = Entry::new(entry_node.raw_text.clone(), entry_node.name.clone(), key.clone())
                .map_err(|e| self.error(node, format!("bad entry pattern: {}", e)))?;
            for child in &entry_node.nodes {
                let Node::Pair(pair) = child else {
                    return Err(self.error(child, "unexpected node"));
                };
                let value = self.expand(pair, &pair.val, None, false)?;
                entry.values.insert(pair.key.clone(), value);
            }
            seen_keys.push(key);
            lookup.entries.push(entry);
        }

        self.conf.lookups.insert(name.clone(), lookup);
        Ok(())
    }
}
