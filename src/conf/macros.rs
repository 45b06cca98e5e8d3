//! `macro` sections: reusable pairs inlined with `macro = <name>`

use super::parse::SectionNode;
use super::{Loader, SectionPair};
use crate::error::ConfError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    pub text: String,
    pub(crate) pairs: Vec<SectionPair>,
}

impl Macro {
    /// Inlined `(key, value)` pairs in declaration order
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|p| (p.key.as_str(), p.val.as_str()))
    }
}

impl Loader<'_> {
    pub(super) fn load_macro(&mut self, s: &SectionNode) -> Result<(), ConfError> {
        let name = &s.name;
        if self.conf.macros.contains_key(name) {
            return Err(self.error(s, format!("duplicate macro name: {}", name)));
        }
        // variables of the using section are not known yet
        let pairs = self.section_pairs(s, None, true)?;
        self.conf.macros.insert(
            name.clone(),
            Macro {
                name: name.clone(),
                text: s.raw_text.clone(),
                pairs,
            },
        );
        Ok(())
    }
}
