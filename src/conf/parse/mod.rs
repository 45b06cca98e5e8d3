//! Configuration syntax tree
//!
//! Turns configuration text into a tree of pair and section nodes. The
//! tree carries no meaning yet; [`crate::conf::Conf`] walks it.

mod lex;

pub use lex::Pos;

use crate::error::ConfError;
use lex::{Item, ItemKind, LexError, Lexer};

/// Longest node rendering used in error messages
const CONTEXT_LEN: usize = 20;

/// `key = value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairNode {
    pub pos: Pos,
    pub key: String,
    pub val: String,
}

/// `type name { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionNode {
    pub pos: Pos,
    pub section_type: String,
    pub name: String,
    pub nodes: Vec<Node>,
    /// Source text of the whole section, braces included
    pub raw_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Pair(PairNode),
    Section(SectionNode),
}

/// Anything that can be pointed at in an error message
pub trait Located {
    fn pos(&self) -> Pos;

    /// Short rendering of the node, truncated for error messages
    fn context(&self) -> String;
}

fn truncate(text: String) -> String {
    if text.chars().count() <= CONTEXT_LEN {
        return text;
    }
    let mut short: String = text.chars().take(CONTEXT_LEN).collect();
    short.push_str("...");
    short
}

impl Located for PairNode {
    fn pos(&self) -> Pos {
        self.pos
    }

    fn context(&self) -> String {
        truncate(format!("{} = {}", self.key, self.val))
    }
}

impl Located for SectionNode {
    fn pos(&self) -> Pos {
        self.pos
    }

    fn context(&self) -> String {
        truncate(format!("{} {}", self.section_type, self.name))
    }
}

impl Located for Node {
    fn pos(&self) -> Pos {
        match self {
            Node::Pair(p) => p.pos,
            Node::Section(s) => s.pos,
        }
    }

    fn context(&self) -> String {
        match self {
            Node::Pair(p) => p.context(),
            Node::Section(s) => s.context(),
        }
    }
}

/// Parsed configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub name: String,
    pub nodes: Vec<Node>,
}

struct Parser<'a> {
    name: &'a str,
    text: &'a str,
    lexer: Lexer<'a>,
}

impl Tree {
    /// Parse configuration text
    ///
    /// # Errors
    /// Returns `ConfError::Syntax` with the line and column of the problem.
    pub fn parse(name: &str, text: &str) -> Result<Tree, ConfError> {
        let mut parser = Parser {
            name,
            text,
            lexer: Lexer::new(text),
        };
        let nodes = parser.parse_nodes(None)?;
        Ok(Tree {
            name: name.to_string(),
            nodes,
        })
    }
}

impl<'a> Parser<'a> {
    fn syntax(&self, pos: Pos, message: impl Into<String>) -> ConfError {
        ConfError::Syntax {
            file: self.name.to_string(),
            line: pos.line,
            col: pos.col,
            message: message.into(),
        }
    }

    fn next(&mut self) -> Result<Item, ConfError> {
        self.lexer
            .next_item()
            .map_err(|LexError { pos, message }| self.syntax(pos, message))
    }

    fn expect(&mut self, kind: ItemKind) -> Result<Item, ConfError> {
        let item = self.next()?;
        if item.kind != kind {
            return Err(self.syntax(item.pos, format!("unexpected {:?}", item.text)));
        }
        Ok(item)
    }

    /// Parse nodes until EOF (top level) or the closing brace of `open`
    fn parse_nodes(&mut self, open: Option<&Item>) -> Result<Vec<Node>, ConfError> {
        let mut nodes = Vec::new();
        loop {
            let item = self.next()?;
            match item.kind {
                ItemKind::Eof => {
                    return match open {
                        None => Ok(nodes),
                        Some(section) => Err(self.syntax(
                            section.pos,
                            format!("unclosed section {}", section.text),
                        )),
                    };
                }
                ItemKind::RightDelim => {
                    if open.is_none() {
                        return Err(self.syntax(item.pos, "unexpected }"));
                    }
                    return Ok(nodes);
                }
                ItemKind::Key => {
                    let val = self.expect(ItemKind::Value)?;
                    nodes.push(Node::Pair(PairNode {
                        pos: item.pos,
                        key: item.text,
                        val: val.text,
                    }));
                }
                ItemKind::SectionType => {
                    let name = self.expect(ItemKind::SectionName)?;
                    self.expect(ItemKind::LeftDelim)?;
                    let children = self.parse_nodes(Some(&item))?;
                    // the closing brace is the last byte consumed
                    let end = self.lexer_offset();
                    nodes.push(Node::Section(SectionNode {
                        pos: item.pos,
                        section_type: item.text,
                        name: name.text,
                        nodes: children,
                        raw_text: self.text[item.pos.offset..end].to_string(),
                    }));
                }
                _ => return Err(self.syntax(item.pos, format!("unexpected {:?}", item.text))),
            }
        }
    }

    fn lexer_offset(&self) -> usize {
        self.lexer.offset()
    }
}
