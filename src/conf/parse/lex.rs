//! Lexer for the configuration syntax
//!
//! The language is line oriented: `key = value` pairs run to the end of the
//! line unless the value is a backquoted raw string, and sections open with
//! `type name {` and close with `}`.

use std::collections::VecDeque;

/// Position of an item in the source text (1-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub offset: usize,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Key,
    Value,
    SectionType,
    SectionName,
    LeftDelim,
    RightDelim,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub kind: ItemKind,
    pub text: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub pos: Pos,
    pub message: String,
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '-')
}

pub struct Lexer<'a> {
    input: &'a str,
    offset: usize,
    line: usize,
    col: usize,
    pending: VecDeque<Item>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
            line: 1,
            col: 1,
            pending: VecDeque::new(),
        }
    }

    /// Byte offset just past the last consumed character
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn pos(&self) -> Pos {
        Pos {
            offset: self.offset,
            line: self.line,
            col: self.col,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.offset..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_inline_space(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
    }

    fn error<T>(&self, pos: Pos, message: impl Into<String>) -> Result<T, LexError> {
        Err(LexError {
            pos,
            message: message.into(),
        })
    }

    /// Produce the next item
    pub fn next_item(&mut self) -> Result<Item, LexError> {
        if let Some(item) = self.pending.pop_front() {
            return Ok(item);
        }

        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            }
            let pos = self.pos();
            match self.peek() {
                None => {
                    return Ok(Item {
                        kind: ItemKind::Eof,
                        text: String::new(),
                        pos,
                    })
                }
                Some('#') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                Some('}') => {
                    self.bump();
                    return Ok(Item {
                        kind: ItemKind::RightDelim,
                        text: "}".to_string(),
                        pos,
                    });
                }
                Some(c) if is_key_char(c) => {
                    self.lex_word(pos)?;
                    if let Some(item) = self.pending.pop_front() {
                        return Ok(item);
                    }
                }
                Some(c) => return self.error(pos, format!("unexpected character {:?}", c)),
            }
        }
    }

    fn lex_word(&mut self, pos: Pos) -> Result<(), LexError> {
        let start = self.offset;
        while self.peek().is_some_and(is_key_char) {
            self.bump();
        }
        let word = self.input[start..self.offset].to_string();
        self.skip_inline_space();

        if self.peek() == Some('=') {
            self.bump();
            self.pending.push_back(Item {
                kind: ItemKind::Key,
                text: word,
                pos,
            });
            self.lex_value()
        } else {
            self.pending.push_back(Item {
                kind: ItemKind::SectionType,
                text: word.clone(),
                pos,
            });
            self.lex_section_name(&word)
        }
    }

    fn lex_value(&mut self) -> Result<(), LexError> {
        self.skip_inline_space();
        let pos = self.pos();

        if self.peek() == Some('`') {
            self.bump();
            let start = self.offset;
            loop {
                match self.bump() {
                    Some('`') => break,
                    Some(_) => {}
                    None => return self.error(pos, "unterminated raw string"),
                }
            }
            let text = self.input[start..self.offset - 1].to_string();
            self.skip_inline_space();
            match self.peek() {
                None | Some('\n' | '\r') => {}
                Some(_) => return self.error(self.pos(), "unexpected text after raw string"),
            }
            self.pending.push_back(Item {
                kind: ItemKind::Value,
                text,
                pos,
            });
            return Ok(());
        }

        let start = self.offset;
        while self.peek().is_some_and(|c| c != '\n') {
            self.bump();
        }
        self.pending.push_back(Item {
            kind: ItemKind::Value,
            text: self.input[start..self.offset].trim_end().to_string(),
            pos,
        });
        Ok(())
    }

    fn lex_section_name(&mut self, section_type: &str) -> Result<(), LexError> {
        let pos = self.pos();
        let start = self.offset;
        loop {
            match self.peek() {
                Some('{') => break,
                Some('\n') | None => {
                    return self.error(pos, format!("expected {{ after {}", section_type))
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        let name = self.input[start..self.offset].trim().to_string();
        if name.is_empty() {
            return self.error(pos, format!("missing name for {}", section_type));
        }
        let delim = self.pos();
        self.bump();
        self.pending.push_back(Item {
            kind: ItemKind::SectionName,
            text: name,
            pos,
        });
        self.pending.push_back(Item {
            kind: ItemKind::LeftDelim,
            text: "{".to_string(),
            pos: delim,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<(ItemKind, String)> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let item = lexer.next_item().unwrap();
            let done = item.kind == ItemKind::Eof;
            out.push((item.kind, item.text));
            if done {
                return out;
            }
        }
    }

    #[test]
    fn test_pair() {
        let items = kinds("tsdbHost = localhost:4242  \n");
        assert_eq!(items[0], (ItemKind::Key, "tsdbHost".to_string()));
        assert_eq!(items[1], (ItemKind::Value, "localhost:4242".to_string()));
        assert_eq!(items[2].0, ItemKind::Eof);
    }

    #[test]
    fn test_section() {
        let items = kinds("alert foo {\n  crit = 1\n}\n");
        let got: Vec<ItemKind> = items.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            got,
            vec![
                ItemKind::SectionType,
                ItemKind::SectionName,
                ItemKind::LeftDelim,
                ItemKind::Key,
                ItemKind::Value,
                ItemKind::RightDelim,
                ItemKind::Eof,
            ]
        );
        assert_eq!(items[1].1, "foo");
    }

    #[test]
    fn test_entry_name_with_tags() {
        let items = kinds("entry host=ny-*,dc=a {\n}\n");
        assert_eq!(items[1], (ItemKind::SectionName, "host=ny-*,dc=a".to_string()));
    }

    #[test]
    fn test_raw_string_spans_lines() {
        let items = kinds("body = `line one\nline {{.Two}}`\n");
        assert_eq!(items[1], (ItemKind::Value, "line one\nline {{.Two}}".to_string()));
    }

    #[test]
    fn test_comments_skipped() {
        let items = kinds("# comment\n  # indented\nkey = v # not a comment\n");
        assert_eq!(items[1], (ItemKind::Value, "v # not a comment".to_string()));
    }

    #[test]
    fn test_unterminated_raw_string() {
        let mut lexer = Lexer::new("body = `oops");
        let err = lexer.next_item().unwrap_err();
        assert_eq!(err.message, "unterminated raw string");
    }

    #[test]
    fn test_missing_brace() {
        let mut lexer = Lexer::new("alert foo\n");
        let err = lexer.next_item().unwrap_err();
        assert!(err.message.contains("expected {"));
        assert_eq!(err.pos.line, 1);
    }

    #[test]
    fn test_positions() {
        let mut lexer = Lexer::new("a = 1\n  b = 2\n");
        lexer.next_item().unwrap();
        lexer.next_item().unwrap();
        let b = lexer.next_item().unwrap();
        assert_eq!(b.text, "b");
        assert_eq!(b.pos.line, 2);
        assert_eq!(b.pos.col, 3);
    }
}
