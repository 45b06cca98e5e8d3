//! Notification text templates
//!
//! A deliberately small engine: literal text interleaved with `{{ ... }}`
//! actions. An action is a pipeline of commands separated by `|`; each
//! command is either an operand (`.`, `.Field.Path`, a string or a number)
//! or a call to one of the functions in [`Func`]. The result of one
//! command is passed as the last argument of the next.
//!
//! `{{- ` and ` -}}` trim the whitespace before and after an action, and
//! `{{/* ... */}}` is a comment. Data is a [`serde_json::Value`]; a field
//! that does not exist renders as `<no value>`.

mod funcs;

pub use funcs::{Func, Scope};

use crate::error::TemplateError;
use serde_json::Value;

const NO_VALUE: &str = "<no value>";

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    /// `.` or `.A.B`; an empty path is the data itself
    Field(Vec<String>),
    Str(String),
    Num(f64),
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Operand(Operand),
    Call { func: Func, args: Vec<Operand> },
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Action(Vec<Command>),
}

/// A compiled template
#[derive(Debug, Clone, PartialEq)]
pub struct TextTemplate {
    name: String,
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Pipe,
    Ident(String),
    Operand(Operand),
}

impl TextTemplate {
    /// Compile `source`
    ///
    /// # Errors
    /// `TemplateError::Parse` for an unclosed action, an unknown function,
    /// a call with the wrong number of arguments or malformed operands.
    pub fn parse(name: &str, source: &str) -> Result<Self, TemplateError> {
        let err = |message: String| TemplateError::Parse {
            name: name.to_string(),
            message,
        };

        let mut segments = Vec::new();
        let mut rest = source;
        let mut trim_next = false;
        let mut line = 1;

        while let Some(open) = rest.find("{{") {
            let mut text = &rest[..open];
            if trim_next {
                text = text.trim_start();
            }
            let mut body = &rest[open + 2..];
            let trim_prev = body.starts_with("- ") || body.starts_with("-\t") || body.starts_with("-\n");
            if trim_prev {
                text = text.trim_end();
                body = &body[1..];
            }
            if !text.is_empty() {
                segments.push(Segment::Text(text.to_string()));
            }
            line += rest[..open].matches('\n').count();

            let close = find_close(body).ok_or_else(|| err(format!("{}: unclosed action", line)))?;
            let mut inner = &body[..close];
            trim_next = inner.ends_with(" -") || inner.ends_with("\t-") || inner.ends_with("\n-");
            if trim_next {
                inner = &inner[..inner.len() - 1];
            }
            line += inner.matches('\n').count();

            let trimmed = inner.trim();
            if !(trimmed.starts_with("/*") && trimmed.ends_with("*/")) {
                let commands = parse_pipeline(trimmed).map_err(|m| err(format!("{}: {}", line, m)))?;
                segments.push(Segment::Action(commands));
            }
            rest = &body[close + 2..];
        }

        let tail = if trim_next { rest.trim_start() } else { rest };
        if !tail.is_empty() {
            segments.push(Segment::Text(tail.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            source: source.to_string(),
            segments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The template text as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render against `data`
    ///
    /// # Errors
    /// `TemplateError::Exec` when a function rejects its arguments or a
    /// field is read from something that is not an object.
    pub fn render(&self, data: &Value, scope: &Scope<'_>) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => out.push_str(t),
                Segment::Action(commands) => {
                    let value = self
                        .run_pipeline(commands, data, scope)
                        .map_err(|message| TemplateError::Exec {
                            name: self.name.clone(),
                            message,
                        })?;
                    out.push_str(&display(&value));
                }
            }
        }
        Ok(out)
    }

    fn run_pipeline(
        &self,
        commands: &[Command],
        data: &Value,
        scope: &Scope<'_>,
    ) -> Result<Value, String> {
        let mut piped: Option<Value> = None;
        for command in commands {
            let value = match command {
                Command::Operand(op) => eval_operand(op, data)?,
                Command::Call { func, args } => {
                    let mut values = args
                        .iter()
                        .map(|a| eval_operand(a, data))
                        .collect::<Result<Vec<_>, _>>()?;
                    values.extend(piped.take());
                    func.call(&values, scope)?
                }
            };
            piped = Some(value);
        }
        Ok(piped.unwrap_or(Value::Null))
    }
}

/// Offset of the `}}` closing an action, skipping quoted text
fn find_close(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut i = 0;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let c = bytes[i];
        match quote {
            Some(b'"') if c == b'\\' => i += 1,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == b'"' || c == b'`' => quote = Some(c),
            None if c == b'}' && bytes.get(i + 1) == Some(&b'}') => return Some(i),
            None => {}
        }
        i += 1;
    }
    None
}

fn tokenize(action: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = action.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => break,
                        Some((_, '\\')) => match chars.next() {
                            Some((_, 'n')) => s.push('\n'),
                            Some((_, 't')) => s.push('\t'),
                            Some((_, other)) => s.push(other),
                            None => return Err("unterminated quoted string".to_string()),
                        },
                        Some((_, ch)) => s.push(ch),
                        None => return Err("unterminated quoted string".to_string()),
                    }
                }
                tokens.push(Token::Operand(Operand::Str(s)));
            }
            '`' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '`')) => break,
                        Some((_, ch)) => s.push(ch),
                        None => return Err("unterminated raw quoted string".to_string()),
                    }
                }
                tokens.push(Token::Operand(Operand::Str(s)));
            }
            _ => {
                let mut end = start;
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_whitespace() || ch == '|' || ch == '"' || ch == '`' {
                        break;
                    }
                    end = i + ch.len_utf8();
                    chars.next();
                }
                tokens.push(word(&action[start..end])?);
            }
        }
    }
    Ok(tokens)
}

fn word(w: &str) -> Result<Token, String> {
    if w == "." {
        return Ok(Token::Operand(Operand::Field(Vec::new())));
    }
    if let Some(path) = w.strip_prefix('.') {
        let fields: Vec<String> = path.split('.').map(str::to_string).collect();
        let valid = fields
            .iter()
            .all(|f| !f.is_empty() && f.chars().all(|c| c.is_alphanumeric() || c == '_'));
        if !valid {
            return Err(format!("bad field path {}", w));
        }
        return Ok(Token::Operand(Operand::Field(fields)));
    }
    let first = w.chars().next().unwrap_or(' ');
    if first.is_ascii_digit() || first == '-' || first == '+' {
        return w
            .parse::<f64>()
            .map(|n| Token::Operand(Operand::Num(n)))
            .map_err(|_| format!("bad number syntax: {}", w));
    }
    if w.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Ok(Token::Ident(w.to_string()));
    }
    Err(format!("unexpected {:?} in command", w))
}

fn parse_pipeline(action: &str) -> Result<Vec<Command>, String> {
    let tokens = tokenize(action)?;
    let mut commands = Vec::new();
    for (stage, group) in tokens.split(|t| *t == Token::Pipe).enumerate() {
        let Some((head, rest)) = group.split_first() else {
            return Err("missing value for command".to_string());
        };
        let command = match head {
            Token::Ident(name) => {
                let func = Func::from_name(name)
                    .ok_or_else(|| format!("function {:?} not defined", name))?;
                let args = rest
                    .iter()
                    .map(|t| match t {
                        Token::Operand(op) => Ok(op.clone()),
                        other => Err(format!("unexpected {:?} in arguments to {}", other, name)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let got = args.len() + usize::from(stage > 0);
                if got != func.arity() {
                    return Err(format!(
                        "wrong number of args for {}: want {} got {}",
                        name,
                        func.arity(),
                        got
                    ));
                }
                Command::Call { func, args }
            }
            Token::Operand(op) => {
                if stage > 0 || !rest.is_empty() {
                    return Err("can't give argument to non-function".to_string());
                }
                Command::Operand(op.clone())
            }
            Token::Pipe => return Err("missing value for command".to_string()),
        };
        commands.push(command);
    }
    Ok(commands)
}

fn eval_operand(op: &Operand, data: &Value) -> Result<Value, String> {
    match op {
        Operand::Str(s) => Ok(Value::String(s.clone())),
        // integral literals stay integers so they print without a fraction
        Operand::Num(n) if n.fract() == 0.0 && n.abs() < 1e15 => Ok(Value::from(*n as i64)),
        Operand::Num(n) => Ok(serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null)),
        Operand::Field(path) => {
            let mut current = data;
            for field in path {
                current = match current {
                    Value::Object(map) => match map.get(field) {
                        Some(v) => v,
                        None => return Ok(Value::Null),
                    },
                    Value::Null => return Ok(Value::Null),
                    other => {
                        return Err(format!(
                            "can't evaluate field {} in type {}",
                            field,
                            kind(other)
                        ))
                    }
                };
            }
            Ok(current.clone())
        }
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn display(v: &Value) -> String {
    match v {
        Value::Null => NO_VALUE.to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
