//! Template functions

use crate::conf::{expand, Vars};
use serde_json::Value;

/// Functions callable from a template action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    /// Human readable byte size
    Bytes,
    /// `replace s old new n`
    Replace,
    /// Text before the first `.`
    Short,
    /// Expand `$variables`
    V,
}

impl Func {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bytes" => Some(Self::Bytes),
            "replace" => Some(Self::Replace),
            "short" => Some(Self::Short),
            "V" => Some(Self::V),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bytes => "bytes",
            Self::Replace => "replace",
            Self::Short => "short",
            Self::V => "V",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Self::Replace => 4,
            _ => 1,
        }
    }

    pub(super) fn call(self, args: &[Value], scope: &Scope<'_>) -> Result<Value, String> {
        match self {
            Self::Bytes => bytes(&args[0]).map(Value::String),
            Self::Replace => {
                let s = string_arg(self, &args[0])?;
                let old = string_arg(self, &args[1])?;
                let new = string_arg(self, &args[2])?;
                let n = args[3]
                    .as_i64()
                    .ok_or_else(|| format!("replace: count must be an integer, got {}", args[3]))?;
                Ok(Value::String(replace_n(s, old, new, n)))
            }
            Self::Short => {
                let s = string_arg(self, &args[0])?;
                Ok(Value::String(s.split('.').next().unwrap_or_default().to_string()))
            }
            Self::V => {
                let s = string_arg(self, &args[0])?;
                expand(s, scope.locals, scope.globals, false)
                    .map(Value::String)
                    .map_err(|e| e.to_string())
            }
        }
    }
}

/// Variables visible to `V`
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub locals: Option<&'a Vars>,
    pub globals: &'a Vars,
}

fn string_arg(func: Func, v: &Value) -> Result<&str, String> {
    v.as_str()
        .ok_or_else(|| format!("{}: expected string, got {}", func.name(), v))
}

fn replace_n(s: &str, old: &str, new: &str, n: i64) -> String {
    if n < 0 {
        return s.replace(old, new);
    }
    s.replacen(old, new, n as usize)
}

const UNITS: [&str; 8] = ["YB", "ZB", "EB", "PB", "TB", "GB", "MB", "KB"];

fn bytes(v: &Value) -> Result<String, String> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| format!("bytes: cannot convert {} to a number", v))?;

    for (i, unit) in UNITS.iter().enumerate() {
        let size = 1024f64.powi((UNITS.len() - i) as i32);
        if n >= size {
            return Ok(format!("{:.2}{}", n / size, unit));
        }
    }
    Ok(format!("{:.2}B", n))
}
