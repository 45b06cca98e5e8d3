//! Unified error types for alertconf
//!
//! This module defines all error types used throughout the application.
//! Uses thiserror for ergonomic error definitions.

use crate::expr::ValueType;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from loading an alert configuration file
    #[error(transparent)]
    Conf(#[from] ConfError),

    /// Error from the settings file
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from notification delivery
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Named item not present in the loaded configuration
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Invalid command-line argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from loading an alert configuration
///
/// Every variant names the file it came from. Errors raised while a node
/// is being processed also carry its position and a short rendering of it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfError {
    /// Error attached to a specific node
    #[error("conf: {file}:{line}:{col}: at <{context}>: {message}")]
    At {
        file: String,
        line: usize,
        col: usize,
        context: String,
        message: String,
    },

    /// Malformed configuration syntax
    #[error("conf: {file}:{line}:{col}: {message}")]
    Syntax {
        file: String,
        line: usize,
        col: usize,
        message: String,
    },

    /// Error not tied to a node
    #[error("conf: {file}: {message}")]
    General { file: String, message: String },
}

impl ConfError {
    /// The bare message without file or location prefix
    pub fn message(&self) -> &str {
        match self {
            Self::At { message, .. } | Self::Syntax { message, .. } | Self::General { message, .. } => {
                message
            }
        }
    }
}

/// Errors from tag set parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    /// Pair without `=`
    #[error("bad tag: {0}")]
    BadTag(String),

    /// Same key given twice
    #[error("duplicated tag: {0}")]
    Duplicate(String),
}

/// Errors from duration parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    /// Empty or structurally invalid duration
    #[error("invalid duration {0:?}")]
    Invalid(String),

    /// Unit suffix not recognised
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
}

/// Errors from `$variable` expansion
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpandError {
    /// Variable not defined locally, globally or as `$env.X`
    #[error("unknown variable {0}")]
    Unknown(String),

    /// Expansion kept producing new references
    #[error("variable expansion too deep at {0} (cyclic definition?)")]
    TooDeep(String),
}

/// Errors from squelch rule parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SquelchError {
    /// Malformed tag list
    #[error(transparent)]
    Tag(#[from] TagError),

    /// Tag value is not a valid regular expression
    #[error("squelch {key}: {message}")]
    Regex { key: String, message: String },

    /// Rule with no tags, which would match every instance
    #[error("empty squelch")]
    Empty,
}

/// Errors from the static expression front-end
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// Malformed expression text
    #[error("expr: syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// Call to a function that is not a builtin
    #[error("expr: unknown function {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("expr: {func}: expected {expected} arguments, got {got}")]
    Arity {
        func: String,
        expected: usize,
        got: usize,
    },

    /// Argument of the wrong type
    #[error("expr: {func}: argument {index} expected {expected}, got {got}")]
    ArgType {
        func: String,
        index: usize,
        expected: ValueType,
        got: ValueType,
    },

    /// Operator applied to a value it does not support
    #[error("expr: operator {op} cannot be applied to {operand}")]
    Operand { op: String, operand: ValueType },

    /// Operands of a binary operation group by incompatible tags
    #[error("expr: mismatched tags {left} and {right}")]
    MismatchedTags { left: String, right: String },

    /// `lookup()` referencing a table that does not exist
    #[error("bad lookup table {0}")]
    BadLookup(String),

    /// Query string that cannot be understood
    #[error("expr: bad query {0:?}")]
    BadQuery(String),
}

/// Errors from the notification template engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Template text could not be compiled
    #[error("template: {name}: {message}")]
    Parse { name: String, message: String },

    /// Template failed while rendering
    #[error("template: {name}: executing: {message}")]
    Exec { name: String, message: String },
}

/// Errors from notification delivery
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Building or sending an email failed
    #[error("email: {0}")]
    Email(String),

    /// HTTP request could not be performed
    #[error("http: {0}")]
    Http(String),

    /// HTTP request completed with a non-success status
    #[error("bad response from {url}: {status}")]
    BadStatus { url: String, status: u16 },

    /// Body template failed to render
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Notification name that does not exist in the configuration
    #[error("unknown notification {0}")]
    UnknownNotification(String),
}

/// Errors from settings parsing and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Invalid config value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
