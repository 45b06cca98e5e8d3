//! alertconf - Bosun-style alert configuration library
//!
//! Loads and validates alert configuration files: global settings,
//! templates, notifications, macros, lookups and alerts, with `$variable`
//! expansion, static expression checking and notification dispatch.
//!
//! # Modules
//!
//! - [`cli`]: Command-line interface definitions
//! - [`commands`]: Command handlers
//! - [`conf`]: Alert configuration loader
//! - [`config`]: Settings for the tool itself
//! - [`error`]: Error types
//! - [`expr`]: Static expression front-end
//! - [`notify`]: Notification dispatch
//! - [`opentsdb`]: Tag sets, durations and tag value patterns
//! - [`template`]: Notification template engine

pub mod cli;
pub mod commands;
pub mod conf;
pub mod config;
pub mod error;
pub mod expr;
pub mod notify;
pub mod opentsdb;
pub mod template;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use conf::Conf;
pub use error::{AppError, Result};
