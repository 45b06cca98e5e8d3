//! CLI argument definitions using clap derive
//!
//! Defines all command-line arguments and subcommands.

use crate::notify::Status;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Bosun-style alert configuration tool
///
/// Load, validate and inspect alert configuration files and send test
/// notifications.
#[derive(Parser, Debug)]
#[command(name = "alertconf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Path to settings file
    #[arg(short, long, global = true, env = "ALERTCONF_CONFIG")]
    pub config: Option<String>,

    /// Path to the alert configuration file
    #[arg(long, global = true, env = "ALERTCONF_CONF")]
    pub conf: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the configuration and report what it defines
    Check,

    /// List alerts in declaration order
    Alerts(AlertsArgs),

    /// Resolve a lookup table value for a tag set
    Lookup {
        /// Lookup table name
        table: String,

        /// Tag set, e.g. host=web01,cluster=a
        tags: String,

        /// Value key within the matching entry
        key: String,
    },

    /// Check whether an alert instance is squelched
    Squelched {
        /// Alert name
        alert: String,

        /// Tag set, e.g. host=web01
        tags: String,
    },

    /// Show the escalation chain starting at a notification
    Escalation {
        /// Notification name
        notification: String,
    },

    /// Render and send the notifications for an alert instance
    Notify(NotifyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the alerts command
#[derive(Parser, Debug)]
pub struct AlertsArgs {
    /// Group alert names by the notifications they can reach
    #[arg(long)]
    pub by_notification: bool,
}

/// Arguments for the notify command
#[derive(Parser, Debug)]
pub struct NotifyArgs {
    /// Alert name
    pub alert: String,

    /// Tag set of the instance, e.g. host=web01
    #[arg(short, long, default_value = "")]
    pub tags: String,

    /// Severity to notify with
    #[arg(short, long, value_enum, default_value = "critical")]
    pub status: Status,

    /// Render the message without sending anything
    #[arg(long)]
    pub dry_run: bool,

    /// HTTP timeout in seconds, overriding the settings file
    #[arg(long)]
    pub http_timeout: Option<u64>,
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

/// Generate shell completions and print to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}
