//! Check command implementation
//!
//! Loads the alert configuration and reports what it defines.

use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, ConfSummary};
use crate::commands::load_conf;
use crate::config::Config;
use crate::error::Result;

/// Execute the check command
pub fn run_check(settings: &Config, format: OutputFormat) -> Result<()> {
    let conf = load_conf(settings)?;
    print_output(&ConfSummary::from(&conf), format)?;
    Ok(())
}
