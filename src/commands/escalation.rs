//! Escalation command implementation
//!
//! Follows the `next` chain of a notification.

use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, EscalationChain, EscalationStep};
use crate::commands::load_conf;
use crate::config::Config;
use crate::error::Result;

/// Execute the escalation command
pub fn run_escalation(notification: &str, settings: &Config, format: OutputFormat) -> Result<()> {
    let conf = load_conf(settings)?;
    let chain = EscalationChain {
        steps: conf
            .escalation(notification)?
            .iter()
            .map(|n| EscalationStep::from(n.as_ref()))
            .collect(),
    };
    print_output(&chain, format)?;
    Ok(())
}
