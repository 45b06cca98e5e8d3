//! Squelched command implementation

use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, SquelchResult};
use crate::commands::{find_alert, load_conf, parse_tags};
use crate::config::Config;
use crate::error::Result;

/// Execute the squelched command
pub fn run_squelched(alert: &str, tags: &str, settings: &Config, format: OutputFormat) -> Result<()> {
    let conf = load_conf(settings)?;
    let alert = find_alert(&conf, alert)?;
    let tags = parse_tags(tags)?;

    let result = SquelchResult {
        alert: alert.name.clone(),
        tags: tags.to_string(),
        squelched: conf.squelched(&alert, &tags),
    };
    print_output(&result, format)?;
    Ok(())
}
