//! Lookup command implementation

use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, LookupResult};
use crate::commands::{load_conf, parse_tags};
use crate::config::Config;
use crate::error::{AppError, Result};

/// Execute the lookup command
pub fn run_lookup(
    table: &str,
    tags: &str,
    key: &str,
    settings: &Config,
    format: OutputFormat,
) -> Result<()> {
    let conf = load_conf(settings)?;
    let tags = parse_tags(tags)?;

    let lookup = conf.lookups.get(table).ok_or_else(|| AppError::NotFound {
        kind: "lookup",
        name: table.to_string(),
    })?;

    let result = LookupResult {
        table: table.to_string(),
        tags: tags.tag_string(),
        key: key.to_string(),
        value: lookup.get(key, &tags).map(str::to_string),
    };
    print_output(&result, format)?;
    Ok(())
}
