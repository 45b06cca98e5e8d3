//! Alerts command implementation
//!
//! Lists alerts in declaration order or grouped by notification.

use crate::cli::args::{AlertsArgs, OutputFormat};
use crate::cli::output::{print_output, AlertEntry, AlertList, NotificationIndex};
use crate::commands::load_conf;
use crate::conf::alerts_by_notification;
use crate::config::Config;
use crate::error::Result;

/// Execute the alerts command
pub fn run_alerts(args: &AlertsArgs, settings: &Config, format: OutputFormat) -> Result<()> {
    let conf = load_conf(settings)?;

    if args.by_notification {
        let index = NotificationIndex {
            notifications: alerts_by_notification(&conf).into_iter().collect(),
        };
        print_output(&index, format)?;
        return Ok(());
    }

    let list = AlertList {
        alerts: conf
            .ordered_alerts()
            .iter()
            .map(|a| AlertEntry::from(a.as_ref()))
            .collect(),
    };
    print_output(&list, format)?;
    Ok(())
}
