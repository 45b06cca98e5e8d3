//! Notify command implementation
//!
//! Renders an alert's template for one instance and delivers it to the
//! alert's notifications, or only reports what would be sent.

use crate::cli::args::{NotifyArgs, OutputFormat};
use crate::cli::output::{print_output, NotifyReport};
use crate::commands::{find_alert, load_conf, parse_tags};
use crate::config::Config;
use crate::error::{NotifyError, Result};
use crate::notify::{Dispatcher, HttpClient, Message, SmtpMailer, Status};
use std::sync::Arc;

/// Execute the notify command
pub fn run_notify(args: &NotifyArgs, settings: &Config, format: OutputFormat) -> Result<()> {
    let conf = load_conf(settings)?;
    let alert = find_alert(&conf, &args.alert)?;
    let tags = parse_tags(&args.tags)?;

    let message = Message::for_alert(&conf, &alert, &tags, args.status).map_err(NotifyError::from)?;
    let mut report = NotifyReport::new(&message, args.status.to_string());
    report.dry_run = args.dry_run;

    if args.dry_run {
        report.squelched = conf.squelched(&alert, &tags);
        if !report.squelched {
            let ns = match args.status {
                Status::Warning => &alert.warn_notification,
                Status::Critical | Status::Unknown => &alert.crit_notification,
            };
            report.notifications = ns.get(&conf, &tags)?.into_keys().collect();
        }
        print_output(&report, format)?;
        return Ok(());
    }

    let mailer = SmtpMailer::from_conf(&conf, settings.notify.smtp_timeout());
    let http = HttpClient::new(settings.notify.http_timeout())?;
    let dispatcher = Dispatcher::new(Arc::new(mailer), Arc::new(http));

    let fired = dispatcher.fire(&conf, &alert, &tags, args.status)?;
    report.squelched = fired.squelched;
    report.notifications = fired.notifications.clone();
    fired.wait();

    let stats = dispatcher.stats().snapshot();
    if stats.total_failed() > 0 {
        log::warn!("{} deliveries failed", stats.total_failed());
    }
    report.stats = Some(stats);
    print_output(&report, format)?;
    Ok(())
}
