//! Command handlers
//!
//! Each command handler loads the alert configuration named by the
//! settings and orchestrates the execution of a CLI command.

pub mod alerts;
pub mod check;
pub mod escalation;
pub mod lookup;
pub mod notify;
pub mod squelched;

pub use alerts::run_alerts;
pub use check::run_check;
pub use escalation::run_escalation;
pub use lookup::run_lookup;
pub use notify::run_notify;
pub use squelched::run_squelched;

use crate::conf::{Alert, Conf};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::opentsdb::TagSet;
use std::sync::Arc;

/// Load the alert configuration at the configured path
pub(crate) fn load_conf(settings: &Config) -> Result<Conf> {
    let path = &settings.conf.path;
    log::debug!("Loading alert configuration from {}", path.display());
    let conf = Conf::load(path)?;
    log::debug!(
        "Loaded {} alerts, {} notifications",
        conf.alerts.len(),
        conf.notifications.len()
    );
    Ok(conf)
}

pub(crate) fn find_alert(conf: &Conf, name: &str) -> Result<Arc<Alert>> {
    conf.alerts
        .get(name)
        .cloned()
        .ok_or_else(|| AppError::NotFound {
            kind: "alert",
            name: name.to_string(),
        })
}

pub(crate) fn parse_tags(text: &str) -> Result<TagSet> {
    TagSet::parse(text).map_err(|e| AppError::InvalidArgument(e.to_string()))
}
