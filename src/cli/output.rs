//! Output formatting utilities
//!
//! Provides table and JSON output formatting for CLI commands.

use crate::cli::args::OutputFormat;
use crate::conf::{Alert, Conf, Notification};
use crate::notify::{Message, StatsSnapshot};
use crate::opentsdb::{format_duration, format_keys};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Format and print output based on the selected format
pub fn print_output<T: Serialize + TableDisplay>(data: &T, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Table => {
            writeln!(handle, "{}", data.to_table())?;
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
            writeln!(handle, "{}", json)?;
        }
        OutputFormat::Compact => {
            writeln!(handle, "{}", data.to_compact())?;
        }
    }

    Ok(())
}

/// Trait for types that can be displayed as a table
pub trait TableDisplay {
    /// Format as a table string
    fn to_table(&self) -> String;

    /// Format as a compact single line
    fn to_compact(&self) -> String {
        self.to_table().trim_end().replace('\n', " | ")
    }
}

/// What a loaded configuration defines
#[derive(Debug, Clone, Serialize)]
pub struct ConfSummary {
    pub name: String,
    pub check_frequency: String,
    pub alerts: usize,
    pub templates: usize,
    pub notifications: usize,
    pub macros: usize,
    pub lookups: usize,
    pub squelch_rules: usize,
}

impl From<&Conf> for ConfSummary {
    fn from(conf: &Conf) -> Self {
        Self {
            name: conf.name.clone(),
            check_frequency: format_duration(conf.check_frequency),
            alerts: conf.alerts.len(),
            templates: conf.templates.len(),
            notifications: conf.notifications.len(),
            macros: conf.macros.len(),
            lookups: conf.lookups.len(),
            squelch_rules: conf.squelch.len(),
        }
    }
}

impl TableDisplay for ConfSummary {
    fn to_table(&self) -> String {
        let mut output = format!("{}: OK\n", self.name);
        output.push_str(&format!("  Check Frequency: {}\n", self.check_frequency));
        output.push_str(&format!("  Alerts:          {}\n", self.alerts));
        output.push_str(&format!("  Templates:       {}\n", self.templates));
        output.push_str(&format!("  Notifications:   {}\n", self.notifications));
        output.push_str(&format!("  Macros:          {}\n", self.macros));
        output.push_str(&format!("  Lookups:         {}\n", self.lookups));
        output.push_str(&format!("  Squelch Rules:   {}\n", self.squelch_rules));
        output
    }

    fn to_compact(&self) -> String {
        format!(
            "{}: {} alerts, {} templates, {} notifications",
            self.name, self.alerts, self.templates, self.notifications
        )
    }
}

/// One alert for display
#[derive(Debug, Clone, Serialize)]
pub struct AlertEntry {
    pub name: String,
    pub crit: Option<String>,
    pub warn: Option<String>,
    pub tags: String,
    pub returns: String,
    pub template: Option<String>,
    pub crit_notifications: usize,
    pub warn_notifications: usize,
    pub run_every: u32,
}

impl From<&Alert> for AlertEntry {
    fn from(alert: &Alert) -> Self {
        Self {
            name: alert.name.clone(),
            crit: alert.crit.as_ref().map(|e| e.text().to_string()),
            warn: alert.warn.as_ref().map(|e| e.text().to_string()),
            tags: format_keys(&alert.tags),
            returns: alert.return_type.to_string(),
            template: alert.template.as_ref().map(|t| t.name.clone()),
            crit_notifications: alert.crit_notification.len(),
            warn_notifications: alert.warn_notification.len(),
            run_every: alert.run_every,
        }
    }
}

impl TableDisplay for AlertEntry {
    fn to_table(&self) -> String {
        let mut output = format!("{} {} ({})\n", self.name, self.tags, self.returns);
        if let Some(crit) = &self.crit {
            output.push_str(&format!("  crit: {}\n", crit));
        }
        if let Some(warn) = &self.warn {
            output.push_str(&format!("  warn: {}\n", warn));
        }
        if let Some(t) = &self.template {
            output.push_str(&format!("  template: {}\n", t));
        }
        output.push_str(&format!(
            "  notifications: {} crit, {} warn\n",
            self.crit_notifications, self.warn_notifications
        ));
        output
    }

    fn to_compact(&self) -> String {
        format!("{}{}", self.name, self.tags)
    }
}

/// Alerts in declaration order
#[derive(Debug, Clone, Serialize)]
pub struct AlertList {
    pub alerts: Vec<AlertEntry>,
}

impl TableDisplay for AlertList {
    fn to_table(&self) -> String {
        let mut output = format!("Alerts: {}\n\n", self.alerts.len());
        for alert in &self.alerts {
            output.push_str(&alert.to_table());
        }
        output
    }

    fn to_compact(&self) -> String {
        self.alerts
            .iter()
            .map(|a| a.to_compact())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Alert names grouped by notification
#[derive(Debug, Clone, Serialize)]
pub struct NotificationIndex {
    pub notifications: BTreeMap<String, Vec<String>>,
}

impl TableDisplay for NotificationIndex {
    fn to_table(&self) -> String {
        let mut output = String::new();
        for (name, alerts) in &self.notifications {
            output.push_str(&format!("{}: {}\n", name, alerts.join(", ")));
        }
        output
    }
}

/// Result of a lookup query
#[derive(Debug, Clone, Serialize)]
pub struct LookupResult {
    pub table: String,
    pub tags: String,
    pub key: String,
    pub value: Option<String>,
}

impl TableDisplay for LookupResult {
    fn to_table(&self) -> String {
        match &self.value {
            Some(v) => format!("{}[{}] {} = {}", self.table, self.tags, self.key, v),
            None => format!("{}[{}] {}: no match", self.table, self.tags, self.key),
        }
    }

    fn to_compact(&self) -> String {
        self.value.clone().unwrap_or_default()
    }
}

/// Result of a squelch query
#[derive(Debug, Clone, Serialize)]
pub struct SquelchResult {
    pub alert: String,
    pub tags: String,
    pub squelched: bool,
}

impl TableDisplay for SquelchResult {
    fn to_table(&self) -> String {
        let state = if self.squelched {
            "squelched"
        } else {
            "not squelched"
        };
        format!("{}{}: {}", self.alert, self.tags, state)
    }

    fn to_compact(&self) -> String {
        self.squelched.to_string()
    }
}

/// One step of an escalation chain
#[derive(Debug, Clone, Serialize)]
pub struct EscalationStep {
    pub name: String,
    pub channels: Vec<String>,
    pub timeout: Option<String>,
}

impl From<&Notification> for EscalationStep {
    fn from(n: &Notification) -> Self {
        let mut channels: Vec<String> = n.email.iter().map(|m| format!("email {}", m.email)).collect();
        if let Some(url) = &n.post {
            channels.push(format!("post {}", url));
        }
        if let Some(url) = &n.get {
            channels.push(format!("get {}", url));
        }
        if n.print {
            channels.push("print".to_string());
        }
        Self {
            name: n.name.clone(),
            channels,
            timeout: n.timeout.map(format_duration),
        }
    }
}

/// A notification and everything it escalates to
#[derive(Debug, Clone, Serialize)]
pub struct EscalationChain {
    pub steps: Vec<EscalationStep>,
}

impl TableDisplay for EscalationChain {
    fn to_table(&self) -> String {
        let mut output = String::new();
        for (i, step) in self.steps.iter().enumerate() {
            output.push_str(&format!("{}. {}", i + 1, step.name));
            if let Some(t) = &step.timeout {
                output.push_str(&format!(" (after {})", t));
            }
            output.push('\n');
            for channel in &step.channels {
                output.push_str(&format!("     {}\n", channel));
            }
        }
        output
    }

    fn to_compact(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Outcome of the notify command
#[derive(Debug, Clone, Serialize)]
pub struct NotifyReport {
    pub alert_key: String,
    pub status: String,
    pub squelched: bool,
    pub subject: String,
    pub body: String,
    pub notifications: Vec<String>,
    pub dry_run: bool,
    pub stats: Option<StatsSnapshot>,
}

impl NotifyReport {
    pub fn new(message: &Message, status: String) -> Self {
        Self {
            alert_key: message.alert_key.clone(),
            status,
            squelched: false,
            subject: message.subject.clone(),
            body: message.body.clone(),
            notifications: Vec::new(),
            dry_run: false,
            stats: None,
        }
    }
}

impl TableDisplay for NotifyReport {
    fn to_table(&self) -> String {
        let mut output = format!("{} ({})\n", self.alert_key, self.status);
        if self.squelched {
            output.push_str("  squelched, nothing sent\n");
            return output;
        }
        output.push_str(&format!("  Subject: {}\n", self.subject));
        if !self.body.is_empty() {
            output.push_str("  Body:\n");
            for line in self.body.lines() {
                output.push_str(&format!("    {}\n", line));
            }
        }
        let verb = if self.dry_run { "Would notify" } else { "Notified" };
        output.push_str(&format!("  {}: {}\n", verb, self.notifications.join(", ")));
        if let Some(stats) = &self.stats {
            output.push_str(&format!("  Failed deliveries: {}\n", stats.total_failed()));
        }
        output
    }

    fn to_compact(&self) -> String {
        format!("{} {}", self.alert_key, self.notifications.join(","))
    }
}
