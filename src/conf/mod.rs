//! Alert configuration loading
//!
//! [`Conf::new`] parses configuration text into a [`Conf`]: global
//! settings plus named templates, alerts, notifications, macros and lookup
//! tables. Sections may only refer to sections defined above them. Loading
//! stops at the first error and never yields a partial configuration.

mod alert;
pub mod expand;
mod lookup;
mod macros;
mod notification;
pub mod parse;
pub mod squelch;
mod template;

pub use alert::{alerts_by_notification, Alert, Notifications};
pub use expand::{expand, Vars, MAX_EXPAND_DEPTH};
pub use lookup::{Entry, Lookup};
pub use macros::Macro;
pub use notification::{Notification, DEFAULT_CONTENT_TYPE};
pub use squelch::{Squelch, Squelches};
pub use template::Template;

use crate::error::{ConfError, ExpandError, NotifyError};
use crate::opentsdb::{parse_duration, TagSet};
use log::debug;
use parse::{Located, Node, PairNode, SectionNode, Tree};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Keys that may appear more than once in one section (or globally)
const REPEATABLE_KEYS: &[&str] = &["squelch", "critNotification", "warnNotification", "graphiteHeader"];

/// A loaded alert configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Conf {
    /// File name used in error messages
    pub name: String,
    pub check_frequency: Duration,
    pub default_run_every: u32,
    pub http_listen: String,
    pub relay_listen: String,
    pub hostname: String,
    pub tsdb_host: String,
    pub graphite_host: String,
    pub graphite_headers: Vec<String>,
    pub elastic_hosts: Vec<String>,
    pub logstash_elastic_hosts: Vec<String>,
    pub smtp_host: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub email_from: String,
    pub state_file: String,
    pub redis_host: String,
    pub ping: bool,
    pub ping_duration: Duration,
    pub no_sleep: bool,
    pub response_limit: u64,
    pub search_since: Duration,
    pub unknown_threshold: u32,
    pub min_group_size: u32,
    pub time_and_date: Vec<i32>,
    pub short_url_key: String,
    pub internet_proxy: String,
    pub unknown_template: Option<Arc<Template>>,

    pub templates: HashMap<String, Arc<Template>>,
    pub alerts: HashMap<String, Arc<Alert>>,
    pub notifications: HashMap<String, Arc<Notification>>,
    pub macros: HashMap<String, Macro>,
    pub lookups: HashMap<String, Lookup>,
    pub squelch: Squelches,
    /// Global variables, stored both as `$name` and `name`
    pub vars: Vars,

    ordered_alerts: Vec<Arc<Alert>>,
    raw_text: String,
}

impl Conf {
    fn empty(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            check_frequency: Duration::from_secs(5 * 60),
            default_run_every: 1,
            http_listen: ":8070".to_string(),
            relay_listen: ":4242".to_string(),
            hostname: String::new(),
            tsdb_host: String::new(),
            graphite_host: String::new(),
            graphite_headers: Vec::new(),
            elastic_hosts: Vec::new(),
            logstash_elastic_hosts: Vec::new(),
            smtp_host: String::new(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            email_from: String::new(),
            state_file: "bosun.state".to_string(),
            redis_host: String::new(),
            ping: false,
            ping_duration: Duration::from_secs(24 * 60 * 60),
            no_sleep: false,
            response_limit: 1 << 20,
            search_since: Duration::from_secs(3 * 24 * 60 * 60),
            unknown_threshold: 5,
            min_group_size: 5,
            time_and_date: Vec::new(),
            short_url_key: String::new(),
            internet_proxy: String::new(),
            unknown_template: None,
            templates: HashMap::new(),
            alerts: HashMap::new(),
            notifications: HashMap::new(),
            macros: HashMap::new(),
            lookups: HashMap::new(),
            squelch: Squelches::new(),
            vars: Vars::new(),
            ordered_alerts: Vec::new(),
            raw_text: text.to_string(),
        }
    }

    /// Parse configuration text
    ///
    /// `name` is only used to label errors.
    ///
    /// # Errors
    /// The first syntax, expansion or validation error, with its location.
    pub fn new(name: &str, text: &str) -> Result<Conf, ConfError> {
        let tree = Tree::parse(name, text)?;
        let mut loader = Loader {
            file: name,
            conf: Conf::empty(name, text),
            unknown_template: None,
        };
        let mut seen = HashSet::new();
        for node in &tree.nodes {
            match node {
                Node::Pair(pair) => {
                    loader.seen(pair, &pair.key, &mut seen)?;
                    loader.load_global(pair)?;
                }
                Node::Section(section) => loader.load_section(section)?,
            }
        }
        loader.finish()
    }

    /// Read and parse a configuration file
    ///
    /// # Errors
    /// IO failures are reported as a `ConfError` naming the file.
    pub fn load(path: &Path) -> Result<Conf, ConfError> {
        let name = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| ConfError::General {
            file: name.clone(),
            message: e.to_string(),
        })?;
        Conf::new(&name, &text)
    }

    /// Alerts in declaration order
    pub fn ordered_alerts(&self) -> &[Arc<Alert>] {
        &self.ordered_alerts
    }

    /// The configuration text this was loaded from
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Expand variables against the global vars and `locals`
    ///
    /// # Errors
    /// See [`expand::expand`].
    pub fn expand(
        &self,
        text: &str,
        locals: Option<&Vars>,
        ignore_bad_expand: bool,
    ) -> Result<String, ExpandError> {
        expand(text, locals, &self.vars, ignore_bad_expand)
    }

    /// Whether an instance of `alert` with `tags` is suppressed, either by
    /// a global or by an alert squelch rule
    pub fn squelched(&self, alert: &Alert, tags: &TagSet) -> bool {
        self.squelch.squelched(tags) || alert.squelch.squelched(tags)
    }

    /// Follow the `next` chain starting at `name`
    ///
    /// The walk stops at the first notification without `next` or at the
    /// first one already visited, so loops yield each step once.
    ///
    /// # Errors
    /// `NotifyError::UnknownNotification` if `name` is not defined.
    pub fn escalation(&self, name: &str) -> Result<Vec<Arc<Notification>>, NotifyError> {
        let mut chain: Vec<Arc<Notification>> = Vec::new();
        let mut current = Some(name.to_string());
        while let Some(next) = current {
            if chain.iter().any(|n| n.name == next) {
                break;
            }
            let n = self
                .notifications
                .get(&next)
                .ok_or_else(|| NotifyError::UnknownNotification(next.clone()))?;
            current = n.next.clone();
            chain.push(Arc::clone(n));
        }
        Ok(chain)
    }

    /// Resolve a comma separated list of notification names
    ///
    /// # Errors
    /// `NotifyError::UnknownNotification` for the first unknown name.
    pub fn parse_notifications(
        &self,
        list: &str,
    ) -> Result<HashMap<String, Arc<Notification>>, NotifyError> {
        let mut out = HashMap::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let n = self
                .notifications
                .get(name)
                .ok_or_else(|| NotifyError::UnknownNotification(name.to_string()))?;
            out.insert(name.to_string(), Arc::clone(n));
        }
        Ok(out)
    }
}

/// One `key = value` of a section after macro inlining and expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SectionPair {
    pub node: PairNode,
    pub key: String,
    pub val: String,
}

/// Mutable state while a configuration is being built
pub(crate) struct Loader<'a> {
    file: &'a str,
    conf: Conf,
    unknown_template: Option<(PairNode, String)>,
}

impl Loader<'_> {
    pub(crate) fn error(&self, node: &dyn Located, message: impl Into<String>) -> ConfError {
        let pos = node.pos();
        ConfError::At {
            file: self.file.to_string(),
            line: pos.line,
            col: pos.col,
            context: node.context(),
            message: message.into(),
        }
    }

    pub(crate) fn expand(
        &self,
        node: &dyn Located,
        text: &str,
        locals: Option<&Vars>,
        ignore_bad_expand: bool,
    ) -> Result<String, ConfError> {
        self.conf
            .expand(text, locals, ignore_bad_expand)
            .map_err(|e| self.error(node, e.to_string()))
    }

    /// Record `key` as seen in one scope; repeats are errors except for
    /// the keys that accumulate
    pub(crate) fn seen(
        &self,
        node: &dyn Located,
        key: &str,
        seen: &mut HashSet<String>,
    ) -> Result<(), ConfError> {
        if !seen.insert(key.to_string()) && !REPEATABLE_KEYS.contains(&key) {
            return Err(self.error(node, format!("duplicate key: {}", key)));
        }
        Ok(())
    }

    /// Collect the pairs of a section, inlining macros
    ///
    /// `$`-keys are stored in `vars` (when given) instead of being
    /// returned. Values are expanded with `vars` in scope, so a variable
    /// must be defined before it is used.
    pub(crate) fn section_pairs(
        &self,
        s: &SectionNode,
        mut vars: Option<&mut Vars>,
        ignore_bad_expand: bool,
    ) -> Result<Vec<SectionPair>, ConfError> {
        let mut pairs = Vec::new();
        let mut seen = HashSet::new();

        for node in &s.nodes {
            let Node::Pair(pair) = node else {
                return Err(self.error(node, "unexpected node"));
            };
            let value = self.expand(pair, &pair.val, vars.as_deref(), ignore_bad_expand)?;

            let inlined: Vec<(PairNode, String, String)> = if pair.key == "macro" {
                let m = self
                    .conf
                    .macros
                    .get(&value)
                    .ok_or_else(|| self.error(pair, format!("macro not found: {}", value)))?;
                let mut out = Vec::with_capacity(m.pairs.len());
                for p in &m.pairs {
                    let v = self.expand(pair, &p.val, vars.as_deref(), ignore_bad_expand)?;
                    out.push((p.node.clone(), p.key.clone(), v));
                }
                out
            } else {
                vec![(pair.clone(), pair.key.clone(), value)]
            };

            for (node, key, val) in inlined {
                self.seen(pair, &key, &mut seen)?;
                match vars.as_deref_mut() {
                    Some(vars) if key.starts_with('$') => {
                        vars.insert(key[1..].to_string(), val.clone());
                        vars.insert(key, val);
                    }
                    _ => pairs.push(SectionPair { node, key, val }),
                }
            }
        }
        Ok(pairs)
    }

    fn load_section(&mut self, s: &SectionNode) -> Result<(), ConfError> {
        debug!("loading {} {}", s.section_type, s.name);
        match s.section_type.as_str() {
            "template" => self.load_template(s),
            "alert" => self.load_alert(s),
            "notification" => self.load_notification(s),
            "macro" => self.load_macro(s),
            "lookup" => self.load_lookup(s),
            other => Err(self.error(s, format!("unknown section type: {}", other))),
        }
    }

    fn load_global(&mut self, p: &PairNode) -> Result<(), ConfError> {
        let v = self.expand(p, &p.val, None, false)?;
        let duration = |v: &str| parse_duration(v).map_err(|e| self.error(p, e.to_string()));
        let integer = |v: &str| {
            v.trim()
                .parse::<i64>()
                .map_err(|e| self.error(p, format!("{}: {}", p.key, e)))
        };
        let list = |v: &str| -> Vec<String> {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        match p.key.as_str() {
            "checkFrequency" => {
                let d = duration(&v)?;
                if d < Duration::from_secs(1) {
                    return Err(self.error(p, "checkFrequency duration must be at least 1s"));
                }
                self.conf.check_frequency = d;
            }
            "defaultRunEvery" => {
                let n = integer(&v)?;
                if n <= 0 {
                    return Err(self.error(p, "defaultRunEvery must be greater than 0"));
                }
                self.conf.default_run_every =
                    u32::try_from(n).map_err(|e| self.error(p, e.to_string()))?;
            }
            "httpListen" => self.conf.http_listen = v,
            "relayListen" => self.conf.relay_listen = v,
            "hostname" => self.conf.hostname = v,
            "tsdbHost" => self.conf.tsdb_host = v,
            "graphiteHost" => self.conf.graphite_host = v,
            "graphiteHeader" => {
                if !v.contains(':') {
                    return Err(self.error(p, "graphiteHeader must be in key:value form"));
                }
                self.conf.graphite_headers.push(v);
            }
            "elasticHosts" => self.conf.elastic_hosts = list(&v),
            "logstashElasticHosts" => self.conf.logstash_elastic_hosts = list(&v),
            "smtpHost" => self.conf.smtp_host = v,
            "smtpUsername" => self.conf.smtp_username = v,
            "smtpPassword" => self.conf.smtp_password = v,
            "emailFrom" => self.conf.email_from = v,
            "stateFile" => self.conf.state_file = v,
            "redisHost" => self.conf.redis_host = v,
            "ping" => self.conf.ping = true,
            "noSleep" => self.conf.no_sleep = true,
            "pingDuration" => self.conf.ping_duration = duration(&v)?,
            "responseLimit" => {
                let n = integer(&v)?;
                if n <= 0 {
                    return Err(self.error(p, "responseLimit must be > 0"));
                }
                self.conf.response_limit = n as u64;
            }
            "searchSince" => self.conf.search_since = duration(&v)?,
            "unknownThreshold" => {
                self.conf.unknown_threshold = u32::try_from(integer(&v)?)
                    .map_err(|_| self.error(p, "unknownThreshold must be >= 0"))?;
            }
            "minGroupSize" => {
                self.conf.min_group_size = u32::try_from(integer(&v)?)
                    .map_err(|_| self.error(p, "minGroupSize must be >= 0"))?;
            }
            "timeAndDate" => {
                let mut zones = Vec::new();
                for item in list(&v) {
                    let n = integer(&item)?;
                    zones.push(i32::try_from(n).map_err(|e| self.error(p, e.to_string()))?);
                }
                self.conf.time_and_date = zones;
            }
            "shortURLKey" => self.conf.short_url_key = v,
            "internetProxy" => self.conf.internet_proxy = v,
            "unknownTemplate" => self.unknown_template = Some((p.clone(), v)),
            "squelch" => {
                let result = self.conf.squelch.add(&v);
                result.map_err(|e| self.error(p, e.to_string()))?;
            }
            key if key.starts_with('$') => {
                self.conf.vars.insert(key[1..].to_string(), v.clone());
                self.conf.vars.insert(key.to_string(), v);
            }
            key => return Err(self.error(p, format!("unknown key {}", key))),
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Conf, ConfError> {
        if let Some((node, name)) = self.unknown_template.take() {
            let t = self
                .conf
                .templates
                .get(&name)
                .cloned()
                .ok_or_else(|| self.error(&node, format!("unknown template {}", name)))?;
            self.conf.unknown_template = Some(t);
        }
        debug!(
            "loaded {}: {} alerts, {} notifications, {} templates, {} lookups",
            self.file,
            self.conf.alerts.len(),
            self.conf.notifications.len(),
            self.conf.templates.len(),
            self.conf.lookups.len()
        );
        Ok(self.conf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let conf = Conf::new("empty.conf", "").unwrap();
        assert_eq!(conf.check_frequency, Duration::from_secs(300));
        assert_eq!(conf.default_run_every, 1);
        assert_eq!(conf.http_listen, ":8070");
        assert_eq!(conf.relay_listen, ":4242");
        assert_eq!(conf.state_file, "bosun.state");
        assert_eq!(conf.response_limit, 1 << 20);
        assert_eq!(conf.unknown_threshold, 5);
        assert_eq!(conf.min_group_size, 5);
        assert!(conf.ordered_alerts().is_empty());
    }

    #[test]
    fn test_global_settings() {
        let text = "\
tsdbHost = localhost:4242
checkFrequency = 1m
defaultRunEvery = 5
smtpHost = mail.example.com:25
emailFrom = bosun@example.com
ping = true
timeAndDate = 202, 75
elasticHosts = http://a:9200, http://b:9200
responseLimit = 2048
";
        let conf = Conf::new("g.conf", text).unwrap();
        assert_eq!(conf.tsdb_host, "localhost:4242");
        assert_eq!(conf.check_frequency, Duration::from_secs(60));
        assert_eq!(conf.default_run_every, 5);
        assert_eq!(conf.smtp_host, "mail.example.com:25");
        assert!(conf.ping);
        assert_eq!(conf.time_and_date, vec![202, 75]);
        assert_eq!(conf.elastic_hosts.len(), 2);
        assert_eq!(conf.response_limit, 2048);
    }

    #[test]
    fn test_global_validation() {
        let cases = [
            ("checkFrequency = 500ms\n", "checkFrequency duration must be at least 1s"),
            ("defaultRunEvery = 0\n", "defaultRunEvery must be greater than 0"),
            ("responseLimit = -1\n", "responseLimit must be > 0"),
            ("graphiteHeader = nocolon\n", "graphiteHeader must be in key:value form"),
            ("bogus = 1\n", "unknown key bogus"),
            ("tsdbHost = a\ntsdbHost = b\n", "duplicate key: tsdbHost"),
        ];
        for (text, message) in cases {
            let err = Conf::new("v.conf", text).unwrap_err();
            assert_eq!(err.message(), message, "{}", text);
        }
    }

    #[test]
    fn test_error_location() {
        let err = Conf::new("loc.conf", "tsdbHost = a\n  bogus = 1\n").unwrap_err();
        assert_eq!(err.to_string(), "conf: loc.conf:2:3: at <bogus = 1>: unknown key bogus");
    }

    #[test]
    fn test_global_vars() {
        let conf = Conf::new("v.conf", "$host = ny-tsdb01\ntsdbHost = ${host}:4242\n").unwrap();
        assert_eq!(conf.tsdb_host, "ny-tsdb01:4242");
        assert_eq!(conf.vars.get("$host").map(String::as_str), Some("ny-tsdb01"));
        assert_eq!(conf.vars.get("host").map(String::as_str), Some("ny-tsdb01"));
    }

    #[test]
    fn test_undefined_variable() {
        let err = Conf::new("v.conf", "tsdbHost = $nope\n").unwrap_err();
        assert_eq!(err.message(), "unknown variable $nope");
    }

    #[test]
    fn test_repeated_global_squelch() {
        let conf = Conf::new("s.conf", "squelch = host=a\nsquelch = host=b\n").unwrap();
        assert_eq!(conf.squelch.len(), 2);
        assert!(conf.squelch.squelched(&TagSet::parse("host=b").unwrap()));
    }

    #[test]
    fn test_empty_global_squelch_is_rejected() {
        let err = Conf::new("s.conf", "squelch =\n").unwrap_err();
        assert_eq!(err.message(), "empty squelch");
    }

    #[test]
    fn test_unknown_section_type() {
        let err = Conf::new("s.conf", "widget w {\n}\n").unwrap_err();
        assert_eq!(err.message(), "unknown section type: widget");
    }

    #[test]
    fn test_unknown_template_checked_after_load() {
        let text = "unknownTemplate = u\ntemplate u {\n subject = unknown\n}\n";
        let conf = Conf::new("u.conf", text).unwrap();
        assert_eq!(conf.unknown_template.as_ref().unwrap().name, "u");

        let err = Conf::new("u.conf", "unknownTemplate = missing\n").unwrap_err();
        assert_eq!(err.message(), "unknown template missing");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bosun.conf");
        std::fs::write(&path, "tsdbHost = localhost:4242\n").unwrap();
        let conf = Conf::load(&path).unwrap();
        assert_eq!(conf.tsdb_host, "localhost:4242");
        assert!(Conf::load(&dir.path().join("missing.conf")).is_err());
    }
}
