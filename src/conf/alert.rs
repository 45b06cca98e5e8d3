//! `alert` sections
//!
//! Expressions are checked as they are read; the rules that relate
//! several keys to each other run once the whole section has been read,
//! so keys may appear in any order.

use super::notification::Notification;
use super::parse::SectionNode;
use super::squelch::Squelches;
use super::template::Template;
use super::{Conf, Loader, SectionPair, Vars};
use crate::error::{ConfError, NotifyError};
use crate::expr::{Expr, Tags, ValueType};
use crate::opentsdb::{format_keys, parse_duration, TagSet};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Notifications of one severity: literal names plus per-tag-set names
/// read from lookup tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notifications {
    /// Names given literally
    pub notifications: BTreeSet<String>,
    /// Lookup key to the table holding a notification list per tag set
    pub lookups: BTreeMap<String, String>,
}

impl Notifications {
    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty() && self.lookups.is_empty()
    }

    /// Number of literal names plus lookup references
    pub fn len(&self) -> usize {
        self.notifications.len() + self.lookups.len()
    }

    /// Notifications that apply to an instance with `tags`
    ///
    /// # Errors
    /// `NotifyError::UnknownNotification` if a name read from a lookup
    /// table does not exist.
    pub fn get(
        &self,
        conf: &Conf,
        tags: &TagSet,
    ) -> Result<BTreeMap<String, Arc<Notification>>, NotifyError> {
        let mut out = BTreeMap::new();
        for name in &self.notifications {
            let n = conf
                .notifications
                .get(name)
                .ok_or_else(|| NotifyError::UnknownNotification(name.clone()))?;
            out.insert(name.clone(), Arc::clone(n));
        }
        for (key, table) in &self.lookups {
            let Some(value) = conf.lookups.get(table).and_then(|l| l.get(key, tags)) else {
                continue;
            };
            out.extend(conf.parse_notifications(value)?);
        }
        Ok(out)
    }
}

/// A monitored condition
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub name: String,
    /// Source text of the section
    pub text: String,
    pub vars: Vars,
    pub crit: Option<Expr>,
    pub warn: Option<Expr>,
    pub depends: Option<Expr>,
    pub squelch: Squelches,
    pub template: Option<Arc<Template>>,
    pub crit_notification: Notifications,
    pub warn_notification: Notifications,
    pub unknown: Option<Duration>,
    pub ignore_unknown: bool,
    pub unjoined_ok: bool,
    pub log: bool,
    pub run_every: u32,
    /// Tag keys the alert's instances are grouped by
    pub tags: Tags,
    pub return_type: ValueType,
}

fn lookup_notification_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^lookup\("(.*)", "(.*)"\)$"#).expect("static regex"))
}

impl Loader<'_> {
    pub(super) fn load_alert(&mut self, s: &SectionNode) -> Result<(), ConfError> {
        let name = &s.name;
        if self.conf.alerts.contains_key(name) {
            return Err(self.error(s, format!("duplicate alert name: {}", name)));
        }

        let mut a = Alert {
            name: name.clone(),
            text: s.raw_text.clone(),
            vars: Vars::new(),
            crit: None,
            warn: None,
            depends: None,
            squelch: Squelches::new(),
            template: None,
            crit_notification: Notifications::default(),
            warn_notification: Notifications::default(),
            unknown: None,
            ignore_unknown: false,
            unjoined_ok: false,
            log: false,
            run_every: 0,
            tags: Tags::new(),
            return_type: ValueType::Number,
        };

        for p in self.section_pairs(s, Some(&mut a.vars), false)? {
            let v = p.val.as_str();
            match p.key.as_str() {
                "template" => {
                    let t = self
                        .conf
                        .templates
                        .get(v)
                        .ok_or_else(|| self.error(&p.node, format!("template not found {}", v)))?;
                    a.template = Some(Arc::clone(t));
                }
                "crit" => a.crit = Some(self.number_expr(&p)?),
                "warn" => a.warn = Some(self.number_expr(&p)?),
                "depends" => a.depends = Some(self.number_expr(&p)?),
                "squelch" => {
                    let result = a.squelch.add(v);
                    result.map_err(|e| self.error(&p.node, e.to_string()))?;
                }
                "critNotification" => self.add_notifications(&p, &mut a.crit_notification)?,
                "warnNotification" => self.add_notifications(&p, &mut a.warn_notification)?,
                "unknown" => {
                    let d = parse_duration(v).map_err(|e| self.error(&p.node, e.to_string()))?;
                    a.unknown = Some(d);
                }
                "ignoreUnknown" => a.ignore_unknown = true,
                "unjoinedOk" => a.unjoined_ok = true,
                "log" => a.log = true,
                "runEvery" => {
                    a.run_every = v
                        .trim()
                        .parse()
                        .map_err(|e| self.error(&p.node, format!("runEvery: {}", e)))?;
                }
                key => return Err(self.error(&p.node, format!("unknown key {}", key))),
            }
        }

        self.validate_alert(s, &mut a)?;
        if a.run_every == 0 {
            a.run_every = self.conf.default_run_every;
        }

        let a = Arc::new(a);
        self.conf.alerts.insert(name.clone(), Arc::clone(&a));
        self.conf.ordered_alerts.push(a);
        Ok(())
    }

    /// Check an expression that has to produce a number per group
    fn number_expr(&self, p: &SectionPair) -> Result<Expr, ConfError> {
        let e = Expr::new(&p.val, &self.conf.lookups).map_err(|e| self.error(&p.node, e.to_string()))?;
        match e.return_type() {
            ValueType::Number | ValueType::Scalar => Ok(e),
            _ => Err(self.error(&p.node, "expression must return a number")),
        }
    }

    fn add_notifications(&self, p: &SectionPair, ns: &mut Notifications) -> Result<(), ConfError> {
        let v = p.val.as_str();
        if let Some(caps) = lookup_notification_regex().captures(v) {
            let (table, key) = (&caps[1], &caps[2]);
            let lookup = self
                .conf
                .lookups
                .get(table)
                .ok_or_else(|| self.error(&p.node, format!("unknown lookup table {}", table)))?;
            for value in lookup.entries.iter().filter_map(|e| e.values.get(key)) {
                self.conf
                    .parse_notifications(value)
                    .map_err(|e| self.error(&p.node, format!("lookup {}: {}", value, e)))?;
            }
            ns.lookups.insert(key.to_string(), table.to_string());
            return Ok(());
        }

        let found = self
            .conf
            .parse_notifications(v)
            .map_err(|e| self.error(&p.node, e.to_string()))?;
        ns.notifications.extend(found.into_keys());
        Ok(())
    }

    fn validate_alert(&self, s: &SectionNode, a: &mut Alert) -> Result<(), ConfError> {
        let fail = |message: String| Err(self.error(s, message));

        let (tags, return_type) = match (&a.crit, &a.warn) {
            (None, None) => return fail("neither crit or warn specified".to_string()),
            (Some(c), Some(w)) => {
                if c.tags() != w.tags() {
                    return fail(format!(
                        "crit tags ({}) and warn tags ({}) must be equal",
                        format_keys(c.tags()),
                        format_keys(w.tags())
                    ));
                }
                if c.return_type() != w.return_type() {
                    return fail(format!(
                        "crit return type ({}) and warn return type ({}) must be equal",
                        c.return_type(),
                        w.return_type()
                    ));
                }
                (w.tags().clone(), w.return_type())
            }
            (Some(e), None) | (None, Some(e)) => (e.tags().clone(), e.return_type()),
        };

        if let Some(d) = &a.depends {
            if !d.tags().is_empty() && d.tags().is_disjoint(&tags) {
                return fail("Depends and crit/warn must share at least one tag.".to_string());
            }
        }

        if a.log {
            let chained = |ns: &Notifications| {
                ns.notifications
                    .iter()
                    .filter_map(|n| self.conf.notifications.get(n))
                    .any(|n| n.next.is_some())
            };
            if chained(&a.crit_notification) || chained(&a.warn_notification) {
                return fail("cannot use log with a chained notification".to_string());
            }
            if a.crit.is_some() && a.crit_notification.is_empty() {
                return fail("log + crit specified, but no critNotifications".to_string());
            }
            if a.warn.is_some() && a.warn_notification.is_empty() {
                return fail("log + warn specified, but no warnNotifications".to_string());
            }
        }
        if !a.warn_notification.is_empty() && a.warn.is_none() {
            return fail("warnNotification specified, but no warn".to_string());
        }
        if !a.crit_notification.is_empty() && a.crit.is_none() {
            return fail("critNotification specified, but no crit".to_string());
        }
        if a.template.is_none() && !(a.crit_notification.is_empty() && a.warn_notification.is_empty()) {
            return fail("notifications specified, but no template".to_string());
        }

        a.tags = tags;
        a.return_type = return_type;
        Ok(())
    }
}

/// Names of alerts grouped by the notification they use literally
pub fn alerts_by_notification(conf: &Conf) -> HashMap<String, Vec<String>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for a in conf.ordered_alerts() {
        let names = a
            .crit_notification
            .notifications
            .iter()
            .chain(&a.warn_notification.notifications)
            .collect::<BTreeSet<_>>();
        for n in names {
            out.entry(n.clone()).or_default().push(a.name.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
template t {
    subject = `{{.Alert.Name}}`
}
notification ops {
    print = true
}
notification chained {
    next = ops
    timeout = 5m
}
lookup route {
    entry host=ny-* {
        notify = ops
    }
    entry host=* {
        notify = ops,chained
    }
}
"#;

    fn conf_with(alert: &str) -> Result<Conf, ConfError> {
        Conf::new("a.conf", &format!("{}{}", BASE, alert))
    }

    fn message(alert: &str) -> String {
        conf_with(alert).unwrap_err().message().to_string()
    }

    #[test]
    fn test_basic_alert() {
        let conf = conf_with(
            r#"
alert cpu {
    template = t
    crit = avg(q("avg:os.cpu{host=*}", "5m", "")) > 90
    warn = avg(q("avg:os.cpu{host=*}", "5m", "")) > 80
    critNotification = ops
    warnNotification = ops
    unknown = 10m
    runEvery = 2
}
"#,
        )
        .unwrap();
        let a = &conf.alerts["cpu"];
        assert_eq!(a.tags, ["host".to_string()].into_iter().collect());
        assert_eq!(a.return_type, ValueType::Number);
        assert_eq!(a.unknown, Some(Duration::from_secs(600)));
        assert_eq!(a.run_every, 2);
        assert!(a.crit_notification.notifications.contains("ops"));
    }

    #[test]
    fn test_run_every_defaults_to_global() {
        let conf = Conf::new("a.conf", "defaultRunEvery = 3\nalert a {\n crit = 1\n}\n").unwrap();
        assert_eq!(conf.alerts["a"].run_every, 3);
    }

    #[test]
    fn test_neither_crit_nor_warn() {
        assert_eq!(message("alert a {\n template = t\n}\n"), "neither crit or warn specified");
    }

    #[test]
    fn test_crit_warn_tags_must_match() {
        let msg = message(
            r#"
alert a {
    crit = avg(q("avg:m{a=*,c=*}", "5m", "")) > 1
    warn = avg(q("avg:m{c=*}", "5m", "")) > 1
}
"#,
        );
        assert_eq!(msg, "crit tags ({a,c}) and warn tags ({c}) must be equal");
    }

    #[test]
    fn test_crit_warn_types_must_match() {
        let msg = message("alert a {\n crit = 1\n warn = abs(1)\n}\n");
        assert_eq!(
            msg,
            "crit return type (scalar) and warn return type (number) must be equal"
        );
    }

    #[test]
    fn test_expression_must_return_number() {
        let msg = message("alert a {\n crit = q(\"avg:m{host=*}\", \"5m\", \"\")\n}\n");
        assert_eq!(msg, "expression must return a number");
    }

    #[test]
    fn test_depends_shares_tags() {
        let msg = message(
            r#"
alert a {
    crit = avg(q("avg:m{host=*}", "5m", "")) > 1
    depends = avg(q("avg:up{dc=*}", "5m", "")) < 1
}
"#,
        );
        assert!(msg.contains("must share at least one tag"), "{}", msg);
    }

    #[test]
    fn test_depends_without_tags_allowed() {
        conf_with("alert a {\n crit = avg(q(\"avg:m{host=*}\", \"5m\", \"\")) > 1\n depends = 1\n}\n")
            .unwrap();
    }

    #[test]
    fn test_unknown_notification() {
        let msg = message("alert a {\n template = t\n crit = 1\n critNotification = nope\n}\n");
        assert_eq!(msg, "unknown notification nope");
    }

    #[test]
    fn test_log_rules() {
        assert_eq!(
            message("alert a {\n template = t\n crit = 1\n log = true\n critNotification = chained\n}\n"),
            "cannot use log with a chained notification"
        );
        assert_eq!(
            message("alert a {\n template = t\n crit = 1\n log = true\n}\n"),
            "log + crit specified, but no critNotifications"
        );
    }

    #[test]
    fn test_notification_requires_severity_and_template() {
        assert_eq!(
            message("alert a {\n template = t\n crit = 1\n warnNotification = ops\n}\n"),
            "warnNotification specified, but no warn"
        );
        assert_eq!(
            message("alert a {\n crit = 1\n critNotification = ops\n}\n"),
            "notifications specified, but no template"
        );
        assert_eq!(
            message("alert a {\n template = nope\n crit = 1\n}\n"),
            "template not found nope"
        );
    }

    #[test]
    fn test_repeated_notifications_accumulate() {
        let conf = conf_with(
            "alert a {\n template = t\n crit = 1\n critNotification = ops\n critNotification = chained\n}\n",
        )
        .unwrap();
        assert_eq!(conf.alerts["a"].crit_notification.len(), 2);
    }

    #[test]
    fn test_lookup_notifications() {
        let conf = conf_with(
            "alert a {\n template = t\n crit = 1\n critNotification = lookup(\"route\", \"notify\")\n}\n",
        )
        .unwrap();
        let ns = &conf.alerts["a"].crit_notification;
        let ny = ns.get(&conf, &TagSet::parse("host=ny-web01").unwrap()).unwrap();
        assert_eq!(ny.keys().collect::<Vec<_>>(), vec!["ops"]);
        let la = ns.get(&conf, &TagSet::parse("host=la-web01").unwrap()).unwrap();
        assert_eq!(la.keys().collect::<Vec<_>>(), vec!["chained", "ops"]);
    }

    #[test]
    fn test_lookup_notification_errors() {
        assert_eq!(
            message("alert a {\n template = t\n crit = 1\n critNotification = lookup(\"nope\", \"k\")\n}\n"),
            "unknown lookup table nope"
        );
        let text = "lookup bad {\n entry host=* {\n notify = ghost\n }\n}\n\
                    alert a {\n template = t\n crit = 1\n critNotification = lookup(\"bad\", \"notify\")\n}\n";
        assert_eq!(message(text), "lookup ghost: unknown notification ghost");
    }

    #[test]
    fn test_alert_squelch_and_vars() {
        let conf = conf_with(
            "alert a {\n $limit = 90\n crit = $limit\n squelch = host=ny-.*\n squelch = dc=la\n}\n",
        )
        .unwrap();
        let a = &conf.alerts["a"];
        assert_eq!(a.vars.get("limit").map(String::as_str), Some("90"));
        assert_eq!(a.squelch.len(), 2);
        assert!(conf.squelched(a, &TagSet::parse("host=ny-web01").unwrap()));
        assert!(!conf.squelched(a, &TagSet::parse("host=la-web01").unwrap()));
    }

    #[test]
    fn test_empty_alert_squelch_is_rejected() {
        assert_eq!(message("alert a {\n crit = 1\n squelch = \n}\n"), "empty squelch");
    }

    #[test]
    fn test_macro_inlined_into_alert() {
        let conf = conf_with(
            "macro m {\n template = t\n critNotification = ops\n}\nalert a {\n macro = m\n crit = 1\n}\n",
        )
        .unwrap();
        let a = &conf.alerts["a"];
        assert!(a.template.is_some());
        assert!(a.crit_notification.notifications.contains("ops"));
    }

    #[test]
    fn test_alerts_by_notification() {
        let conf = conf_with(
            "alert a {\n template = t\n crit = 1\n critNotification = ops\n}\nalert b {\n template = t\n crit = 1\n critNotification = ops\n}\n",
        )
        .unwrap();
        let by = alerts_by_notification(&conf);
        assert_eq!(by["ops"], vec!["a".to_string(), "b".to_string()]);
    }
}
