//! `notification` sections

use super::parse::SectionNode;
use super::{Loader, Vars};
use crate::error::ConfError;
use crate::opentsdb::parse_duration;
use crate::template::TextTemplate;
use lettre::message::{Mailbox, Mailboxes};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

/// Content type of POST requests unless a notification overrides it
pub const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Where and how to deliver an alert
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub name: String,
    /// Source text of the section
    pub text: String,
    pub vars: Vars,
    pub email: Vec<Mailbox>,
    pub post: Option<Url>,
    pub get: Option<Url>,
    pub print: bool,
    pub content_type: String,
    /// Name of the notification to escalate to
    pub next: Option<String>,
    /// Delay before escalating to `next`
    pub timeout: Option<Duration>,
    /// Template for the POST body, rendered with the subject as `.`
    pub body: Option<TextTemplate>,
    pub run_on_actions: bool,
}

impl Notification {
    fn new(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
            vars: Vars::new(),
            email: Vec::new(),
            post: None,
            get: None,
            print: false,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            next: None,
            timeout: None,
            body: None,
            run_on_actions: true,
        }
    }

    /// Whether any delivery channel is configured
    pub fn has_channels(&self) -> bool {
        !self.email.is_empty() || self.post.is_some() || self.get.is_some() || self.print
    }
}

impl Loader<'_> {
    pub(super) fn load_notification(&mut self, s: &SectionNode) -> Result<(), ConfError> {
        let name = &s.name;
        if self.conf.notifications.contains_key(name) {
            return Err(self.error(s, format!("duplicate notification name: {}", name)));
        }

        let mut n = Notification::new(name, &s.raw_text);
        for p in self.section_pairs(s, Some(&mut n.vars), false)? {
            let v = p.val.as_str();
            let url = |v: &str| Url::parse(v).map_err(|e| self.error(&p.node, format!("{}: {}", v, e)));
            match p.key.as_str() {
                "email" => {
                    let list: Mailboxes = v
                        .parse()
                        .map_err(|e| self.error(&p.node, format!("mail: {}", e)))?;
                    n.email = list.into_iter().collect();
                }
                "post" => n.post = Some(url(v)?),
                "get" => n.get = Some(url(v)?),
                "print" => n.print = true,
                "contentType" => n.content_type = v.to_string(),
                "next" => {
                    // a notification may escalate to itself
                    if v != name.as_str() && !self.conf.notifications.contains_key(v) {
                        return Err(self.error(&p.node, format!("unknown notification {}", v)));
                    }
                    n.next = Some(v.to_string());
                }
                "timeout" => {
                    let d = parse_duration(v).map_err(|e| self.error(&p.node, e.to_string()))?;
                    n.timeout = Some(d);
                }
                "body" => {
                    let t = TextTemplate::parse(name, v)
                        .map_err(|e| self.error(&p.node, e.to_string()))?;
                    n.body = Some(t);
                }
                "runOnActions" => n.run_on_actions = v == "true",
                key => return Err(self.error(&p.node, format!("unknown key {}", key))),
            }
        }

        if n.timeout.is_some_and(|t| !t.is_zero()) && n.next.is_none() {
            return Err(self.error(s, "timeout specified without next"));
        }
        self.conf.notifications.insert(name.clone(), Arc::new(n));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::Conf;

    #[test]
    fn test_notification_section() {
        let text = r#"
notification ops {
    email = ops@example.com, "On Call" <oncall@example.com>
    post = http://hooks.example.com/alert
    contentType = application/json
    body = `{"text": "{{.}}"}`
    print = true
}
"#;
        let conf = Conf::new("n.conf", text).unwrap();
        let n = &conf.notifications["ops"];
        assert_eq!(n.email.len(), 2);
        assert_eq!(n.email[1].email.to_string(), "oncall@example.com");
        assert_eq!(n.post.as_ref().unwrap().host_str(), Some("hooks.example.com"));
        assert_eq!(n.content_type, "application/json");
        assert!(n.print);
        assert!(n.run_on_actions);
        assert!(n.body.is_some());
        assert!(n.has_channels());
    }

    #[test]
    fn test_defaults() {
        let conf = Conf::new("n.conf", "notification quiet {\n}\n").unwrap();
        let n = &conf.notifications["quiet"];
        assert_eq!(n.content_type, DEFAULT_CONTENT_TYPE);
        assert!(!n.has_channels());
        assert!(n.next.is_none());
    }

    #[test]
    fn test_next_and_timeout() {
        let text = "\
notification b {
    print = true
}
notification a {
    next = b
    timeout = 30m
}
notification loop {
    next = loop
    timeout = 1h
}
";
        let conf = Conf::new("n.conf", text).unwrap();
        let a = &conf.notifications["a"];
        assert_eq!(a.next.as_deref(), Some("b"));
        assert_eq!(a.timeout, Some(Duration::from_secs(1800)));
        assert_eq!(conf.notifications["loop"].next.as_deref(), Some("loop"));
    }

    #[test]
    fn test_next_must_be_defined_first() {
        let text = "notification a {\n next = b\n}\nnotification b {\n}\n";
        let err = Conf::new("n.conf", text).unwrap_err();
        assert_eq!(err.message(), "unknown notification b");
    }

    #[test]
    fn test_timeout_requires_next() {
        let err = Conf::new("n.conf", "notification a {\n timeout = 5m\n}\n").unwrap_err();
        assert_eq!(err.message(), "timeout specified without next");
    }

    #[test]
    fn test_run_on_actions() {
        let conf = Conf::new("n.conf", "notification a {\n runOnActions = false\n}\n").unwrap();
        assert!(!conf.notifications["a"].run_on_actions);
    }

    #[test]
    fn test_invalid_values() {
        assert!(Conf::new("n.conf", "notification a {\n post = not a url\n}\n").is_err());
        assert!(Conf::new("n.conf", "notification a {\n email = @@@\n}\n").is_err());
        let err = Conf::new("n.conf", "notification a {\n}\nnotification a {\n}\n").unwrap_err();
        assert_eq!(err.message(), "duplicate notification name: a");
    }
}
