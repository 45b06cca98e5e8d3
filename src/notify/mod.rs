//! Notification dispatch
//!
//! Every enabled channel of a notification is delivered on its own thread.
//! Channels do not wait for each other, and a failure is logged and
//! counted in [`NotifyStats`] but never retried or returned to the caller.

mod stats;
mod transport;

pub use stats::{Channel, NotifyStats, StatsSnapshot};
pub use transport::{Attachment, Email, HttpClient, HttpSender, MailSender, SmtpMailer};

use crate::conf::{Alert, Conf, Notification};
use crate::error::{NotifyError, TemplateError};
use crate::opentsdb::TagSet;
use crate::template::Scope;
use log::{error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Severity an alert instance fired at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Critical,
    Warning,
    Unknown,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Critical => "critical",
            Status::Warning => "warning",
            Status::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Rendered text for one notification
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    /// Short text used by print, post and get
    pub subject: String,
    pub body: String,
    pub email_subject: String,
    pub email_body: String,
    /// `alert{tags}` of the instance being notified about
    pub alert_key: String,
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Message whose email parts equal the plain ones
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        let subject = subject.into();
        let body = body.into();
        Self {
            email_subject: subject.clone(),
            email_body: body.clone(),
            subject,
            body,
            ..Self::default()
        }
    }

    /// Render the alert's template for an instance with `tags`
    ///
    /// Unknown status uses the global `unknownTemplate` when one is set.
    /// Without a template the subject is the alert key.
    ///
    /// # Errors
    /// Propagates template rendering failures.
    pub fn for_alert(
        conf: &Conf,
        alert: &Alert,
        tags: &TagSet,
        status: Status,
    ) -> Result<Self, TemplateError> {
        let alert_key = format!("{}{}", alert.name, tags);
        let data = template_data(conf, alert, tags, status, &alert_key);

        let template = match status {
            Status::Unknown => conf.unknown_template.as_ref().or(alert.template.as_ref()),
            _ => alert.template.as_ref(),
        };
        let mut message = match template {
            Some(t) => {
                let scope = Scope {
                    locals: Some(&alert.vars),
                    globals: &conf.vars,
                };
                Message::new(t.render_subject(&data, &scope)?, t.render_body(&data, &scope)?)
            }
            None => Message::new(alert_key.clone(), String::new()),
        };
        message.alert_key = alert_key;
        Ok(message)
    }
}

/// Data exposed to alert templates
fn template_data(conf: &Conf, alert: &Alert, tags: &TagSet, status: Status, key: &str) -> Value {
    let mut vars: Vec<(&String, &String)> = alert.vars.iter().collect();
    vars.sort();
    let vars: serde_json::Map<String, Value> = vars
        .into_iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    json!({
        "Alert": {
            "Name": alert.name,
            "Vars": vars,
            "Crit": alert.crit.as_ref().map(|e| e.text()),
            "Warn": alert.warn.as_ref().map(|e| e.text()),
        },
        "Group": tags,
        "Status": status,
        "AlertKey": key,
        "Hostname": conf.hostname,
    })
}

/// Threads started by one [`Dispatcher::notify`] call
#[derive(Debug)]
pub struct Dispatch {
    handles: Vec<(Channel, JoinHandle<()>)>,
}

impl Dispatch {
    /// Channels that were started
    pub fn channels(&self) -> Vec<Channel> {
        self.handles.iter().map(|(c, _)| *c).collect()
    }

    /// Block until every channel has finished
    pub fn wait(self) {
        for (channel, handle) in self.handles {
            if handle.join().is_err() {
                error!("{} delivery thread panicked", channel);
            }
        }
    }
}

/// Outcome of [`Dispatcher::fire`]
#[derive(Debug)]
pub struct Fired {
    pub squelched: bool,
    /// Names of the notifications that were dispatched
    pub notifications: Vec<String>,
    pub dispatches: Vec<Dispatch>,
}

impl Fired {
    pub fn wait(self) {
        for d in self.dispatches {
            d.wait();
        }
    }
}

/// Sends notifications through pluggable transports
#[derive(Clone)]
pub struct Dispatcher {
    mailer: Arc<dyn MailSender>,
    http: Arc<dyn HttpSender>,
    stats: Arc<NotifyStats>,
}

impl Dispatcher {
    pub fn new(mailer: Arc<dyn MailSender>, http: Arc<dyn HttpSender>) -> Self {
        Self {
            mailer,
            http,
            stats: Arc::new(NotifyStats::new()),
        }
    }

    pub fn stats(&self) -> &NotifyStats {
        &self.stats
    }

    /// Start delivery of `message` on every channel of `n`
    pub fn notify(&self, n: &Notification, conf: &Conf, message: &Message) -> Dispatch {
        let mut handles = Vec::new();

        if !n.email.is_empty() {
            let mail = Email {
                from: conf.email_from.clone(),
                to: n.email.clone(),
                subject: message.email_subject.clone(),
                html_body: message.email_body.clone(),
                attachments: message.attachments.clone(),
            };
            let mailer = Arc::clone(&self.mailer);
            let stats = Arc::clone(&self.stats);
            let key = message.alert_key.clone();
            handles.push((
                Channel::Email,
                thread::spawn(move || {
                    let result = mailer.send(&mail);
                    match &result {
                        Ok(()) => info!("relayed alert {} to {:?} successfully", key, addresses(&mail)),
                        Err(e) => error!("failed to send alert {} to {:?}: {}", key, addresses(&mail), e),
                    }
                    stats.record(Channel::Email, result.is_ok());
                }),
            ));
        }

        if let Some(url) = &n.post {
            let body = match &n.body {
                Some(t) => {
                    let scope = Scope {
                        locals: Some(&n.vars),
                        globals: &conf.vars,
                    };
                    t.render(&Value::String(message.subject.clone()), &scope)
                }
                None => Ok(message.subject.clone()),
            };
            match body {
                Ok(body) => {
                    let http = Arc::clone(&self.http);
                    let stats = Arc::clone(&self.stats);
                    let url = url.clone();
                    let content_type = n.content_type.clone();
                    let key = message.alert_key.clone();
                    handles.push((
                        Channel::Post,
                        thread::spawn(move || {
                            let result = http.post(&url, &content_type, body.into_bytes());
                            let ok = check_status(&key, url.as_str(), result);
                            stats.record(Channel::Post, ok);
                        }),
                    ));
                }
                Err(e) => {
                    error!("notification {}: {}", n.name, e);
                    self.stats.record(Channel::Post, false);
                }
            }
        }

        if let Some(url) = &n.get {
            let http = Arc::clone(&self.http);
            let stats = Arc::clone(&self.stats);
            let url = url.clone();
            let key = message.alert_key.clone();
            handles.push((
                Channel::Get,
                thread::spawn(move || {
                    let result = http.get(&url);
                    let ok = check_status(&key, url.as_str(), result);
                    stats.record(Channel::Get, ok);
                }),
            ));
        }

        if n.print {
            let stats = Arc::clone(&self.stats);
            let subject = message.subject.clone();
            handles.push((
                Channel::Print,
                thread::spawn(move || {
                    println!("{}", subject);
                    stats.record(Channel::Print, true);
                }),
            ));
        }

        if handles.is_empty() {
            warn!("notification {} has no delivery channels", n.name);
        }
        Dispatch { handles }
    }

    /// Notify about one instance of `alert`
    ///
    /// Squelched instances are skipped. The notifications used are the
    /// crit notifications for critical and unknown status and the warn
    /// notifications for warning status.
    ///
    /// # Errors
    /// Fails if the template does not render or a lookup-selected
    /// notification does not exist; nothing is sent in that case.
    pub fn fire(
        &self,
        conf: &Conf,
        alert: &Alert,
        tags: &TagSet,
        status: Status,
    ) -> Result<Fired, NotifyError> {
        if conf.squelched(alert, tags) {
            info!("{}{} is squelched", alert.name, tags);
            return Ok(Fired {
                squelched: true,
                notifications: Vec::new(),
                dispatches: Vec::new(),
            });
        }

        let ns = match status {
            Status::Warning => &alert.warn_notification,
            Status::Critical | Status::Unknown => &alert.crit_notification,
        };
        let targets = ns.get(conf, tags)?;
        let message = Message::for_alert(conf, alert, tags, status)?;

        let mut fired = Fired {
            squelched: false,
            notifications: Vec::with_capacity(targets.len()),
            dispatches: Vec::with_capacity(targets.len()),
        };
        for (name, n) in targets {
            fired.dispatches.push(self.notify(&n, conf, &message));
            fired.notifications.push(name);
        }
        Ok(fired)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

fn addresses(mail: &Email) -> Vec<String> {
    mail.to.iter().map(|m| m.email.to_string()).collect()
}

/// Log the outcome of an HTTP delivery; any status >= 300 is a failure
fn check_status(key: &str, url: &str, result: Result<u16, NotifyError>) -> bool {
    match result {
        Ok(status) if status < 300 => {
            info!("sent alert {} to {}", key, url);
            true
        }
        Ok(status) => {
            let e = NotifyError::BadStatus {
                url: url.to_string(),
                status,
            };
            error!("{}", e);
            false
        }
        Err(e) => {
            error!("failed to notify {} for {}: {}", url, key, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{RecordingHttp, RecordingMailer};

    const CONF: &str = r#"
emailFrom = bosun@example.com
$team = ops
template t {
    subject = `{{.Alert.Name}} {{.Status}} on {{.Group.host}}`
    body = `<b>{{V "$team"}}</b>`
}
notification mail {
    email = ops@example.com
}
notification hook {
    post = http://hooks.example.com/alert
    contentType = application/json
    body = `{"text": "{{.}}"}`
    get = http://hooks.example.com/ping
}
notification fail {
    post = http://hooks.example.com/broken
}
alert cpu {
    template = t
    crit = 1
    warn = 1
    critNotification = mail,hook
    warnNotification = fail
    squelch = host=test.*
}
"#;

    fn setup(status: u16) -> (Conf, Arc<RecordingMailer>, Arc<RecordingHttp>, Dispatcher) {
        let conf = Conf::new("n.conf", CONF).unwrap();
        let mailer = Arc::new(RecordingMailer::new());
        let http = Arc::new(RecordingHttp::with_status(status));
        let d = Dispatcher::new(mailer.clone(), http.clone());
        (conf, mailer, http, d)
    }

    #[test]
    fn test_message_for_alert() {
        let conf = Conf::new("n.conf", CONF).unwrap();
        let tags = TagSet::parse("host=web01").unwrap();
        let m = Message::for_alert(&conf, &conf.alerts["cpu"], &tags, Status::Critical).unwrap();
        assert_eq!(m.subject, "cpu critical on web01");
        assert_eq!(m.body, "<b>ops</b>");
        assert_eq!(m.alert_key, "cpu{host=web01}");
        assert_eq!(m.email_subject, m.subject);
    }

    #[test]
    fn test_fire_critical() {
        let (conf, mailer, http, d) = setup(200);
        let tags = TagSet::parse("host=web01").unwrap();
        let fired = d.fire(&conf, &conf.alerts["cpu"], &tags, Status::Critical).unwrap();
        assert!(!fired.squelched);
        assert_eq!(fired.notifications, vec!["hook".to_string(), "mail".to_string()]);
        fired.wait();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "bosun@example.com");
        assert_eq!(sent[0].subject, "cpu critical on web01");

        let requests = http.requests();
        assert_eq!(requests.len(), 2);
        let post = requests.iter().find(|r| r.method == "POST").unwrap();
        assert_eq!(post.content_type.as_deref(), Some("application/json"));
        assert_eq!(post.body, br#"{"text": "cpu critical on web01"}"#.to_vec());

        let snap = d.stats().snapshot();
        assert_eq!(snap.email_sent, 1);
        assert_eq!(snap.post_sent, 1);
        assert_eq!(snap.get_sent, 1);
        assert_eq!(snap.total_failed(), 0);
    }

    #[test]
    fn test_bad_status_is_counted_not_returned() {
        let (conf, _mailer, _http, d) = setup(500);
        let tags = TagSet::parse("host=web01").unwrap();
        let fired = d.fire(&conf, &conf.alerts["cpu"], &tags, Status::Warning).unwrap();
        assert_eq!(fired.notifications, vec!["fail".to_string()]);
        fired.wait();
        assert_eq!(d.stats().snapshot().post_failed, 1);
    }

    #[test]
    fn test_mail_failure_does_not_block_other_channels() {
        let conf = Conf::new("n.conf", CONF).unwrap();
        let mailer = Arc::new(RecordingMailer::failing());
        let http = Arc::new(RecordingHttp::with_status(204));
        let d = Dispatcher::new(mailer, http.clone());
        let tags = TagSet::parse("host=web01").unwrap();
        d.fire(&conf, &conf.alerts["cpu"], &tags, Status::Critical)
            .unwrap()
            .wait();
        let snap = d.stats().snapshot();
        assert_eq!(snap.email_failed, 1);
        assert_eq!(snap.post_sent, 1);
        assert_eq!(http.requests().len(), 2);
    }

    #[test]
    fn test_squelched_instance_is_skipped() {
        let (conf, mailer, http, d) = setup(200);
        let tags = TagSet::parse("host=test01").unwrap();
        let fired = d.fire(&conf, &conf.alerts["cpu"], &tags, Status::Critical).unwrap();
        assert!(fired.squelched);
        assert!(fired.dispatches.is_empty());
        assert!(mailer.sent().is_empty());
        assert!(http.requests().is_empty());
    }

    #[test]
    fn test_notify_channels() {
        let (conf, _mailer, _http, d) = setup(200);
        let m = Message::new("s", "b");
        let dispatch = d.notify(&conf.notifications["hook"], &conf, &m);
        assert_eq!(dispatch.channels(), vec![Channel::Post, Channel::Get]);
        dispatch.wait();
    }
}
