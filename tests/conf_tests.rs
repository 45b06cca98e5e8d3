//! Integration tests for configuration loading and notification routing

use alertconf::conf::{expand, Conf, Squelches, Vars};
use alertconf::error::NotifyError;
use alertconf::notify::{Dispatcher, Email, HttpSender, MailSender, Status};
use alertconf::opentsdb::TagSet;
use reqwest::Url;
use std::io::Write;
use std::sync::{Arc, Mutex};

const CONF: &str = r#"
checkFrequency = 1m
emailFrom = bosun@example.com
$threshold = 90

template cpu {
    subject = `{{.Alert.Name}} is {{.Status}} on {{.Group.host}}`
    body = `<p>{{.AlertKey}}</p>`
}

notification ops {
    email = ops@example.com
    post = http://hooks.example.com/alert
}

notification pager {
    get = http://pager.example.com/page
    next = ops
    timeout = 10m
}

lookup routes {
    entry host=db-* {
        notify = pager
    }
    entry host=* {
        notify = ops
    }
}

alert zeta {
    template = cpu
    crit = avg(q("avg:os.cpu{host=*}", "5m", "")) > $threshold
    critNotification = ops
}

alert alpha {
    template = cpu
    crit = avg(q("avg:os.cpu{host=*}", "5m", "")) > 95
    warn = avg(q("avg:os.cpu{host=*}", "5m", "")) > 80
    critNotification = lookup("routes", "notify")
    warnNotification = ops
    squelch = host=test-.*
}

alert mid {
    crit = 1
}
"#;

#[derive(Default)]
struct Mailer(Mutex<Vec<Email>>);

impl MailSender for Mailer {
    fn send(&self, mail: &Email) -> Result<(), NotifyError> {
        self.0.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

#[derive(Default)]
struct Http(Mutex<Vec<String>>);

impl HttpSender for Http {
    fn post(&self, url: &Url, _content_type: &str, _body: Vec<u8>) -> Result<u16, NotifyError> {
        self.0.lock().unwrap().push(format!("POST {}", url));
        Ok(200)
    }

    fn get(&self, url: &Url) -> Result<u16, NotifyError> {
        self.0.lock().unwrap().push(format!("GET {}", url));
        Ok(200)
    }
}

fn tags(text: &str) -> TagSet {
    TagSet::parse(text).unwrap()
}

#[test]
fn test_ordered_alerts_preserve_declaration_order() {
    let conf = Conf::new("test.conf", CONF).unwrap();
    let names: Vec<&str> = conf
        .ordered_alerts()
        .iter()
        .map(|a| a.name.as_str())
        .collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    assert_eq!(conf.alerts.len(), 3);
    for a in conf.ordered_alerts() {
        assert!(Arc::ptr_eq(a, &conf.alerts[&a.name]));
    }
}

#[test]
fn test_global_var_is_expanded_into_expression() {
    let conf = Conf::new("test.conf", CONF).unwrap();
    let crit = conf.alerts["zeta"].crit.as_ref().unwrap();
    assert!(crit.text().ends_with("> 90"), "{}", crit.text());
}

#[test]
fn test_duplicate_names_are_rejected() {
    let cases = [
        "alert a {\n crit = 1\n}\nalert a {\n crit = 1\n}\n",
        "template t {\n body = x\n}\ntemplate t {\n body = x\n}\n",
        "notification n {\n print = true\n}\nnotification n {\n print = true\n}\n",
        "macro m {\n crit = 1\n}\nmacro m {\n crit = 1\n}\n",
        "lookup l {\n entry a=b {\n  v = 1\n }\n}\nlookup l {\n entry a=b {\n  v = 1\n }\n}\n",
    ];
    for text in cases {
        let err = Conf::new("dup.conf", text).unwrap_err();
        assert!(err.to_string().contains("duplicate"), "{}", err);
    }
}

#[test]
fn test_expand() {
    let mut locals = Vars::new();
    locals.insert("$a".to_string(), "3".to_string());
    assert_eq!(expand("$a", Some(&locals), &Vars::new(), false).unwrap(), "3");

    std::env::set_var("env", "1");
    assert_eq!(expand("$env.env", None, &Vars::new(), false).unwrap(), "1");
}

#[test]
fn test_squelch_example() {
    let mut squelches = Squelches::new();
    squelches.add("x=ab,y=bc").unwrap();
    squelches.add("x=ab,z=de").unwrap();

    assert!(!squelches.squelched(&tags("x=ab")));
    assert!(squelches.squelched(&tags("x=abe,y=obcx")));
}

#[test]
fn test_alert_squelch_composes_with_global() {
    let text = format!("squelch = host=web01\n{}", CONF);
    let conf = Conf::new("test.conf", &text).unwrap();
    let alpha = &conf.alerts["alpha"];
    assert!(conf.squelched(alpha, &tags("host=web01")));
    assert!(conf.squelched(alpha, &tags("host=test-7")));
    assert!(!conf.squelched(alpha, &tags("host=db-1")));
}

#[test]
fn test_crit_warn_tags_must_be_equal() {
    let text = r#"
alert a {
    crit = avg(q("avg:m{a=*,c=*}", "5m", "")) > 1
    warn = avg(q("avg:m{c=*}", "5m", "")) > 1
}
"#;
    let err = Conf::new("t.conf", text).unwrap_err();
    assert!(err.to_string().contains("must be equal"), "{}", err);
}

#[test]
fn test_depends_must_share_a_tag() {
    let text = r#"
alert a {
    crit = avg(q("avg:m{host=*}", "5m", "")) > 1
    depends = avg(q("avg:up{dc=*}", "5m", "")) < 1
}
"#;
    let err = Conf::new("t.conf", text).unwrap_err();
    assert!(err.to_string().contains("must share at least one tag"), "{}", err);
}

#[test]
fn test_unknown_notification() {
    let text = "template t {\n body = x\n}\nalert a {\n template = t\n crit = 1\n warnNotification = missing\n}\n";
    let err = Conf::new("t.conf", text).unwrap_err();
    assert!(err.to_string().contains("unknown notification missing"), "{}", err);
}

#[test]
fn test_error_names_the_file() {
    let err = Conf::new("named.conf", "bogusKey = 1\n").unwrap_err();
    assert!(err.to_string().starts_with("conf: named.conf:"), "{}", err);
}

#[test]
fn test_reparse_is_idempotent() {
    let first = Conf::new("test.conf", CONF).unwrap();
    let second = Conf::new("test.conf", CONF).unwrap();
    assert_eq!(first.alerts, second.alerts);
    assert_eq!(first, second);
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONF.as_bytes()).unwrap();
    let conf = Conf::load(file.path()).unwrap();
    assert_eq!(conf.raw_text(), CONF);
    assert_eq!(conf.notifications.len(), 2);
}

#[test]
fn test_lookup_routes_notifications_per_tag_set() {
    let conf = Conf::new("test.conf", CONF).unwrap();
    let alpha = &conf.alerts["alpha"];

    let db = alpha.crit_notification.get(&conf, &tags("host=db-1")).unwrap();
    assert_eq!(db.keys().collect::<Vec<_>>(), vec!["pager"]);

    let web = alpha.crit_notification.get(&conf, &tags("host=web-1")).unwrap();
    assert_eq!(web.keys().collect::<Vec<_>>(), vec!["ops"]);
}

#[test]
fn test_escalation_chain() {
    let conf = Conf::new("test.conf", CONF).unwrap();
    let chain: Vec<String> = conf
        .escalation("pager")
        .unwrap()
        .iter()
        .map(|n| n.name.clone())
        .collect();
    assert_eq!(chain, vec!["pager".to_string(), "ops".to_string()]);
}

#[test]
fn test_fire_delivers_on_every_channel() {
    let conf = Conf::new("test.conf", CONF).unwrap();
    let mailer = Arc::new(Mailer::default());
    let http = Arc::new(Http::default());
    let dispatcher = Dispatcher::new(mailer.clone(), http.clone());

    let fired = dispatcher
        .fire(&conf, &conf.alerts["zeta"], &tags("host=web01"), Status::Critical)
        .unwrap();
    assert!(!fired.squelched);
    assert_eq!(fired.notifications, vec!["ops".to_string()]);
    fired.wait();

    let sent = mailer.0.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "zeta is critical on web01");
    assert_eq!(sent[0].from, "bosun@example.com");
    assert_eq!(
        *http.0.lock().unwrap(),
        vec!["POST http://hooks.example.com/alert".to_string()]
    );
    assert_eq!(dispatcher.stats().snapshot().total_failed(), 0);
}

#[test]
fn test_fire_skips_squelched_instance() {
    let conf = Conf::new("test.conf", CONF).unwrap();
    let mailer = Arc::new(Mailer::default());
    let http = Arc::new(Http::default());
    let dispatcher = Dispatcher::new(mailer.clone(), http.clone());

    let fired = dispatcher
        .fire(&conf, &conf.alerts["alpha"], &tags("host=test-3"), Status::Critical)
        .unwrap();
    assert!(fired.squelched);
    fired.wait();
    assert!(mailer.0.lock().unwrap().is_empty());
    assert!(http.0.lock().unwrap().is_empty());
}
