//! Email and HTTP transports
//!
//! Dispatch goes through the [`MailSender`] and [`HttpSender`] traits so
//! that tests can swap in recording implementations.

use crate::conf::Conf;
use crate::error::NotifyError;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use log::debug;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::time::Duration;

const DEFAULT_SMTP_PORT: u16 = 25;

/// File attached to an email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A fully addressed email
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub from: String,
    pub to: Vec<Mailbox>,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
}

impl Email {
    /// Build the MIME message
    ///
    /// # Errors
    /// `NotifyError::Email` for a bad sender address, attachment content
    /// type or missing recipients.
    pub fn to_message(&self) -> Result<Message, NotifyError> {
        let email_err = |e: &dyn std::fmt::Display| NotifyError::Email(e.to_string());

        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| NotifyError::Email(format!("bad emailFrom {:?}: {}", self.from, e)))?;
        let mut builder = Message::builder().from(from).subject(self.subject.clone());
        for to in &self.to {
            builder = builder.to(to.clone());
        }

        let html = SinglePart::html(self.html_body.clone());
        let message = if self.attachments.is_empty() {
            builder.singlepart(html)
        } else {
            let mut parts = MultiPart::mixed().singlepart(html);
            for a in &self.attachments {
                let content_type = ContentType::parse(&a.content_type).map_err(|e| email_err(&e))?;
                parts = parts.singlepart(
                    MimeAttachment::new(a.filename.clone()).body(a.data.clone(), content_type),
                );
            }
            builder.multipart(parts)
        };
        message.map_err(|e| email_err(&e))
    }
}

/// Sends email
pub trait MailSender: Send + Sync {
    /// Deliver `mail`
    fn send(&self, mail: &Email) -> Result<(), NotifyError>;
}

/// Performs HTTP requests, returning the response status
pub trait HttpSender: Send + Sync {
    fn post(&self, url: &Url, content_type: &str, body: Vec<u8>) -> Result<u16, NotifyError>;

    fn get(&self, url: &Url) -> Result<u16, NotifyError>;
}

/// SMTP delivery with opportunistic STARTTLS and optional PLAIN auth
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    host: String,
    port: u16,
    username: String,
    password: String,
    timeout: Duration,
}

impl SmtpMailer {
    /// Mailer for `host[:port]`
    pub fn new(addr: &str, timeout: Duration) -> Self {
        let (host, port) = match addr.rsplit_once(':') {
            Some((h, p)) => match p.parse() {
                Ok(port) => (h.to_string(), port),
                Err(_) => (addr.to_string(), DEFAULT_SMTP_PORT),
            },
            None => (addr.to_string(), DEFAULT_SMTP_PORT),
        };
        Self {
            host,
            port,
            username: String::new(),
            password: String::new(),
            timeout,
        }
    }

    /// Mailer using the `smtpHost`, `smtpUsername` and `smtpPassword` settings
    pub fn from_conf(conf: &Conf, timeout: Duration) -> Self {
        Self::new(&conf.smtp_host, timeout).with_credentials(&conf.smtp_username, &conf.smtp_password)
    }

    /// Builder: authenticate when a username is given
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn transport(&self) -> Result<SmtpTransport, NotifyError> {
        let tls = TlsParameters::new(self.host.clone())
            .map_err(|e| NotifyError::Email(format!("tls: {}", e)))?;
        let mut builder = SmtpTransport::builder_dangerous(self.host.as_str())
            .port(self.port)
            .tls(Tls::Opportunistic(tls))
            .timeout(Some(self.timeout));
        if !self.username.is_empty() {
            builder = builder
                .credentials(Credentials::new(self.username.clone(), self.password.clone()))
                .authentication(vec![Mechanism::Plain]);
        }
        Ok(builder.build())
    }
}

impl MailSender for SmtpMailer {
    fn send(&self, mail: &Email) -> Result<(), NotifyError> {
        if self.host.is_empty() {
            return Err(NotifyError::Email("smtpHost not configured".to_string()));
        }
        let message = mail.to_message()?;
        debug!("sending email via {}:{}", self.host, self.port);
        self.transport()?
            .send(&message)
            .map_err(|e| NotifyError::Email(e.to_string()))?;
        Ok(())
    }
}

/// Blocking HTTP client with a request timeout
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// # Errors
    /// `NotifyError::Http` if the client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpSender for HttpClient {
    fn post(&self, url: &Url, content_type: &str, body: Vec<u8>) -> Result<u16, NotifyError> {
        let resp = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .map_err(|e| NotifyError::Http(e.to_string()))?;
        Ok(resp.status().as_u16())
    }

    fn get(&self, url: &Url) -> Result<u16, NotifyError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| NotifyError::Http(e.to_string()))?;
        Ok(resp.status().as_u16())
    }
}
