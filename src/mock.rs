//! Mock implementations for testing
//!
//! Recording mail and HTTP transports so notification dispatch can be
//! tested without an SMTP server or network.

use crate::error::NotifyError;
use crate::notify::{Email, HttpSender, MailSender};
use reqwest::Url;
use std::sync::Mutex;

/// Mail sender that stores every email instead of sending it
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    fail: bool,
}

impl RecordingMailer {
    /// Create a mailer that accepts every email
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mailer that rejects every email
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Emails accepted so far
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

impl MailSender for RecordingMailer {
    fn send(&self, mail: &Email) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Email("mock: connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// One recorded HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: &'static str,
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// HTTP sender that records requests and answers with a fixed status
#[derive(Debug)]
pub struct RecordingHttp {
    requests: Mutex<Vec<Request>>,
    status: u16,
}

impl RecordingHttp {
    /// Create a sender answering 200 OK
    pub fn new() -> Self {
        Self::with_status(200)
    }

    /// Create a sender answering `status`
    pub fn with_status(status: u16) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status,
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for RecordingHttp {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpSender for RecordingHttp {
    fn post(&self, url: &Url, content_type: &str, body: Vec<u8>) -> Result<u16, NotifyError> {
        self.requests.lock().unwrap().push(Request {
            method: "POST",
            url: url.to_string(),
            content_type: Some(content_type.to_string()),
            body,
        });
        Ok(self.status)
    }

    fn get(&self, url: &Url) -> Result<u16, NotifyError> {
        self.requests.lock().unwrap().push(Request {
            method: "GET",
            url: url.to_string(),
            content_type: None,
            body: Vec::new(),
        });
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email {
            from: "bosun@example.com".to_string(),
            to: vec!["ops@example.com".parse().unwrap()],
            subject: "s".to_string(),
            html_body: "b".to_string(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_recording_mailer() {
        let mailer = RecordingMailer::new();
        mailer.send(&email()).unwrap();
        assert_eq!(mailer.sent().len(), 1);
    }

    #[test]
    fn test_failing_mailer() {
        let mailer = RecordingMailer::failing();
        assert!(mailer.send(&email()).is_err());
        assert!(mailer.sent().is_empty());
    }

    #[test]
    fn test_recording_http() {
        let http = RecordingHttp::with_status(404);
        let url = Url::parse("http://example.com/x").unwrap();
        assert_eq!(http.get(&url).unwrap(), 404);
        assert_eq!(http.post(&url, "text/plain", b"hi".to_vec()).unwrap(), 404);
        let requests = http.requests();
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[1].body, b"hi".to_vec());
    }
}
