//! Delivery counters

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A delivery channel of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Post,
    Get,
    Print,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Channel::Email => "email",
            Channel::Post => "post",
            Channel::Get => "get",
            Channel::Print => "print",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Default)]
struct Counter {
    sent: AtomicU64,
    failed: AtomicU64,
}

impl Counter {
    fn record(&self, ok: bool) {
        let c = if ok { &self.sent } else { &self.failed };
        c.fetch_add(1, Ordering::Relaxed);
    }

    fn load(&self) -> (u64, u64) {
        (
            self.sent.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        )
    }
}

/// Sent and failed counts per channel, shared by all dispatch threads
#[derive(Debug, Default)]
pub struct NotifyStats {
    email: Counter,
    post: Counter,
    get: Counter,
    print: Counter,
}

impl NotifyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, channel: Channel, ok: bool) {
        let counter = match channel {
            Channel::Email => &self.email,
            Channel::Post => &self.post,
            Channel::Get => &self.get,
            Channel::Print => &self.print,
        };
        counter.record(ok);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let (email_sent, email_failed) = self.email.load();
        let (post_sent, post_failed) = self.post.load();
        let (get_sent, get_failed) = self.get.load();
        let (print_sent, print_failed) = self.print.load();
        StatsSnapshot {
            email_sent,
            email_failed,
            post_sent,
            post_failed,
            get_sent,
            get_failed,
            print_sent,
            print_failed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub email_sent: u64,
    pub email_failed: u64,
    pub post_sent: u64,
    pub post_failed: u64,
    pub get_sent: u64,
    pub get_failed: u64,
    pub print_sent: u64,
    pub print_failed: u64,
}

impl StatsSnapshot {
    pub fn total_failed(&self) -> u64 {
        self.email_failed + self.post_failed + self.get_failed + self.print_failed
    }
}
