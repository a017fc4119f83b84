//! User-visible notices.
//!
//! Background steps that fail in a way the user must hear about send a
//! [`Notice`] on a broadcast channel. Sending never fails the caller: with no
//! subscribers the notice is only logged.

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::ErrorCode;

const NOTICE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Error code of the failure that produced the notice, if any.
    pub code: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct Notices {
    tx: broadcast::Sender<Notice>,
}

impl Default for Notices {
    fn default() -> Self {
        Self::new()
    }
}

impl Notices {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(Notice { level: NoticeLevel::Info, message: message.into(), code: None });
    }

    /// Report a failure, tagging the notice with the error's code.
    pub fn error(&self, context: &str, err: &dyn ErrorCode) {
        self.send(Notice {
            level: NoticeLevel::Error,
            message: format!("{context}: {err}"),
            code: Some(err.error_code()),
        });
    }

    /// Report a failure that has only a message, such as a remote job's
    /// failure reason.
    pub fn error_message(&self, message: impl Into<String>) {
        self.send(Notice { level: NoticeLevel::Error, message: message.into(), code: None });
    }

    fn send(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            debug!("notice: no subscribers");
        }
    }
}

#[cfg(test)]
#[path = "notice_test.rs"]
mod tests;
