//! Status channel between the watch worker and whatever displays its progress
//!
//! Multi-producer / single-consumer, FIFO. The worker side never blocks and
//! never fails when the consumer has gone away; the consumer side offers a
//! non-blocking [`StatusReceiver::try_next`] for polling front ends.
//!
//! A [`Severity::Completed`] message is the terminal sentinel of a watch
//! session: it is always the last message, and seeing it means the worker
//! has fully shut down.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::time::{self, Clock};
use crate::Result;

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// End of a session's reporting stream
    Completed,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub severity: Severity,
    pub text: String,
    /// Local time the message was created
    pub at: NaiveDateTime,
}

impl StatusMessage {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
            at: time::now(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(Severity::Info, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(Severity::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Severity::Error, text)
    }

    pub fn completed(text: impl Into<String>) -> Self {
        Self::new(Severity::Completed, text)
    }

    pub fn is_completed(&self) -> bool {
        self.severity == Severity::Completed
    }

    /// Render as `[2024/01/01_12:00:00] <INFO> text`
    pub fn log_line(&self) -> String {
        format!("[{}] <{}> {}", time::log_stamp(self.at), self.severity, self.text)
    }
}

/// Create a connected sender/receiver pair
pub fn channel() -> (StatusSender, StatusReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StatusSender { tx }, StatusReceiver { rx })
}

/// Producer handle; cheap to clone
#[derive(Debug, Clone)]
pub struct StatusSender {
    tx: mpsc::UnboundedSender<StatusMessage>,
}

impl StatusSender {
    /// Queue a message and mirror it to tracing
    pub fn send(&self, message: StatusMessage) {
        match message.severity {
            Severity::Info | Severity::Completed => info!(target: "bookmaker::status", "{}", message.text),
            Severity::Warning => warn!(target: "bookmaker::status", "{}", message.text),
            Severity::Error => error!(target: "bookmaker::status", "{}", message.text),
        }

        if self.tx.send(message).is_err() {
            debug!("Status receiver dropped, message discarded");
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.send(StatusMessage::info(text));
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.send(StatusMessage::warning(text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.send(StatusMessage::error(text));
    }

    pub fn completed(&self, text: impl Into<String>) {
        self.send(StatusMessage::completed(text));
    }
}

/// Consumer handle
#[derive(Debug)]
pub struct StatusReceiver {
    rx: mpsc::UnboundedReceiver<StatusMessage>,
}

impl StatusReceiver {
    /// Take the next queued message without waiting
    pub fn try_next(&mut self) -> Option<StatusMessage> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next message; `None` once every sender is gone and the
    /// queue is empty
    pub async fn recv(&mut self) -> Option<StatusMessage> {
        self.rx.recv().await
    }

    /// Take everything currently queued
    pub fn drain(&mut self) -> Vec<StatusMessage> {
        let mut messages = Vec::new();
        while let Some(message) = self.try_next() {
            messages.push(message);
        }
        messages
    }
}

/// Accumulated log text, as shown to the user
#[derive(Debug, Default, Clone)]
pub struct StatusLog {
    lines: Vec<String>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: &StatusMessage) {
        self.lines.push(message.log_line());
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Write the log to `<dir>/<YYYYmmdd_HHMMSS>_LOG.txt`
    pub fn export(&self, dir: &Path, clock: &dyn Clock) -> Result<PathBuf> {
        let path = dir.join(format!("{}_LOG.txt", time::dir_stamp(clock.now())));
        fs::write(&path, self.text())?;
        info!(path = %path.display(), lines = self.lines.len(), "Status log exported");
        Ok(path)
    }
}
