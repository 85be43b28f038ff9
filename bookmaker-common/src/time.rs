//! Timestamp utilities
//!
//! All timestamps are wall-clock local time: they end up in directory names
//! and log lines read by the person sitting at the machine.

use chrono::{Local, NaiveDateTime};

/// Directory stamp format (`20240101_120000`)
pub const DIR_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Log line stamp format (`2024/01/01_12:00:00`)
pub const LOG_STAMP_FORMAT: &str = "%Y/%m/%d_%H:%M:%S";

/// Source of the current time
///
/// Injected wherever a timestamp becomes part of a path so tests can pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock frozen at a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Get current local timestamp
pub fn now() -> NaiveDateTime {
    SystemClock.now()
}

/// Format a timestamp for use as a directory or file name prefix
pub fn dir_stamp(at: NaiveDateTime) -> String {
    at.format(DIR_STAMP_FORMAT).to_string()
}

/// Format a timestamp for a log line
pub fn log_stamp(at: NaiveDateTime) -> String {
    at.format(LOG_STAMP_FORMAT).to_string()
}
