//! Data models for bookmaker-watch

pub mod session;

pub use session::{SessionPaths, SessionState, TMP_DIR_NAME};
