//! Error types for bookmaker-watch sessions
//!
//! Per-file problems never surface here: the event handler turns them into
//! status messages. These are the errors of the session lifecycle itself.

use thiserror::Error;

use crate::models::SessionState;
use crate::services::PlaceError;
use crate::types::ProviderError;

/// Session lifecycle error
#[derive(Debug, Error)]
pub enum SessionError {
    /// `stop()` outside Watching
    #[error("Observer is not running (session is {0})")]
    NotRunning(SessionState),

    /// `start()` outside Idle
    #[error("Observer already started (session is {0})")]
    AlreadyStarted(SessionState),

    /// Directory observer could not be created or registered
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// Provider client could not be built
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Output/tmp directory setup failed
    #[error("Placement error: {0}")]
    Place(#[from] PlaceError),

    /// Worker task panicked or was aborted
    #[error("Worker task failed: {0}")]
    Join(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// bookmaker-common error
    #[error("Common error: {0}")]
    Common(#[from] bookmaker_common::Error),
}

impl From<notify::Error> for SessionError {
    fn from(e: notify::Error) -> Self {
        SessionError::Watcher(e.to_string())
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
