//! Watch session state machine and directory layout
//!
//! Idle → Watching → Stopped. Stopped is terminal; a stopped session is not
//! restarted, a new one is constructed instead.

use std::fmt;
use std::path::{Path, PathBuf};

use bookmaker_common::time::{self, Clock};
use serde::{Deserialize, Serialize};

/// Quarantine subdirectory name inside the output directory
pub const TMP_DIR_NAME: &str = "tmp";

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    /// Constructed, not watching
    Idle,
    /// Observer active, events dispatched
    Watching,
    /// Torn down
    Stopped,
}

impl SessionState {
    pub fn can_start(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    pub fn can_stop(&self) -> bool {
        matches!(self, SessionState::Watching)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Stopped)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::Watching => f.write_str("watching"),
            SessionState::Stopped => f.write_str("stopped"),
        }
    }
}

/// Directories used by one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    /// Watched directory (direct children only)
    pub input: PathBuf,
    /// Destination for renamed files
    pub output: PathBuf,
    /// Quarantine, always `output/tmp`
    pub tmp: PathBuf,
}

impl SessionPaths {
    /// Resolve the layout once for a session
    ///
    /// When output is the input directory (under any spelling), output becomes
    /// a timestamped subdirectory of input so the session never watches its
    /// own results.
    pub fn resolve(input: &Path, output: &Path, clock: &dyn Clock) -> Self {
        let output = if same_dir(input, output) {
            input.join(time::dir_stamp(clock.now()))
        } else {
            output.to_path_buf()
        };

        Self {
            input: input.to_path_buf(),
            tmp: output.join(TMP_DIR_NAME),
            output,
        }
    }
}

/// Compare resolved paths when both exist, spelled paths otherwise
fn same_dir(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
