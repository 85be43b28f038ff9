//! External ISBN Tool (fast path)
//!
//! Runs a user-supplied program as `<tool> <file>`. Exit status 0 with a
//! code on the first stdout line is a hit; anything else (non-zero exit,
//! empty output, tool missing) sends extraction down the fallback path.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::types::IdentifierTool;

/// Fast-path identifier tool backed by an external program
pub struct ExternalIsbnTool {
    program: PathBuf,
}

impl ExternalIsbnTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl IdentifierTool for ExternalIsbnTool {
    fn name(&self) -> &'static str {
        "shell"
    }

    async fn identify(&self, file: &Path) -> Option<String> {
        let output = Command::new(&self.program)
            .arg(file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                debug!(
                    program = %self.program.display(),
                    error = %e,
                    "ISBN tool could not be started"
                );
                return None;
            }
        };

        if !output.status.success() {
            debug!(
                program = %self.program.display(),
                status = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "ISBN tool did not identify file"
            );
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let code = stdout.lines().next().unwrap_or_default().trim();
        if code.is_empty() {
            debug!(program = %self.program.display(), "ISBN tool exited 0 with empty output");
            return None;
        }

        Some(code.to_string())
    }
}
