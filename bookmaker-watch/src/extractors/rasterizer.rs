//! Poppler Page Rasterizer
//!
//! Uses the poppler command-line utilities:
//! - `pdfinfo <file>` for the page count (`Pages:` line)
//! - `pdftoppm -jpeg -f <first> -l <last> <file> <prefix>` for page images
//!
//! # Installation
//! ```bash
//! # Ubuntu/Debian
//! sudo apt-get install poppler-utils
//!
//! # macOS
//! brew install poppler
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::types::{ExtractError, PageRasterizer};

const PDFINFO_COMMAND: &str = "pdfinfo";
const PDFTOPPM_COMMAND: &str = "pdftoppm";

/// Page image prefix inside the output directory
const IMAGE_PREFIX: &str = "page";

/// Rasterizer backed by poppler-utils
#[derive(Debug, Default, Clone, Copy)]
pub struct PopplerRasterizer;

impl PopplerRasterizer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PageRasterizer for PopplerRasterizer {
    async fn page_count(&self, file: &Path) -> Result<u32, ExtractError> {
        let output = Command::new(PDFINFO_COMMAND)
            .arg(file)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExtractError::Tool(format!("Failed to execute {}: {}", PDFINFO_COMMAND, e)))?;

        if !output.status.success() {
            return Err(ExtractError::Tool(format!(
                "{} failed: {}",
                PDFINFO_COMMAND,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_page_count(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            ExtractError::Tool(format!("{} reported no page count", PDFINFO_COMMAND))
        })
    }

    async fn rasterize(
        &self,
        file: &Path,
        first: u32,
        last: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractError> {
        debug!(file = %file.display(), first, last, "Rasterizing pages");

        let output = Command::new(PDFTOPPM_COMMAND)
            .arg("-jpeg")
            .arg("-f")
            .arg(first.to_string())
            .arg("-l")
            .arg(last.to_string())
            .arg(file)
            .arg(out_dir.join(IMAGE_PREFIX))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExtractError::Tool(format!("Failed to execute {}: {}", PDFTOPPM_COMMAND, e)))?;

        if !output.status.success() {
            return Err(ExtractError::Tool(format!(
                "{} failed: {}",
                PDFTOPPM_COMMAND,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut images = Vec::new();
        let mut entries = tokio::fs::read_dir(out_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if page_number(&path).is_some() {
                images.push(path);
            }
        }
        images.sort_by_key(|path| page_number(path));

        Ok(images)
    }
}

/// Extract `N` from a `Pages:      N` line
pub fn parse_page_count(pdfinfo_output: &str) -> Option<u32> {
    pdfinfo_output
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse().ok())
}

/// Page number from `page-7.jpg` / `page-07.jpg`
fn page_number(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    let number = stem.strip_prefix(IMAGE_PREFIX)?.strip_prefix('-')?;
    number.parse().ok()
}
