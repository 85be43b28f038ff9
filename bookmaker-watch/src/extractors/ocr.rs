//! Tesseract OCR Engine
//!
//! Runs `tesseract <image> stdout -l <lang> --psm 3` (fully automatic page
//! segmentation) and returns the recognized text.
//!
//! # Installation
//! ```bash
//! # Ubuntu/Debian
//! sudo apt-get install tesseract-ocr tesseract-ocr-jpn
//! ```

use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::types::{ExtractError, OcrEngine};

const TESSERACT_COMMAND: &str = "tesseract";

/// Page segmentation mode: fully automatic, no OSD
const PAGE_SEG_MODE: &str = "3";

/// OCR engine backed by the tesseract CLI
#[derive(Debug)]
pub struct TesseractOcr {
    language: String,
    available: OnceLock<bool>,
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            available: OnceLock::new(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &'static str {
        "Tesseract"
    }

    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            let available = which::which(TESSERACT_COMMAND).is_ok();
            debug!(command = TESSERACT_COMMAND, available, "OCR availability check");
            available
        })
    }

    async fn recognize(&self, image: &Path) -> Result<String, ExtractError> {
        let output = Command::new(TESSERACT_COMMAND)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(PAGE_SEG_MODE)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ExtractError::Tool(format!("Failed to execute {}: {}", TESSERACT_COMMAND, e)))?;

        if !output.status.success() {
            return Err(ExtractError::Tool(format!(
                "{} failed: {}",
                TESSERACT_COMMAND,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
