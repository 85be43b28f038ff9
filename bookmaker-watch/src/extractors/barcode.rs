//! ZBar Barcode Decoder
//!
//! Runs `zbarimg --raw -q <image>`; every output line is one decoded payload.
//! zbarimg exits with status 4 when the image simply contains no barcode.

use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::types::{BarcodeDecoder, ExtractError};

const ZBARIMG_COMMAND: &str = "zbarimg";

/// zbarimg exit status for "no symbols found"
const EXIT_NO_SYMBOLS: i32 = 4;

/// Barcode decoder backed by zbar-tools
#[derive(Debug, Default)]
pub struct ZbarDecoder {
    available: OnceLock<bool>,
}

impl ZbarDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BarcodeDecoder for ZbarDecoder {
    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            let available = which::which(ZBARIMG_COMMAND).is_ok();
            debug!(command = ZBARIMG_COMMAND, available, "Barcode decoder availability check");
            available
        })
    }

    async fn decode(&self, image: &Path) -> Result<Vec<String>, ExtractError> {
        let output = Command::new(ZBARIMG_COMMAND)
            .arg("--raw")
            .arg("-q")
            .arg(image)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExtractError::Tool(format!("Failed to execute {}: {}", ZBARIMG_COMMAND, e)))?;

        match output.status.code() {
            Some(0) => Ok(parse_payloads(&String::from_utf8_lossy(&output.stdout))),
            Some(EXIT_NO_SYMBOLS) => Ok(Vec::new()),
            code => Err(ExtractError::Tool(format!(
                "{} exited with {:?}: {}",
                ZBARIMG_COMMAND,
                code,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }
}

fn parse_payloads(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
