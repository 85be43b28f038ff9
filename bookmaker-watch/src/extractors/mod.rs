//! Identifier Extraction
//!
//! Resolves a book code (ISBN) from a newly arrived document using staged,
//! short-circuiting fallback:
//!
//! 1. **Fast path** - external tool (`external_tool`). A hit returns
//!    immediately; no page is ever rasterized.
//! 2. **Fallback path** - rasterize the last N pages (`rasterizer`) into a
//!    scoped temporary directory, then:
//!    a. **Barcode scan** (`barcode`) - first payload starting with `978`
//!    b. **Text scan** (`ocr`) - last `978-x-xxxx-xxxx-x` match on the first
//!       page that has one
//! 3. Otherwise `NoIdentifierFound`.
//!
//! A missing OCR engine is reported as `NoDecoderAvailable`, distinct from
//! "no identifier": it affects every later file, not just this one.

pub mod barcode;
pub mod external_tool;
pub mod ocr;
pub mod rasterizer;

pub use barcode::ZbarDecoder;
pub use external_tool::ExternalIsbnTool;
pub use ocr::TesseractOcr;
pub use rasterizer::PopplerRasterizer;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use bookmaker_common::config::WatchConfig;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::types::{BarcodeDecoder, ExtractError, IdentifierTool, OcrEngine, PageRasterizer};

/// Barcode payload prefix for book codes
pub const BARCODE_PREFIX: &str = "978";

/// Hyphenated ISBN-13 as printed in a colophon
const TEXT_PATTERN: &str = r"978-[0-4]-\d{4}-\d{4}-\d";

fn text_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(TEXT_PATTERN).expect("TEXT_PATTERN is a valid regex"))
}

/// Which stage produced the code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierSource {
    FastPath,
    Barcode,
    Text,
}

impl fmt::Display for IdentifierSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierSource::FastPath => f.write_str("shell"),
            IdentifierSource::Barcode => f.write_str("barcode"),
            IdentifierSource::Text => f.write_str("text"),
        }
    }
}

/// A resolved code and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identified {
    pub code: String,
    pub source: IdentifierSource,
}

/// Staged identifier extractor
pub struct IdentifierExtractor {
    fast_path: Arc<dyn IdentifierTool>,
    rasterizer: Arc<dyn PageRasterizer>,
    barcode: Arc<dyn BarcodeDecoder>,
    /// OCR engines in preference order; the first available one is used
    ocr_engines: Vec<Arc<dyn OcrEngine>>,
    /// Trailing pages to rasterize
    fallback_pages: u32,
}

impl IdentifierExtractor {
    pub fn new(
        fast_path: Arc<dyn IdentifierTool>,
        rasterizer: Arc<dyn PageRasterizer>,
        barcode: Arc<dyn BarcodeDecoder>,
        ocr_engines: Vec<Arc<dyn OcrEngine>>,
        fallback_pages: u32,
    ) -> Self {
        Self {
            fast_path,
            rasterizer,
            barcode,
            ocr_engines,
            fallback_pages: fallback_pages.max(1),
        }
    }

    /// Production extractor built from external tools
    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(
            Arc::new(ExternalIsbnTool::new(config.isbn_tool.clone())),
            Arc::new(PopplerRasterizer::new()),
            Arc::new(ZbarDecoder::new()),
            vec![Arc::new(TesseractOcr::new(config.ocr_language.clone())) as Arc<dyn OcrEngine>],
            config.fallback_pages,
        )
    }

    /// Resolve a code for `file`
    pub async fn resolve(&self, file: &Path) -> Result<Identified, ExtractError> {
        if let Some(code) = self.fast_path.identify(file).await {
            debug!(file = %file.display(), tool = self.fast_path.name(), code = %code, "Fast path hit");
            return Ok(Identified {
                code,
                source: IdentifierSource::FastPath,
            });
        }

        debug!(file = %file.display(), "Fast path missed, falling back to page images");
        self.resolve_from_pages(file).await
    }

    async fn resolve_from_pages(&self, file: &Path) -> Result<Identified, ExtractError> {
        let total_pages = self.rasterizer.page_count(file).await?;
        let (first, last) =
            page_window(total_pages, self.fallback_pages).ok_or_else(|| not_found(file))?;

        // Dropped on every return below, removing the page images with it
        let scratch = tempfile::TempDir::new()?;
        let images = self
            .rasterizer
            .rasterize(file, first, last, scratch.path())
            .await?;

        debug!(
            file = %file.display(),
            total_pages,
            first,
            last,
            images = images.len(),
            "Pages rasterized"
        );

        if let Some(code) = self.scan_barcodes(&images).await {
            return Ok(Identified {
                code,
                source: IdentifierSource::Barcode,
            });
        }

        if let Some(code) = self.scan_text(&images).await? {
            return Ok(Identified {
                code,
                source: IdentifierSource::Text,
            });
        }

        Err(not_found(file))
    }

    async fn scan_barcodes(&self, images: &[PathBuf]) -> Option<String> {
        if !self.barcode.is_available() {
            warn!("No barcode decoder installed, skipping barcode scan");
            return None;
        }

        for image in images {
            match self.barcode.decode(image).await {
                Ok(payloads) => {
                    if let Some(code) = code_from_barcodes(&payloads) {
                        return Some(code);
                    }
                }
                Err(e) => {
                    warn!(image = %image.display(), error = %e, "Barcode decode failed");
                }
            }
        }

        None
    }

    async fn scan_text(&self, images: &[PathBuf]) -> Result<Option<String>, ExtractError> {
        let engine = self
            .ocr_engines
            .iter()
            .find(|engine| engine.is_available())
            .ok_or(ExtractError::NoDecoderAvailable)?;

        info!(engine = engine.name(), pages = images.len(), "Running OCR");

        for image in images {
            let text = match engine.recognize(image).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(image = %image.display(), error = %e, "OCR failed");
                    continue;
                }
            };

            if let Some(code) = code_from_text(&text) {
                return Ok(Some(code));
            }
        }

        Ok(None)
    }
}

fn not_found(file: &Path) -> ExtractError {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    ExtractError::NoIdentifierFound(name)
}

/// 1-based inclusive page range covering the last `pages` pages
///
/// Documents shorter than `pages` yield every page; empty documents yield
/// nothing.
pub fn page_window(total_pages: u32, pages: u32) -> Option<(u32, u32)> {
    if total_pages == 0 {
        return None;
    }
    let first = total_pages.saturating_sub(pages.max(1)) + 1;
    Some((first, total_pages))
}

/// First payload that looks like a book code, separators removed
pub fn code_from_barcodes(payloads: &[String]) -> Option<String> {
    payloads
        .iter()
        .find(|payload| payload.starts_with(BARCODE_PREFIX))
        .map(|payload| strip_separators(payload))
}

/// Last code printed in `text`, separators removed
pub fn code_from_text(text: &str) -> Option<String> {
    text_pattern()
        .find_iter(text)
        .last()
        .map(|m| strip_separators(m.as_str()))
}

fn strip_separators(code: &str) -> String {
    code.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect()
}

// ============================================================================
// Fakes for Testing
// ============================================================================


// ============================================================================
// Tests
// ============================================================================
