//! Core Types and Capability Traits for bookmaker-watch
//!
//! The pipeline is assembled from small capabilities, each behind a trait so
//! the session can be driven by real external tools in production and by
//! fakes in tests:
//! - **Extraction:** `IdentifierTool` (fast path), `PageRasterizer`,
//!   `BarcodeDecoder`, `OcrEngine`
//! - **Resolution:** `MetadataProvider`
//! - **Dispatch:** `FileEventSink` (what the directory observer calls)

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Common Types
// ============================================================================

/// Bibliographic metadata used to name a file
///
/// Values are already normalized by the provider that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
}

impl BookMetadata {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
        }
    }
}

impl fmt::Display for BookMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Title: {}, Author: {}", self.title, self.author)
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Fast-path identifier tool
///
/// `None` means "could not identify", which sends extraction down the
/// fallback path. It is never an error.
#[async_trait::async_trait]
pub trait IdentifierTool: Send + Sync {
    fn name(&self) -> &'static str;

    async fn identify(&self, file: &Path) -> Option<String>;
}

/// Document → page images
#[async_trait::async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Total number of pages in the document
    async fn page_count(&self, file: &Path) -> Result<u32, ExtractError>;

    /// Render pages `first..=last` (1-based) into `out_dir`
    ///
    /// Returns image paths in page order.
    async fn rasterize(
        &self,
        file: &Path,
        first: u32,
        last: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractError>;
}

/// Barcode reader for page images
#[async_trait::async_trait]
pub trait BarcodeDecoder: Send + Sync {
    fn is_available(&self) -> bool;

    /// All barcode payloads found in the image, in decode order
    async fn decode(&self, image: &Path) -> Result<Vec<String>, ExtractError>;
}

/// Optical text recognition for page images
#[async_trait::async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    async fn recognize(&self, image: &Path) -> Result<String, ExtractError>;
}

/// Extraction error
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Neither barcode nor text yielded a code (per-file, soft)
    #[error("Cannot get ISBN from {0}.")]
    NoIdentifierFound(String),

    /// Fallback text path needed but no OCR engine is installed (session-fatal)
    #[error("Cannot find OCR tool.")]
    NoDecoderAvailable,

    /// External helper failed (page count, rasterization, decode)
    #[error("Tool error: {0}")]
    Tool(String),

    /// I/O error (temporary directory, reading tool output)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Whether this failure will recur for every subsequent file
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExtractError::NoDecoderAvailable)
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Remote metadata source queried by code
///
/// `Ok(None)` means the provider answered but had no match.
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn lookup(&self, code: &str) -> Result<Option<BookMetadata>, ProviderError>;
}

/// Provider error (always soft: the next provider may still answer)
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-success HTTP status
    #[error("Cannot find book info from {provider}. ISBN: {code}. Status Code: {status}.")]
    Status {
        provider: &'static str,
        code: String,
        status: u16,
    },

    /// Request did not complete
    #[error("Network error: {0}")]
    Network(String),

    /// Response body did not match the provider schema
    #[error("Parse error: {0}")]
    Parse(String),
}

// ============================================================================
// Dispatch
// ============================================================================

/// Receiver of file-creation events from the directory observer
#[async_trait::async_trait]
pub trait FileEventSink: Send + Sync {
    /// Whether `path` matches the sink's file patterns
    fn accepts(&self, path: &Path) -> bool;

    /// Handle one newly created file
    ///
    /// Only session-fatal conditions are returned as errors; everything else
    /// is reported through the status channel.
    async fn on_file_created(&self, path: &Path) -> Result<(), HandlerError>;
}

/// Error escaping a file event
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Fatal: {0}")]
    Fatal(#[source] ExtractError),
}
