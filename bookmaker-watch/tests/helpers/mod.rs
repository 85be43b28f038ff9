//! Shared fakes and fixtures for bookmaker-watch integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bookmaker_common::status::StatusReceiver;
use bookmaker_common::time::FixedClock;
use bookmaker_common::StatusMessage;
use bookmaker_watch::types::{
    BarcodeDecoder, IdentifierTool, MetadataProvider, OcrEngine, PageRasterizer,
};
use bookmaker_watch::{BookMetadata, ExtractError, IdentifierExtractor, MetadataResolver, ProviderError};
use chrono::NaiveDate;

/// How long a scenario waits for the observer to deliver an event
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn noon_2024_01_01() -> FixedClock {
    FixedClock(
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
    )
}

/// Fast path with a canned answer
pub struct StaticTool(pub Option<String>);

#[async_trait]
impl IdentifierTool for StaticTool {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn identify(&self, _file: &Path) -> Option<String> {
        self.0.clone()
    }
}

/// Rasterizer producing empty page images
pub struct BlankPages(pub u32);

#[async_trait]
impl PageRasterizer for BlankPages {
    async fn page_count(&self, _file: &Path) -> Result<u32, ExtractError> {
        Ok(self.0)
    }

    async fn rasterize(
        &self,
        _file: &Path,
        first: u32,
        last: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractError> {
        let mut images = Vec::new();
        for page in first..=last {
            let image = out_dir.join(format!("page-{}.jpg", page));
            std::fs::write(&image, b"")?;
            images.push(image);
        }
        Ok(images)
    }
}

/// Decoder that never finds anything
pub struct NoBarcodes;

#[async_trait]
impl BarcodeDecoder for NoBarcodes {
    fn is_available(&self) -> bool {
        true
    }

    async fn decode(&self, _image: &Path) -> Result<Vec<String>, ExtractError> {
        Ok(Vec::new())
    }
}

/// OCR engine that reads nothing
pub struct BlankOcr {
    pub available: bool,
}

#[async_trait]
impl OcrEngine for BlankOcr {
    fn name(&self) -> &'static str {
        "blank"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn recognize(&self, _image: &Path) -> Result<String, ExtractError> {
        Ok(String::new())
    }
}

/// Provider with a fixed answer
pub struct StaticProvider {
    pub metadata: Option<BookMetadata>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl MetadataProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "Static"
    }

    async fn lookup(&self, _code: &str) -> Result<Option<BookMetadata>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.metadata.clone())
    }
}

pub fn extractor(fast_path: Option<&str>, ocr_available: bool) -> Arc<IdentifierExtractor> {
    let ocr: Arc<dyn OcrEngine> = Arc::new(BlankOcr {
        available: ocr_available,
    });
    Arc::new(IdentifierExtractor::new(
        Arc::new(StaticTool(fast_path.map(str::to_string))),
        Arc::new(BlankPages(3)),
        Arc::new(NoBarcodes),
        vec![ocr],
        2,
    ))
}

pub fn resolver(metadata: Option<BookMetadata>) -> Arc<MetadataResolver> {
    let provider: Arc<dyn MetadataProvider> = Arc::new(StaticProvider {
        metadata,
        calls: AtomicUsize::new(0),
    });
    Arc::new(MetadataResolver::new(vec![provider]))
}

/// Receive until `pred` matches, keeping everything seen; false on timeout
pub async fn wait_for(
    rx: &mut StatusReceiver,
    seen: &mut Vec<StatusMessage>,
    pred: impl Fn(&StatusMessage) -> bool,
) -> bool {
    let wait = async {
        while let Some(message) = rx.recv().await {
            let hit = pred(&message);
            seen.push(message);
            if hit {
                return true;
            }
        }
        false
    };
    tokio::time::timeout(EVENT_TIMEOUT, wait).await.unwrap_or(false)
}
