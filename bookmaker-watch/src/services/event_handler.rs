//! Per-session file event handler
//!
//! Binds extraction, resolution and placement for one session. Every stage
//! reports to the status channel; only a missing OCR engine escapes as an
//! error, because it would fail every later file the same way.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bookmaker_common::StatusSender;
use tracing::{debug, error};

use super::file_placer::{canonical_name, FilePlacer, PlaceOutcome};
use crate::extractors::IdentifierExtractor;
use crate::providers::MetadataResolver;
use crate::types::{FileEventSink, HandlerError};

/// Handles file-creation events for one session
pub struct EventHandler {
    extractor: Arc<IdentifierExtractor>,
    resolver: Arc<MetadataResolver>,
    placer: FilePlacer,
    status: StatusSender,
    /// Lower-case extensions without a leading dot
    extensions: Vec<String>,
}

impl EventHandler {
    pub fn new(
        extractor: Arc<IdentifierExtractor>,
        resolver: Arc<MetadataResolver>,
        placer: FilePlacer,
        status: StatusSender,
        extensions: &[String],
    ) -> Self {
        Self {
            extractor,
            resolver,
            placer,
            status,
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    async fn resolve_and_place(&self, path: &Path, code: &str) {
        let Some(resolution) = self.resolver.resolve(code, &self.status).await else {
            self.status
                .warning(format!("Cannot find book info from any provider. ISBN: {}.", code));
            self.quarantine(path).await;
            return;
        };

        let metadata = &resolution.metadata;
        self.status.info(format!(
            "<{}> Title: {}, Author: {}.",
            resolution.provider, metadata.title, metadata.author
        ));

        match self.placer.place(path, metadata).await {
            Ok(PlaceOutcome::Placed(destination)) => {
                self.status.info(format!(
                    "Move {} to {}.",
                    display_name(&destination),
                    self.placer.output_dir().display()
                ));
            }
            Ok(PlaceOutcome::Quarantined(destination)) => {
                let taken = self.placer.output_dir().join(canonical_name(
                    metadata,
                    path.extension().and_then(|e| e.to_str()),
                ));
                self.status.warning(format!(
                    "{} already exists!\nMove {} to {}.",
                    taken.display(),
                    display_name(&destination),
                    self.placer.tmp_dir().display()
                ));
            }
            Err(e) => {
                self.status
                    .warning(format!("Failed to place {}: {}", path.display(), e));
            }
        }
    }

    /// Move the file as-is into tmp and report it
    async fn quarantine(&self, path: &Path) {
        match self.placer.quarantine(path).await {
            Ok(destination) => {
                self.status.warning(format!(
                    "Move {} to {}.",
                    display_name(&destination),
                    self.placer.tmp_dir().display()
                ));
            }
            Err(e) => {
                self.status
                    .warning(format!("Failed to move {} to tmp: {}", path.display(), e));
            }
        }
    }
}

#[async_trait]
impl FileEventSink for EventHandler {
    fn accepts(&self, path: &Path) -> bool {
        matches_extension(path, &self.extensions)
    }

    async fn on_file_created(&self, path: &Path) -> Result<(), HandlerError> {
        self.status.info(format!("File detected! {}.", path.display()));

        match self.extractor.resolve(path).await {
            Ok(found) => {
                self.status
                    .info(format!("ISBN was found from {}: {}.", found.source, found.code));
                self.resolve_and_place(path, &found.code).await;
                Ok(())
            }
            Err(e) if e.is_fatal() => {
                error!(file = %path.display(), error = %e, "Session-fatal extraction failure");
                self.status.error(e.to_string());
                Err(HandlerError::Fatal(e))
            }
            Err(e) => {
                debug!(file = %path.display(), error = %e, "Extraction failed");
                self.status.warning(e.to_string());
                self.quarantine(path).await;
                Ok(())
            }
        }
    }
}

/// ASCII case-insensitive extension match
pub fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::mock::{FakeBarcode, FakeOcr, FakeRasterizer, FakeTool};
    use crate::models::SessionPaths;
    use crate::providers::mock::{Answer, FakeProvider};
    use crate::types::{BookMetadata, ExtractError, MetadataProvider, OcrEngine};
    use bookmaker_common::status::{self, Severity, StatusReceiver};
    use bookmaker_common::time::SystemClock;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        handler: EventHandler,
        rx: StatusReceiver,
    }

    async fn fixture(fast_path: Option<&str>, ocr_available: bool, answer: Answer) -> Fixture {
        let dir = TempDir::new().unwrap();
        let paths = SessionPaths::resolve(dir.path(), &dir.path().join("out"), &SystemClock);
        let placer = FilePlacer::new(&paths);
        placer.prepare().await.unwrap();

        let ocr: Arc<dyn OcrEngine> = Arc::new(FakeOcr {
            available: ocr_available,
            texts: HashMap::new(),
            calls: Default::default(),
        });
        let extractor = IdentifierExtractor::new(
            Arc::new(FakeTool::new(fast_path)),
            Arc::new(FakeRasterizer::new(2)),
            Arc::new(FakeBarcode {
                available: true,
                payloads: HashMap::new(),
            }),
            vec![ocr],
            2,
        );
        let provider: Arc<dyn MetadataProvider> = FakeProvider::new("Google", answer);
        let resolver = MetadataResolver::new(vec![provider]);

        let (tx, rx) = status::channel();
        let handler = EventHandler::new(
            Arc::new(extractor),
            Arc::new(resolver),
            placer,
            tx,
            &["pdf".to_string()],
        );

        Fixture { dir, handler, rx }
    }

    fn texts(rx: &mut StatusReceiver) -> Vec<(Severity, String)> {
        rx.drain().into_iter().map(|m| (m.severity, m.text)).collect()
    }

    #[test]
    fn test_matches_extension_case_insensitive() {
        let exts = vec!["pdf".to_string()];
        assert!(matches_extension(Path::new("/in/a.PDF"), &exts));
        assert!(matches_extension(Path::new("/in/a.pdf"), &exts));
        assert!(!matches_extension(Path::new("/in/a.epub"), &exts));
        assert!(!matches_extension(Path::new("/in/pdf"), &exts));
    }

    #[tokio::test]
    async fn test_resolved_file_is_placed() {
        let mut fx = fixture(
            Some("9784101010014"),
            true,
            Answer::Found(BookMetadata::new("吾輩は猫である", "夏目漱石")),
        )
        .await;
        let file = fx.dir.path().join("scan.pdf");
        std::fs::write(&file, b"x").unwrap();

        fx.handler.on_file_created(&file).await.unwrap();

        assert!(fx.dir.path().join("out/[夏目漱石]吾輩は猫である.pdf").exists());
        let messages = texts(&mut fx.rx);
        assert_eq!(messages[0].1, format!("File detected! {}.", file.display()));
        assert_eq!(messages[1].1, "ISBN was found from shell: 9784101010014.");
        assert_eq!(messages[2].1, "<Google> Title: 吾輩は猫である, Author: 夏目漱石.");
        assert!(messages[3].1.starts_with("Move [夏目漱石]吾輩は猫である.pdf to "));
        assert!(messages.iter().all(|(s, _)| *s == Severity::Info));
    }

    #[tokio::test]
    async fn test_unidentified_file_is_quarantined_unmodified() {
        let mut fx = fixture(None, true, Answer::Empty).await;
        let file = fx.dir.path().join("scan.pdf");
        std::fs::write(&file, b"x").unwrap();

        fx.handler.on_file_created(&file).await.unwrap();

        assert!(fx.dir.path().join("out/tmp/scan.pdf").exists());
        let messages = texts(&mut fx.rx);
        assert!(messages.contains(&(Severity::Warning, "Cannot get ISBN from scan.pdf.".to_string())));
        assert_eq!(messages.last().unwrap().0, Severity::Warning);
    }

    #[tokio::test]
    async fn test_unresolved_code_is_quarantined() {
        let mut fx = fixture(Some("9784000000000"), true, Answer::Status(404)).await;
        let file = fx.dir.path().join("scan.pdf");
        std::fs::write(&file, b"x").unwrap();

        fx.handler.on_file_created(&file).await.unwrap();

        assert!(fx.dir.path().join("out/tmp/scan.pdf").exists());
        let warnings = texts(&mut fx.rx)
            .into_iter()
            .filter(|(s, _)| *s == Severity::Warning)
            .count();
        assert_eq!(warnings, 3, "provider miss, resolver exhausted, move");
    }

    #[tokio::test]
    async fn test_missing_ocr_is_fatal() {
        let mut fx = fixture(None, false, Answer::Empty).await;
        let file = fx.dir.path().join("scan.pdf");
        std::fs::write(&file, b"x").unwrap();

        let err = fx.handler.on_file_created(&file).await.unwrap_err();

        assert!(matches!(err, HandlerError::Fatal(ExtractError::NoDecoderAvailable)));
        assert!(file.exists(), "file left in place");
        let last = fx.rx.drain().pop().unwrap();
        assert_eq!(last.severity, Severity::Error);
        assert_eq!(last.text, "Cannot find OCR tool.");
    }
}
