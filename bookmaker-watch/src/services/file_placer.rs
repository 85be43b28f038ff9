//! File Placement
//!
//! Names a resolved file `[<author>]<title>.<ext>` and moves it into the
//! output directory, or into the `tmp` quarantine directory when the name is
//! already taken there. Files that could not be identified are quarantined
//! under their original name.
//!
//! Placement is rename-in-place followed by a move. An interruption between
//! the two leaves the file renamed in the input directory; nothing recovers
//! it on the next start.
//!
//! The placer also owns the output/tmp directory lifecycle: both are created
//! on session start and removed on teardown when empty.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::models::SessionPaths;
use crate::types::BookMetadata;

/// Where a file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceOutcome {
    /// Landed in the output directory under its canonical name
    Placed(PathBuf),
    /// Moved to quarantine
    Quarantined(PathBuf),
}

impl PlaceOutcome {
    pub fn path(&self) -> &Path {
        match self {
            PlaceOutcome::Placed(path) | PlaceOutcome::Quarantined(path) => path,
        }
    }
}

/// Placement error
#[derive(Debug, Error)]
pub enum PlaceError {
    #[error("Source has no file name: {0}")]
    InvalidSource(PathBuf),

    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Moves files into one session's output and quarantine directories
#[derive(Debug, Clone)]
pub struct FilePlacer {
    output_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl FilePlacer {
    pub fn new(paths: &SessionPaths) -> Self {
        Self {
            output_dir: paths.output.clone(),
            tmp_dir: paths.tmp.clone(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Create the output and tmp directories (idempotent)
    pub async fn prepare(&self) -> Result<(), PlaceError> {
        fs::create_dir_all(&self.tmp_dir).await?;
        debug!(output = %self.output_dir.display(), tmp = %self.tmp_dir.display(), "Placement directories ready");
        Ok(())
    }

    /// Remove tmp if empty, then output if empty
    ///
    /// Failures are logged and otherwise ignored; teardown must not abort.
    pub async fn remove_empty_dirs(&self) {
        for dir in [&self.tmp_dir, &self.output_dir] {
            match is_empty_dir(dir).await {
                Ok(true) => match fs::remove_dir(dir).await {
                    Ok(()) => debug!(dir = %dir.display(), "Removed empty directory"),
                    Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to remove empty directory"),
                },
                Ok(false) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to inspect directory"),
            }
        }
    }

    /// Rename `file` to its canonical name and move it to output, or to
    /// quarantine when output already holds that name
    pub async fn place(&self, file: &Path, metadata: &BookMetadata) -> Result<PlaceOutcome, PlaceError> {
        let name = canonical_name(metadata, file.extension().and_then(|e| e.to_str()));
        let destination = self.output_dir.join(&name);
        let renamed = file.with_file_name(&name);

        if renamed != file {
            if fs::try_exists(&renamed).await? {
                // Renaming would clobber a sibling in the input directory
                warn!(file = %file.display(), name = %name, "Canonical name taken in input directory");
                return self.quarantine(file).await.map(PlaceOutcome::Quarantined);
            }
            fs::rename(file, &renamed).await.map_err(|source| PlaceError::Move {
                from: file.to_path_buf(),
                to: renamed.clone(),
                source,
            })?;
        }

        if fs::try_exists(&destination).await? {
            info!(file = %renamed.display(), existing = %destination.display(), "Name collision in output");
            return self.quarantine(&renamed).await.map(PlaceOutcome::Quarantined);
        }

        move_file(&renamed, &destination).await?;
        info!(from = %file.display(), to = %destination.display(), "File placed");
        Ok(PlaceOutcome::Placed(destination))
    }

    /// Move `file` unmodified into tmp; never overwrites an earlier arrival
    pub async fn quarantine(&self, file: &Path) -> Result<PathBuf, PlaceError> {
        let name = file
            .file_name()
            .ok_or_else(|| PlaceError::InvalidSource(file.to_path_buf()))?;

        let destination = unique_path(&self.tmp_dir, Path::new(name)).await?;
        move_file(file, &destination).await?;
        info!(from = %file.display(), to = %destination.display(), "File quarantined");
        Ok(destination)
    }
}

/// `[<author>]<title>.<ext>` with path separators neutralized
pub fn canonical_name(metadata: &BookMetadata, extension: Option<&str>) -> String {
    let stem = format!(
        "[{}]{}",
        sanitize_component(&metadata.author),
        sanitize_component(&metadata.title)
    );
    match extension {
        Some(ext) if !ext.is_empty() => format!("{}.{}", stem, ext),
        _ => stem,
    }
}

fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect()
}

/// First free `name`, `name (1)`, `name (2)`, … inside `dir`
async fn unique_path(dir: &Path, name: &Path) -> Result<PathBuf, PlaceError> {
    let candidate = dir.join(name);
    if !fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let stem = name.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let extension = name.extension().map(|e| e.to_string_lossy().into_owned());

    let mut n = 1u32;
    loop {
        let numbered = match &extension {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = dir.join(numbered);
        if !fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Rename, falling back to copy + remove across filesystems
async fn move_file(from: &Path, to: &Path) -> Result<(), PlaceError> {
    let move_error = |source| PlaceError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(from = %from.display(), to = %to.display(), error = %e, "Rename failed, copying instead");
            fs::copy(from, to).await.map_err(move_error)?;
            fs::remove_file(from).await.map_err(move_error)?;
            Ok(())
        }
    }
}

async fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    let mut entries = fs::read_dir(dir).await?;
    Ok(entries.next_entry().await?.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn placer(root: &Path) -> FilePlacer {
        let output = root.join("out");
        FilePlacer {
            tmp_dir: output.join("tmp"),
            output_dir: output,
        }
    }

    #[test]
    fn test_canonical_name() {
        let meta = BookMetadata::new("吾輩は猫である", "夏目漱石");
        assert_eq!(canonical_name(&meta, Some("pdf")), "[夏目漱石]吾輩は猫である.pdf");
    }

    #[test]
    fn test_canonical_name_neutralizes_separators() {
        let meta = BookMetadata::new("A/B", "C\\D");
        assert_eq!(canonical_name(&meta, Some("pdf")), "[C_D]A_B.pdf");
    }

    #[tokio::test]
    async fn test_place_into_output() {
        let dir = TempDir::new().unwrap();
        let placer = placer(dir.path());
        placer.prepare().await.unwrap();
        let source = dir.path().join("scan.pdf");
        std::fs::write(&source, b"book").unwrap();

        let outcome = placer.place(&source, &BookMetadata::new("T", "A")).await.unwrap();

        assert_eq!(outcome, PlaceOutcome::Placed(dir.path().join("out/[A]T.pdf")));
        assert!(!source.exists());
        assert!(!dir.path().join("[A]T.pdf").exists(), "renamed file moved on");
    }

    #[tokio::test]
    async fn test_collision_goes_to_tmp() {
        let dir = TempDir::new().unwrap();
        let placer = placer(dir.path());
        placer.prepare().await.unwrap();
        std::fs::write(dir.path().join("out/[A]T.pdf"), b"first").unwrap();
        let source = dir.path().join("scan.pdf");
        std::fs::write(&source, b"second").unwrap();

        let outcome = placer.place(&source, &BookMetadata::new("T", "A")).await.unwrap();

        assert_eq!(outcome, PlaceOutcome::Quarantined(dir.path().join("out/tmp/[A]T.pdf")));
        assert_eq!(std::fs::read(dir.path().join("out/[A]T.pdf")).unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_quarantine_keeps_original_name_and_numbers_duplicates() {
        let dir = TempDir::new().unwrap();
        let placer = placer(dir.path());
        placer.prepare().await.unwrap();

        for _ in 0..2 {
            std::fs::write(dir.path().join("scan.pdf"), b"x").unwrap();
            placer.quarantine(&dir.path().join("scan.pdf")).await.unwrap();
        }

        assert!(dir.path().join("out/tmp/scan.pdf").exists());
        assert!(dir.path().join("out/tmp/scan (1).pdf").exists());
    }

    #[tokio::test]
    async fn test_remove_empty_dirs() {
        let dir = TempDir::new().unwrap();
        let placer = placer(dir.path());
        placer.prepare().await.unwrap();

        placer.remove_empty_dirs().await;

        assert!(!dir.path().join("out/tmp").exists());
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_remove_empty_dirs_keeps_populated_output() {
        let dir = TempDir::new().unwrap();
        let placer = placer(dir.path());
        placer.prepare().await.unwrap();
        std::fs::write(dir.path().join("out/[A]T.pdf"), b"x").unwrap();

        placer.remove_empty_dirs().await;

        assert!(!dir.path().join("out/tmp").exists());
        assert!(dir.path().join("out").exists());
    }
}
