//! Configuration loading and input validation
//!
//! Resolution priority for every overridable field:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable naming the TOML config file
pub const ENV_CONFIG: &str = "BOOKMAKER_CONFIG";
/// Environment variable for the watched directory
pub const ENV_INPUT_DIR: &str = "BOOKMAKER_INPUT_DIR";
/// Environment variable for the output directory
pub const ENV_OUTPUT_DIR: &str = "BOOKMAKER_OUTPUT_DIR";
/// Environment variable for the extension list (comma separated)
pub const ENV_EXTENSIONS: &str = "BOOKMAKER_EXTENSIONS";

/// File types the pipeline knows how to rasterize
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf"];

/// Watch pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory to watch (direct children only)
    pub input_dir: Option<PathBuf>,
    /// Directory receiving renamed files; may equal `input_dir`
    pub output_dir: Option<PathBuf>,
    /// File suffixes without leading dot
    pub extensions: Vec<String>,
    /// How many trailing pages to rasterize in the fallback path
    pub fallback_pages: u32,
    /// Fast-path identifier tool, invoked as `<tool> <file>`
    pub isbn_tool: PathBuf,
    /// OCR language passed to the OCR engine
    pub ocr_language: String,
    /// Status polling interval for front ends
    pub poll_interval_ms: u64,
    /// Metadata provider endpoints
    pub providers: ProviderConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            input_dir: None,
            output_dir: None,
            extensions: vec!["pdf".to_string()],
            fallback_pages: 2,
            isbn_tool: PathBuf::from("getISBN.sh"),
            ocr_language: "jpn".to_string(),
            poll_interval_ms: 100,
            providers: ProviderConfig::default(),
        }
    }
}

/// Metadata provider endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub google_books_url: String,
    pub openbd_url: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            google_books_url: "https://www.googleapis.com/books/v1/volumes".to_string(),
            openbd_url: "https://api.openbd.jp/v1/get".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Values given on the command line; `None` defers to lower tiers
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub extensions: Vec<String>,
}

impl WatchConfig {
    /// Parse a TOML config file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Resolve configuration from all tiers
    ///
    /// A missing config file is not an error: defaults are used with a warning.
    /// A config file that exists but does not parse is.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match config_file_path(overrides.config_file.as_deref()) {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading config file");
                Self::from_toml_file(&path)?
            }
            Some(path) => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            None => {
                warn!("Could not determine config directory, using defaults");
                Self::default()
            }
        };

        if let Ok(dir) = std::env::var(ENV_INPUT_DIR) {
            config.input_dir = Some(PathBuf::from(dir));
        }
        if let Ok(dir) = std::env::var(ENV_OUTPUT_DIR) {
            config.output_dir = Some(PathBuf::from(dir));
        }
        if let Ok(list) = std::env::var(ENV_EXTENSIONS) {
            config.extensions = parse_extension_list(&list);
        }

        if let Some(dir) = &overrides.input_dir {
            config.input_dir = Some(dir.clone());
        }
        if let Some(dir) = &overrides.output_dir {
            config.output_dir = Some(dir.clone());
        }
        if !overrides.extensions.is_empty() {
            config.extensions = overrides.extensions.clone();
        }

        Ok(config)
    }

    /// Check the directory and extension selection before a session is built
    ///
    /// Returns the validated `(input, output)` pair.
    pub fn validate(&self) -> Result<(PathBuf, PathBuf)> {
        let input = validate_dir(self.input_dir.as_deref(), "input")?;
        let output = validate_dir(self.output_dir.as_deref(), "output")?;
        validate_extensions(&self.extensions)?;
        if self.fallback_pages == 0 {
            return Err(Error::InvalidInput(
                "fallback_pages must be at least 1".to_string(),
            ));
        }
        Ok((input, output))
    }
}

/// Config file location: explicit path, then `BOOKMAKER_CONFIG`, then the
/// per-user config directory
fn config_file_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("bookmaker").join("config.toml"))
}

fn parse_extension_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_string())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Directory must be given, and must exist as a directory
///
/// Returns the canonical path, so two spellings of one directory compare
/// equal afterwards.
pub fn validate_dir(dir: Option<&Path>, role: &str) -> Result<PathBuf> {
    let dir = match dir {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => {
            return Err(Error::InvalidInput(format!(
                "Please select the {} directory",
                role
            )))
        }
    };

    if !dir.is_dir() {
        return Err(Error::InvalidInput(format!(
            "The {} directory is not a directory: {}",
            role,
            dir.display()
        )));
    }

    Ok(std::fs::canonicalize(dir)?)
}

/// Extensions must be non-empty and all supported
pub fn validate_extensions(extensions: &[String]) -> Result<()> {
    if extensions.is_empty() {
        return Err(Error::InvalidInput("No file type selected".to_string()));
    }

    for ext in extensions {
        let normalized = ext.trim_start_matches('.').to_ascii_lowercase();
        if !SUPPORTED_EXTENSIONS.contains(&normalized.as_str()) {
            return Err(Error::InvalidInput(format!(
                "File type is not in the list: {} (supported: {})",
                ext,
                SUPPORTED_EXTENSIONS.join(", ")
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extension_list() {
        assert_eq!(parse_extension_list("pdf, .PDF,,"), vec!["pdf", "PDF"]);
    }

    #[test]
    fn test_validate_extensions_case_insensitive() {
        assert!(validate_extensions(&["PDF".to_string()]).is_ok());
        assert!(validate_extensions(&[".pdf".to_string()]).is_ok());
    }

    #[test]
    fn test_validate_extensions_rejects_unknown() {
        let err = validate_extensions(&["epub".to_string()]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(msg) if msg.contains("epub")));
    }

    #[test]
    fn test_validate_extensions_rejects_empty() {
        assert!(matches!(
            validate_extensions(&[]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validate_dir_missing_value_names_role() {
        let err = validate_dir(None, "output").unwrap_err();
        assert!(err.to_string().contains("output"));
    }
}
