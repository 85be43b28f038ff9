//! Metadata Resolution
//!
//! Queries an ordered list of providers for the book behind a code. The
//! order is fixed: a later provider is consulted only when every earlier one
//! failed or had no match. Provider failures are soft: each is reported as a
//! WARNING on the status channel and the next provider is tried.
//!
//! # Providers
//! 1. **google_books** - Google Books volumes API
//! 2. **openbd** - openBD (Japanese publishers' bibliographic data)

pub mod google_books;
pub mod openbd;

pub use google_books::GoogleBooksProvider;
pub use openbd::OpenBdProvider;

use std::sync::Arc;
use std::time::Duration;

use bookmaker_common::config::ProviderConfig;
use bookmaker_common::StatusSender;
use reqwest::{header, Client};
use tracing::{debug, info};

use crate::types::{BookMetadata, MetadataProvider, ProviderError};

/// User-Agent header sent to every provider
const USER_AGENT: &str = concat!("bookmaker-watch/", env!("CARGO_PKG_VERSION"));

/// Separator after which some providers append attribution (`著者／著`)
const ATTRIBUTION_SEPARATOR: char = '／';

/// Metadata and the provider that supplied it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub provider: &'static str,
    pub metadata: BookMetadata,
}

/// Ordered provider chain
pub struct MetadataResolver {
    providers: Vec<Arc<dyn MetadataProvider>>,
}

impl MetadataResolver {
    pub fn new(providers: Vec<Arc<dyn MetadataProvider>>) -> Self {
        Self { providers }
    }

    /// Google Books, then openBD
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let google: Arc<dyn MetadataProvider> =
            Arc::new(GoogleBooksProvider::new(&config.google_books_url, timeout)?);
        let openbd: Arc<dyn MetadataProvider> =
            Arc::new(OpenBdProvider::new(&config.openbd_url, timeout)?);
        Ok(Self::new(vec![google, openbd]))
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// First usable answer in provider order, or `None` when all are exhausted
    pub async fn resolve(&self, code: &str, status: &StatusSender) -> Option<Resolution> {
        for provider in &self.providers {
            debug!(provider = provider.name(), code = %code, "Querying provider");

            match provider.lookup(code).await {
                Ok(Some(metadata)) => {
                    info!(
                        provider = provider.name(),
                        code = %code,
                        title = %metadata.title,
                        author = %metadata.author,
                        "Book info resolved"
                    );
                    return Some(Resolution {
                        provider: provider.name(),
                        metadata,
                    });
                }
                Ok(None) => {
                    status.warning(format!(
                        "Cannot find book info from {}. ISBN: {}. No matching items.",
                        provider.name(),
                        code
                    ));
                }
                Err(e) => {
                    status.warning(e.to_string());
                }
            }
        }

        None
    }
}

/// Make a title safe and tidy for a file name
///
/// Full-width parentheses and full-width spaces become ordinary spaces,
/// whitespace runs collapse to one space, and trailing whitespace is
/// trimmed. A leading run stays as a single space.
pub fn normalize_title(raw: &str) -> String {
    let mut title = String::with_capacity(raw.len());
    let mut in_space = false;

    for c in raw.chars() {
        let c = match c {
            '（' | '）' | '\u{3000}' => ' ',
            other => other,
        };
        if c.is_whitespace() {
            if !in_space {
                title.push(' ');
            }
            in_space = true;
        } else {
            title.push(c);
            in_space = false;
        }
    }

    title.truncate(title.trim_end().len());
    title
}

/// Drop attribution text such as `／著` from an author field
pub fn truncate_attribution(raw: &str) -> String {
    match raw.find(ATTRIBUTION_SEPARATOR) {
        Some(idx) if idx + ATTRIBUTION_SEPARATOR.len_utf8() < raw.len() => raw[..idx].to_string(),
        _ => raw.to_string(),
    }
}

/// HTTP client shared by the JSON providers
pub(crate) fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );

    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {}", e)))
}

/// Send a request and decode a 200 JSON body; any other status is an error
pub(crate) async fn fetch_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
    provider: &'static str,
    code: &str,
) -> Result<T, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Network(format!("{} request failed: {}", provider, e)))?;

    if response.status() != reqwest::StatusCode::OK {
        return Err(ProviderError::Status {
            provider,
            code: code.to_string(),
            status: response.status().as_u16(),
        });
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::Parse(format!("Failed to parse {} response: {}", provider, e)))
}

// ============================================================================
// Fake Provider for Testing
// ============================================================================


// ============================================================================
// Tests
// ============================================================================
