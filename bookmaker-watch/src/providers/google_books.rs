//! Google Books Provider
//!
//! `GET {base}?q=isbn:{code}` against the volumes API. The first volume's
//! `title` and `subtitle` are joined and normalized; the first listed author
//! is used verbatim.
//!
//! # API Reference
//! - Endpoint: https://www.googleapis.com/books/v1/volumes
//! - Documentation: https://developers.google.com/books/docs/v1/using

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{fetch_json, http_client, normalize_title};
use crate::types::{BookMetadata, MetadataProvider, ProviderError};

const PROVIDER_NAME: &str = "Google";

/// Google Books volumes client
pub struct GoogleBooksProvider {
    http_client: Client,
    base_url: String,
}

impl GoogleBooksProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: http_client(timeout)?,
            base_url: base_url.to_string(),
        })
    }
}

#[async_trait]
impl MetadataProvider for GoogleBooksProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn lookup(&self, code: &str) -> Result<Option<BookMetadata>, ProviderError> {
        let request = self
            .http_client
            .get(&self.base_url)
            .query(&[("q", format!("isbn:{}", code))]);

        let response: VolumesResponse = fetch_json(request, PROVIDER_NAME, code).await?;
        debug!(code = %code, total_items = response.total_items, "Google Books response");

        Ok(metadata_from_volumes(response))
    }
}

fn metadata_from_volumes(response: VolumesResponse) -> Option<BookMetadata> {
    if response.total_items == 0 {
        return None;
    }

    let info = response.items.into_iter().next()?.volume_info;
    let title = normalize_title(&format!("{} {}", info.title, info.subtitle));
    if title.is_empty() {
        return None;
    }
    let author = info.authors.into_iter().next().unwrap_or_default();

    Some(BookMetadata { title, author })
}

// ============================================================================
// Google Books API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumesResponse {
    #[serde(default)]
    total_items: u64,
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
struct VolumeInfo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    subtitle: String,
    #[serde(default)]
    authors: Vec<String>,
}
