//! openBD Provider
//!
//! `GET {base}?isbn={code}` returns a JSON array with one entry per
//! requested code; unknown codes come back as `null`. The `summary` object
//! carries the title and a free-form author field that appends attribution
//! after `／` (`夏目漱石／著`), which is cut off.
//!
//! # API Reference
//! - Endpoint: https://api.openbd.jp/v1/get
//! - Documentation: https://openbd.jp/

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{fetch_json, http_client, normalize_title, truncate_attribution};
use crate::types::{BookMetadata, MetadataProvider, ProviderError};

const PROVIDER_NAME: &str = "openBD";

/// openBD client
pub struct OpenBdProvider {
    http_client: Client,
    base_url: String,
}

impl OpenBdProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: http_client(timeout)?,
            base_url: base_url.to_string(),
        })
    }
}

#[async_trait]
impl MetadataProvider for OpenBdProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn lookup(&self, code: &str) -> Result<Option<BookMetadata>, ProviderError> {
        let request = self.http_client.get(&self.base_url).query(&[("isbn", code)]);

        let records: Vec<Option<OpenBdRecord>> = fetch_json(request, PROVIDER_NAME, code).await?;
        debug!(code = %code, records = records.len(), "openBD response");

        Ok(metadata_from_records(records))
    }
}

fn metadata_from_records(records: Vec<Option<OpenBdRecord>>) -> Option<BookMetadata> {
    let summary = records.into_iter().next()??.summary;

    let title = normalize_title(&summary.title);
    if title.is_empty() {
        return None;
    }

    Some(BookMetadata {
        title,
        author: truncate_attribution(&summary.author),
    })
}

// ============================================================================
// openBD API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenBdRecord {
    #[serde(default)]
    summary: Summary,
}

#[derive(Debug, Default, Deserialize)]
struct Summary {
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Option<BookMetadata> {
        metadata_from_records(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_summary_normalized() {
        let meta = parse(
            r#"[{
                "onix": {},
                "summary": {
                    "isbn": "9784101010014",
                    "title": "吾輩は猫である　（改版）",
                    "author": "夏目漱石／著",
                    "publisher": "新潮社"
                }
            }]"#,
        )
        .unwrap();

        assert_eq!(meta.title, "吾輩は猫である 改版");
        assert_eq!(meta.author, "夏目漱石");
    }

    #[test]
    fn test_null_record_is_no_result() {
        assert!(parse("[null]").is_none());
    }

    #[test]
    fn test_empty_array_is_no_result() {
        assert!(parse("[]").is_none());
    }

    #[test]
    fn test_author_without_attribution_kept() {
        let meta = parse(r#"[{"summary": {"title": "坊っちゃん", "author": "夏目漱石"}}]"#).unwrap();
        assert_eq!(meta.author, "夏目漱石");
    }
}
