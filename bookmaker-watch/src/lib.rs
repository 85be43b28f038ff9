//! bookmaker-watch library interface
//!
//! Watches a directory for new documents, extracts a book code from each,
//! looks the code up with remote providers and files the document under
//! `[<author>]<title>.<ext>`. Progress is reported on a
//! [`bookmaker_common::status`] channel; the binary in `main.rs` is one
//! consumer of it.

pub mod error;
pub mod extractors;
pub mod models;
pub mod providers;
pub mod services;
pub mod types;

pub use crate::error::{SessionError, SessionResult};
pub use crate::extractors::{IdentifierExtractor, IdentifierSource, Identified};
pub use crate::models::{SessionPaths, SessionState};
pub use crate::providers::{MetadataResolver, Resolution};
pub use crate::services::{EventHandler, FilePlacer, PlaceOutcome, WatchSession};
pub use crate::types::{BookMetadata, ExtractError, HandlerError, ProviderError};
