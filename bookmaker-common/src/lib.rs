//! # BookMaker Common Library
//!
//! Shared code for the BookMaker watch pipeline and its front ends:
//! - Error types
//! - Status channel (severity-tagged messages from the worker to a consumer)
//! - Configuration loading and input validation
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod status;
pub mod time;

pub use error::{Error, Result};
pub use status::{Severity, StatusMessage, StatusReceiver, StatusSender};
