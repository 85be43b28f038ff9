//! Common error types for BookMaker

use thiserror::Error;

/// Common result type for BookMaker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the library and its front ends
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or parsing error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input (directory or extension selection)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
