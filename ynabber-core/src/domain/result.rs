//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    /// A source failed while the orchestrator was collecting transactions
    #[error("reading: {0}")]
    Reading(Box<Error>),

    /// A sink failed while the orchestrator was delivering transactions
    #[error("writing: {0}")]
    Writing(Box<Error>),

    /// The bank connection has not been authorized (yet)
    #[error("requisition for {bank_id} is not authorized (status {status}); approve it at {link}")]
    ConsentPending {
        bank_id: String,
        status: String,
        link: String,
    },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an upstream (remote service) error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an error raised by a source
    pub fn reading(err: Error) -> Self {
        Self::Reading(Box::new(err))
    }

    /// Wrap an error raised by a sink
    pub fn writing(err: Error) -> Self {
        Self::Writing(Box::new(err))
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
