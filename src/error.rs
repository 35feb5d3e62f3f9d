// Error types shared by the storage layer.
//
// Remote faults are kept typed so the batch executor and the tests can tell
// them apart, even though the console only ever prints them.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("container name \"{name}\" is valid but the service rejected its creation: {reason}")]
    CreationRejected { name: String, reason: String },

    #[error("{operation} failed: HTTP {status} - {body}")]
    Http {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("signing error: {0}")]
    Signing(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
