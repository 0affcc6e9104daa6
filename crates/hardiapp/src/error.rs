use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HardiError {
    #[error("Could not open store: {0}")]
    StoreOpen(String),

    #[error("Transaction failed: {0}")]
    Transaction(#[from] rusqlite::Error),

    #[error("Transaction aborted: {0}")]
    Aborted(String),

    #[error("Store operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Save worker is no longer running")]
    WorkerClosed,
}

pub type Result<T> = std::result::Result<T, HardiError>;
