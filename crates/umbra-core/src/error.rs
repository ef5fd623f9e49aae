use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UmbraError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Planning error: {0}")]
    Planning(String),

    #[error("Missing migration artifact: {0}")]
    MissingMigrationArtifact(String),

    #[error("Concurrent migration: {0}")]
    ConcurrentMigration(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Replay error: {0}")]
    Replay(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, UmbraError>;

// Custom Error Types:
//
// Umbra supports custom error types through the `#[from] anyhow::Error` variant.
// Any error implementing `std::error::Error + Send + Sync + 'static` can be
// converted to `UmbraError::Other`.
//
// Storage backends wrap their driver errors as `UmbraError::Storage` so the
// core crates stay free of driver dependencies.
