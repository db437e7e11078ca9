use crate::verification::VerificationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DepotFetchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to load job file from {path}: {reason}")]
    JobLoad { path: PathBuf, reason: String },

    #[error("Failed to save job file to {path}: {reason}")]
    JobSave { path: PathBuf, reason: String },

    #[error("Invalid item descriptor for {path}: {details}")]
    InvalidDescriptor { path: String, details: String },

    #[error("Authorization error for {product}: {reason}")]
    Authorization { product: String, reason: String },

    #[error("Invalid download URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unable to decompress {path}: chunk artifact does not exist")]
    MissingChunkArtifact { path: PathBuf },

    #[error("Failed to decompress chunk {path}: {reason}")]
    Decompression { path: PathBuf, reason: String },

    #[error("Decompressed chunk {path} does not match its digest: {source}")]
    ChunkVerification {
        path: PathBuf,
        #[source]
        source: VerificationError,
    },

    #[error("Invalid command line arguments: {details}")]
    CliArgumentValidation { details: String },

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Unexpected error: {0}")]
    Unexpected(#[from] eyre::Report),
}
