//! Error types for the sample pipeline.
//!
//! Nothing here is retried or translated: every failure bubbles up to the
//! host, which decides how to show it.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Any failure the sample pipeline can report.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("the sample is already being downloaded")]
    InProgress,

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// HTTP-level failure while fetching the sample.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("stream from {url} interrupted: {message}")]
    Stream { url: String, message: String },
}

#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error("could not determine a cache directory for this platform")]
    NoCacheRoot,

    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove stale temp file {path}: {source}")]
    RemoveStale {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The cached file is missing, truncated, or not an image.
#[derive(Debug, Error)]
#[error("failed to decode {path}: {source}")]
pub struct DecodeError {
    pub path: PathBuf,
    #[source]
    pub source: image::ImageError,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = SampleError> = std::result::Result<T, E>;
