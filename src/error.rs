// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for pipestore

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for pipestore operations
pub type Result<T> = std::result::Result<T, PipestoreError>;

/// pipestore error types
#[derive(Error, Debug)]
pub enum PipestoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File path has no extension: {0:?}")]
    MissingExtension(PathBuf),

    #[error("Unsupported file extension '{extension}' for {path:?} (supported: json)")]
    InvalidExtension { path: PathBuf, extension: String },

    #[error("No file path set")]
    NoSettingsFile,

    #[error("Invalid property path: {0}")]
    InvalidPropertyPath(String),

    #[error("Timed out after {timeout:?} waiting for lock {path:?}")]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("File not found: {0:?}")]
    FileNotFound(PathBuf),

    #[error("Corrupt data in {path:?}: {source}")]
    CorruptData {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Aborted(String),
}
