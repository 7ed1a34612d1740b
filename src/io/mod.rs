// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Locked, validated persistence of a single JSON document

pub mod lock;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::debug;

pub use lock::{lock_path_for, FileLock, STALE_LOCK_AGE};

use crate::{PipestoreError, Result};

/// File extensions accepted for settings documents
pub const SUPPORTED_EXTENSIONS: &[&str] = &["json"];

/// How long a writer waits for a competing writer's lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Check that `path` ends in a supported extension
pub fn validate_extension(path: &Path) -> Result<()> {
    match path.extension().and_then(|ext| ext.to_str()) {
        None => Err(PipestoreError::MissingExtension(path.to_path_buf())),
        Some(ext) if SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)) => Ok(()),
        Some(ext) => Err(PipestoreError::InvalidExtension {
            path: path.to_path_buf(),
            extension: ext.to_string(),
        }),
    }
}

/// Stateless gateway to one JSON file on disk
#[derive(Debug, Clone)]
pub struct Io {
    file_path: Option<PathBuf>,
    lock_timeout: Duration,
}

impl Default for Io {
    fn default() -> Self {
        Self {
            file_path: None,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl Io {
    /// Create a gateway with no file path
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gateway bound to `path`
    pub fn with_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut io = Self::new();
        io.set_file_path(path)?;
        Ok(io)
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Bind to `path`, rejecting missing or unsupported extensions
    pub fn set_file_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        validate_extension(path)?;
        self.file_path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub fn set_lock_timeout(&mut self, timeout: Duration) {
        self.lock_timeout = timeout;
    }

    /// Serialize `data` to disk under the sidecar lock.
    ///
    /// The document is written to a temporary file next to the target and
    /// renamed over it, so readers never observe a half-written file. On lock
    /// timeout the target is left untouched.
    pub fn write<T: Serialize + ?Sized>(&self, data: &T, file_path: Option<&Path>) -> Result<()> {
        let path = self.resolve(file_path)?;
        validate_extension(path)?;

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let _lock = FileLock::acquire(lock_path_for(path), self.lock_timeout)?;

        let mut tmp = NamedTempFile::new_in(&parent)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            let mut ser = Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
            data.serialize(&mut ser)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.persist(path).map_err(|e| e.error)?;

        debug!("Wrote {:?}", path);
        Ok(())
    }

    /// Read and parse the JSON document
    pub fn read(&self, file_path: Option<&Path>) -> Result<Value> {
        let path = self.resolve(file_path)?;
        if !Self::file_exists(path) {
            return Err(PipestoreError::FileNotFound(path.to_path_buf()));
        }

        let bytes = fs::read(path)?;
        let value = serde_json::from_slice(&bytes).map_err(|source| PipestoreError::CorruptData {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Read {:?}", path);
        Ok(value)
    }

    /// Whether `path` is an existing file
    pub fn file_exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    fn resolve<'a>(&'a self, file_path: Option<&'a Path>) -> Result<&'a Path> {
        file_path
            .or(self.file_path.as_deref())
            .ok_or(PipestoreError::NoSettingsFile)
    }
}
