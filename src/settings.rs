// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Change-tracked property store backed by a JSON file
//!
//! A [`Settings`] holds an insertion-ordered map of JSON values. Edits are
//! staged in memory and flushed with [`Settings::apply_settings`]. Keys missing
//! locally are looked up in an optional fallback [`Settings`], which is never
//! merged into the local data.

use serde::de::{DeserializeOwned, Error as _};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

use crate::io::Io;
use crate::{PipestoreError, Result};

/// JSON-backed key/value store with dirty tracking and fallback lookup
#[derive(Clone, Default)]
pub struct Settings {
    data: Map<String, Value>,
    io: Io,
    is_settings_changed: bool,
    fallback: Option<Box<Settings>>,
    date_modified: Option<SystemTime>,
}

impl Settings {
    /// Create an unbound, in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store bound to `path`, loading it if the file already exists
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut settings = Self::new();
        settings.set_settings_file(path)?;
        Ok(settings)
    }

    pub fn settings_file(&self) -> Option<&Path> {
        self.io.file_path()
    }

    /// Bind to `path`.
    ///
    /// An existing file is loaded as the clean baseline. A missing file leaves
    /// the current data in place and nothing is written until the next
    /// [`apply_settings`](Self::apply_settings).
    pub fn set_settings_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut io = self.io.clone();
        io.set_file_path(path)?;

        if Io::file_exists(path) {
            // Stay on the previous file unless the new one loads cleanly
            let data = read_object(&io, path)?;
            self.io = io;
            self.initialize(data);
            self.date_modified = modified_time(path);
            debug!("Loaded settings from {:?}", path);
        } else {
            self.io = io;
            self.date_modified = None;
            debug!("Settings file {:?} does not exist yet", path);
        }
        Ok(())
    }

    pub fn set_lock_timeout(&mut self, timeout: Duration) {
        self.io.set_lock_timeout(timeout);
    }

    /// Modification time of the backing file as of the last load or save
    pub fn date_modified(&self) -> Option<SystemTime> {
        self.date_modified
    }

    pub fn keys(&self) -> Vec<&str> {
        self.data.keys().map(String::as_str).collect()
    }

    pub fn values(&self) -> Vec<&Value> {
        self.data.values().collect()
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn get_data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Add `key` unless it already exists. Returns `false` when the key was
    /// present and `force` was not set.
    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<Value>, force: bool) -> bool {
        let key = key.into();
        if !force && self.data.contains_key(&key) {
            return false;
        }
        self.data.insert(key, value.into());
        self.is_settings_changed = true;
        true
    }

    /// Local value for `key`, else the fallback's, else `None`
    pub fn get_property(&self, key: &str) -> Option<&Value> {
        self.data
            .get(key)
            .or_else(|| self.fallback.as_deref().and_then(|fallback| fallback.get_property(key)))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.get_property(key)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.get_property(key).unwrap_or(default)
    }

    /// Deserialize the value under `key` into `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_property(key)
            .map(|value| T::deserialize(value))
            .transpose()
            .map_err(Into::into)
    }

    /// Walk nested objects along `path`. Missing segments yield `None`.
    pub fn get_sub_property<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.get_property(first.as_ref())?;
        for key in rest {
            current = current.as_object()?.get(key.as_ref())?;
        }
        Some(current)
    }

    pub fn edit_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
        self.is_settings_changed = true;
    }

    /// Set the value at `path`, creating missing intermediate objects.
    ///
    /// When the first segment exists only in the fallback, its value is copied
    /// locally before editing so sibling keys stay visible. Fails without
    /// modifying anything if the path is empty or crosses a value that is not
    /// an object.
    pub fn edit_sub_property<S: AsRef<str>>(&mut self, path: &[S], value: impl Into<Value>) -> Result<()> {
        let (last, parents) = path
            .split_last()
            .ok_or_else(|| PipestoreError::InvalidPropertyPath("empty path".to_string()))?;

        let mut cursor = parents.first().and_then(|first| self.get_property(first.as_ref()));
        for (i, key) in parents.iter().enumerate() {
            let Some(found) = cursor else { break };
            let Value::Object(map) = found else {
                return Err(PipestoreError::InvalidPropertyPath(format!(
                    "'{}' is not an object",
                    key.as_ref()
                )));
            };
            cursor = parents.get(i + 1).and_then(|next| map.get(next.as_ref()));
        }

        if let Some(first) = parents.first() {
            let first = first.as_ref();
            if !self.data.contains_key(first) {
                let inherited = self
                    .fallback
                    .as_deref()
                    .and_then(|fallback| fallback.get_property(first))
                    .cloned();
                if let Some(inherited) = inherited {
                    self.data.insert(first.to_string(), inherited);
                }
            }
        }

        let mut current = &mut self.data;
        for key in parents {
            current = current
                .entry(key.as_ref())
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
                .ok_or_else(|| PipestoreError::InvalidPropertyPath(key.as_ref().to_string()))?;
        }
        current.insert(last.as_ref().to_string(), value.into());
        self.is_settings_changed = true;
        Ok(())
    }

    /// Remove `key` if present. Returns whether anything was removed.
    pub fn delete_property(&mut self, key: &str) -> bool {
        let removed = self.data.shift_remove(key).is_some();
        if removed {
            self.is_settings_changed = true;
        }
        removed
    }

    /// Replace all data; counts as a change
    pub fn set_data(&mut self, data: Map<String, Value>) {
        self.data = data;
        self.is_settings_changed = true;
    }

    /// Replace all data with a known-good baseline; not a change
    pub fn initialize(&mut self, data: Map<String, Value>) {
        self.data = data;
        self.is_settings_changed = false;
    }

    /// Merge `other` into the local data.
    ///
    /// Without `add_missing_keys` only keys that already exist locally are
    /// updated. Returns whether anything changed.
    pub fn update(&mut self, other: &Map<String, Value>, add_missing_keys: bool) -> bool {
        let mut changed = false;
        for (key, value) in other {
            match self.data.get(key) {
                Some(existing) if existing == value => {}
                Some(_) => {
                    self.data.insert(key.clone(), value.clone());
                    changed = true;
                }
                None if add_missing_keys => {
                    self.data.insert(key.clone(), value.clone());
                    changed = true;
                }
                None => {}
            }
        }
        if changed {
            self.is_settings_changed = true;
        }
        changed
    }

    /// Discard unsaved edits by reloading the file. No-op when unbound or
    /// when the file has not been written yet.
    pub fn reset_settings(&mut self) -> Result<()> {
        match self.io.file_path() {
            Some(path) if Io::file_exists(path) => self.reload(),
            _ => Ok(()),
        }
    }

    /// Flush to disk if there are unsaved changes or `force` is set.
    /// Returns whether a write happened.
    pub fn apply_settings(&mut self, force: bool) -> Result<bool> {
        if !self.is_settings_changed && !force {
            return Ok(false);
        }
        let path = self
            .io
            .file_path()
            .ok_or(PipestoreError::NoSettingsFile)?
            .to_path_buf();

        self.io.write(&self.data, None)?;
        self.is_settings_changed = false;
        self.date_modified = modified_time(&path);

        info!("Applied settings to {:?}", path);
        Ok(true)
    }

    /// Re-read the backing file unconditionally
    pub fn reload(&mut self) -> Result<()> {
        let path = self
            .io
            .file_path()
            .ok_or(PipestoreError::NoSettingsFile)?
            .to_path_buf();

        let data = read_object(&self.io, &path)?;
        self.initialize(data);
        self.date_modified = modified_time(&path);

        debug!("Loaded settings from {:?}", path);
        Ok(())
    }

    /// Whether the backing file changed on disk since the last load or save
    pub fn is_modified(&self) -> bool {
        match self.io.file_path() {
            Some(path) => modified_time(path) != self.date_modified,
            None => false,
        }
    }

    /// Whether there are in-memory edits not yet written
    pub fn is_settings_changed(&self) -> bool {
        self.is_settings_changed
    }

    pub fn set_fallback(&mut self, fallback: Settings) {
        self.fallback = Some(Box::new(fallback));
    }

    /// Use the settings file at `path` as the fallback
    pub fn set_fallback_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let fallback = Settings::from_file(path)?;
        self.set_fallback(fallback);
        Ok(())
    }

    pub fn fallback(&self) -> Option<&Settings> {
        self.fallback.as_deref()
    }
}

impl AsRef<Map<String, Value>> for Settings {
    fn as_ref(&self) -> &Map<String, Value> {
        &self.data
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = serde_json::to_string(&self.data).map_err(|_| fmt::Error)?;
        write!(f, "Settings({})", data)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = serde_json::to_string(&self.data).map_err(|_| fmt::Error)?;
        f.write_str(&data)
    }
}

/// Read `path` through `io`, requiring a top-level object
fn read_object(io: &Io, path: &Path) -> Result<Map<String, Value>> {
    match io.read(Some(path))? {
        Value::Object(map) => Ok(map),
        _ => Err(PipestoreError::CorruptData {
            path: path.to_path_buf(),
            source: serde_json::Error::custom("top-level value is not an object"),
        }),
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}
